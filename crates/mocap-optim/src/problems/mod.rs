pub mod pose_fit;

pub use pose_fit::{solve_pose, FitBackend, PoseFitProblem, PoseFitWeights};
