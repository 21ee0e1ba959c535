//! Solvers and the per-frame pose fitting problem.
//!
//! Two solver families share one set of traits:
//! - [`LbfgsBackend`]: limited-memory BFGS with a strong-Wolfe line search over
//!   any smooth [`Objective`],
//! - [`LmBackend`]: Levenberg-Marquardt over any [`NllsProblem`], backed by the
//!   `levenberg-marquardt` crate.
//!
//! [`problems::pose_fit`] implements both traits for the joint-angle fit, so
//! callers pick a family with [`FitBackend`] without rebuilding the problem.

pub mod backend_lm;
pub mod lbfgs;
pub mod problems;
pub mod traits;

pub use backend_lm::LmBackend;
pub use lbfgs::LbfgsBackend;
pub use problems::{solve_pose, FitBackend, PoseFitProblem, PoseFitWeights};
pub use traits::{
    MinimizerBackend, NllsProblem, NllsSolverBackend, Objective, SolveOptions, SolveReport,
    Termination,
};
