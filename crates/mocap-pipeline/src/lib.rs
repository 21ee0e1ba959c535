//! Stateful retargeting of keypoint streams onto a skeleton.
//!
//! [`IkSolver`] consumes frames of 3D keypoints in timestamp order. Each
//! [`IkSolver::fit`] call:
//! 1. keeps the direction and scale pairs whose keypoints are valid,
//! 2. updates the uniform scale estimate and rescales observed directions,
//! 3. fits the joint angles (skipped when no pair is valid),
//! 4. aligns the root location,
//! 5. appends the state to a bounded history.
//!
//! Smoothed angles and locations are served from that history by moving
//! least squares ([`smoothing`]). [`AnimationTrack`] records smoothed frames
//! for export.
//!
//! # Example
//!
//! ```no_run
//! use mocap_core::Pt3;
//! use mocap_pipeline::{IkSolver, IkSolverConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut solver = IkSolver::load("avatar/skeleton.json", IkSolverConfig::default())?;
//! let n = solver.skeleton().num_keypoints();
//! let keypoints = vec![Pt3::origin(); n];
//! let valid = vec![true; n];
//! solver.fit(&keypoints, &valid, 0.0)?;
//! let angles = solver.smoothed_angles(0.0)?;
//! let location = solver.smoothed_location(0.0)?;
//! let world = solver.eval_world_transforms(&angles, &location, solver.scale())?;
//! assert_eq!(world.len(), solver.skeleton().bones().len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod smoothing;
pub mod solver;
pub mod track;

pub use config::IkSolverConfig;
pub use error::SolverError;
pub use history::TimedHistory;
pub use solver::{FitReport, IkSolver};
pub use track::{AnimationTrack, TrackFrame};
