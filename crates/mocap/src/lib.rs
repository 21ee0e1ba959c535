//! High-level entry crate for retargeting 3D body keypoints onto a rigged skeleton.
//!
//! A typical session loads an exported rig, fits each incoming keypoint frame
//! and reads back smoothed poses for playback or export:
//!
//! ```no_run
//! use mocap::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IkSolverConfig::from_json_file("solver.json")?;
//! let mut solver = IkSolver::load("avatar/", config)?;
//! let mut track = AnimationTrack::new(solver.skeleton());
//!
//! let frames: Vec<(Vec<Pt3>, Vec<bool>, f64)> = /* keypoint stream */
//! # vec![];
//! for (keypoints, valid, t) in &frames {
//!     let report = solver.fit(keypoints, valid, *t)?;
//!     if report.skipped {
//!         continue;
//!     }
//!     track.record_smoothed(&solver, *t)?;
//! }
//! track.save("animation.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - **[`core`]**: Math aliases, skeleton model, forward/backward kinematics
//! - **[`optim`]**: L-BFGS and Levenberg-Marquardt solvers, the pose-fit problem
//! - **[`pipeline`]**: Stateful solver, smoothing, configuration, animation tracks
//! - **[`prelude`]**: Convenient re-exports for common use cases

/// Math aliases, skeleton model, kinematic evaluation and synthetic rigs.
pub mod core {
    pub use mocap_core::*;
}

/// Solvers and the per-frame pose fitting problem.
pub mod optim {
    pub use mocap_optim::*;
}

/// Stateful per-frame fitting with temporal smoothing.
pub mod pipeline {
    pub use mocap_pipeline::*;
}

/// Convenient re-exports for common use cases.
///
/// Import with `use mocap::prelude::*;` to get started quickly.
pub mod prelude {
    pub use mocap_core::{KeypointLayout, Mat4, Pt3, Real, SkeletonModel, Vec3};
    pub use mocap_optim::FitBackend;
    pub use mocap_pipeline::{
        AnimationTrack, FitReport, IkSolver, IkSolverConfig, SolverError,
    };
}
