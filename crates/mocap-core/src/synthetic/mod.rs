//! Deterministic synthetic data generation helpers.
//!
//! Small building blocks for tests and examples:
//! - randomized kinematic chains with explicit seeds,
//! - a compact humanoid rig mapped onto the body keypoint layouts,
//! - keypoint generation from a posed rig,
//! - deterministic pseudo-random keypoint noise.
//!
//! # Example
//!
//! ```no_run
//! use mocap_core::synthetic::humanoid;
//! use mocap_core::{KeypointLayout, Vec3};
//!
//! let model = humanoid::model(KeypointLayout::Body).unwrap();
//! let angles = vec![Vec3::zeros(); model.num_optimizable()];
//! let (kpts, valid) = humanoid::keypoints(&model, &angles, &Vec3::zeros(), 1.0).unwrap();
//! assert_eq!(kpts.len(), valid.len());
//! ```

pub mod chains;
pub mod humanoid;
pub mod noise;
