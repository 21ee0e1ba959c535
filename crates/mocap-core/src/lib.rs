//! Core math and skeleton primitives for retargeting 3D keypoints onto a rig.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Mat4`, ...) and YXZ Euler helpers,
//! - the immutable skeleton model ([`SkeletonModel`]) with keypoint layouts,
//!   correspondence tables and joint constraints,
//! - the kinematic evaluator ([`kinematics::forward`] / [`kinematics::backward`]),
//! - deterministic synthetic rigs and noise for tests.
//!
//! Transform chain for bone `i`:
//! `world[i] = world[parent[i]] * rest_local[i] * basis[i]`

/// Forward/backward evaluation of bone hierarchies.
pub mod kinematics;
/// Linear algebra type aliases and rotation helpers.
pub mod math;
/// Skeleton model, keypoint layouts and correspondences.
pub mod skeleton;
/// Deterministic synthetic data for tests and examples.
pub mod synthetic;

pub use kinematics::{backward, basis_from_angles, forward, rebase_world_transforms, WorldOverride};
pub use math::*;
pub use skeleton::*;
