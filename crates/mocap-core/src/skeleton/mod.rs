//! Skeleton model: bone hierarchy, keypoint layouts and correspondence tables.
//!
//! The model is built once from exported rig data ([`SkeletonExport`]) and is
//! immutable afterwards. All name lookups are resolved to integer indices at
//! construction time; per-frame code only touches index arrays.

mod constraints;
mod correspondence;
mod export;
mod layout;
mod model;

pub use constraints::{AxisLimits, JointConstraints, JointLimit};
pub use correspondence::{Correspondences, DirectionPair, ScalePair};
pub use export::SkeletonExport;
pub use layout::KeypointLayout;
pub use model::{BoneSubset, SkeletonModel};

use crate::{Mat4, Real};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error("failed to read skeleton data: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse skeleton data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("skeleton has no bones")]
    EmptySkeleton,
    #[error("length mismatch for {field}: expected {expected}, got {got}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("duplicate bone name {0:?}")]
    DuplicateBone(String),
    #[error("bone {bone:?} references unknown parent {parent:?}")]
    UnknownParent { bone: String, parent: String },
    #[error("bone {bone:?} appears before its parent {parent:?}")]
    ParentOrder { bone: String, parent: String },
    #[error("keypoint {keypoint:?} is remapped to unknown bone {bone:?}")]
    UnknownRemapBone { keypoint: String, bone: String },
    #[error("constraint on unknown bone {0:?}")]
    UnknownConstraintBone(String),
    #[error("invalid constraint on bone {bone:?} axis {axis}: min {min} > max {max}")]
    InvalidConstraint {
        bone: String,
        axis: char,
        min: Real,
        max: Real,
    },
    #[error("no keypoint pair of the layout maps onto two distinct bones")]
    NoCorrespondences,
    #[error("world transform of bone {0} is not invertible")]
    SingularTransform(usize),
}

/// A node of the skeleton hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub index: usize,
    pub name: String,
    /// Parent index, always smaller than `index`; `None` for roots.
    pub parent: Option<usize>,
    /// Bone-to-parent rest transform.
    pub rest_local: Mat4,
    /// Bone-to-world rest transform.
    pub rest_world: Mat4,
}

/// Parent table and local rest transforms in topological order.
///
/// This is the minimal data needed by the kinematic evaluator. Both the full
/// skeleton and the optimization subset are represented by a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicChain {
    parents: Vec<Option<usize>>,
    rest_local: Vec<Mat4>,
}

impl KinematicChain {
    /// Build a chain, checking that every parent precedes its child.
    pub fn new(parents: Vec<Option<usize>>, rest_local: Vec<Mat4>) -> Result<Self, SkeletonError> {
        if parents.len() != rest_local.len() {
            return Err(SkeletonError::LengthMismatch {
                field: "rest_local",
                expected: parents.len(),
                got: rest_local.len(),
            });
        }
        for (i, parent) in parents.iter().enumerate() {
            if let Some(p) = *parent {
                if p >= i {
                    return Err(SkeletonError::ParentOrder {
                        bone: i.to_string(),
                        parent: p.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            parents,
            rest_local,
        })
    }

    /// Build a chain whose parent order is guaranteed by construction.
    pub(crate) fn from_parts(parents: Vec<Option<usize>>, rest_local: Vec<Mat4>) -> Self {
        debug_assert!(parents
            .iter()
            .enumerate()
            .all(|(i, p)| p.map_or(true, |p| p < i)));
        Self {
            parents,
            rest_local,
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn parents(&self) -> &[Option<usize>] {
        &self.parents
    }

    pub fn rest_local(&self) -> &[Mat4] {
        &self.rest_local
    }
}
