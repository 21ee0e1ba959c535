use super::{Bone, SkeletonError};
use crate::{translation, Real};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Twist range allowed around the long axis of an elbow or knee bone.
const HINGE_TWIST_LIMIT: Real = 0.35;
/// Per-axis range for spine and neck bones.
const TORSO_LIMIT: Real = 0.8;

const HINGE_KEYPOINTS: [&str; 4] = ["left_elbow", "right_elbow", "left_knee", "right_knee"];

/// Explicit `[min, max]` angle limits (radians) per local axis of one bone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<[Real; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<[Real; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<[Real; 2]>,
}

impl AxisLimits {
    /// Limits paired with their axis name and slot in the `[y, x, z]` angle triple.
    fn slots(&self) -> [(char, usize, Option<[Real; 2]>); 3] {
        [('y', 0, self.y), ('x', 1, self.x), ('z', 2, self.z)]
    }
}

/// Bounds on one degree of freedom of the flattened angle vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimit {
    /// Index into the flattened `3 * num_optimizable` angle vector.
    pub dof: usize,
    pub min: Real,
    pub max: Real,
}

/// Constrained DOFs of the optimizable bones. Unlisted DOFs are unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointConstraints {
    limits: Vec<JointLimit>,
}

impl JointConstraints {
    pub fn limits(&self) -> &[JointLimit] {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    /// Derive default limits from joint roles and the rest pose, then apply
    /// explicit per-bone overrides.
    pub(crate) fn build(
        bones: &[Bone],
        keypoint_bone: impl Fn(&str) -> Option<usize>,
        optimizable_index: &[Option<usize>],
        explicit: &BTreeMap<String, AxisLimits>,
    ) -> Result<Self, SkeletonError> {
        let mut children = vec![Vec::new(); bones.len()];
        for bone in bones {
            if let Some(p) = bone.parent {
                children[p].push(bone.index);
            }
        }
        let ancestors = |b: usize| -> Vec<usize> {
            let mut out = Vec::new();
            let mut cur = bones[b].parent;
            while let Some(p) = cur {
                out.push(p);
                cur = bones[p].parent;
            }
            out
        };

        let mut table: BTreeMap<usize, (Real, Real)> = BTreeMap::new();
        let mut limit_bone = |b: usize, slot: usize, range: Real| {
            if let Some(k) = optimizable_index[b] {
                table.insert(3 * k + slot, (-range, range));
            }
        };

        // Hinges: restrict twist around the axis pointing at the child.
        for name in HINGE_KEYPOINTS {
            let Some(b) = keypoint_bone(name) else {
                continue;
            };
            if let Some(slot) = twist_slot(bones, &children[b], b) {
                limit_bone(b, slot, HINGE_TWIST_LIMIT);
            }
        }

        // Spine: shared ancestors of both shoulders that do not also carry the hips.
        let shoulders = (keypoint_bone("left_shoulder"), keypoint_bone("right_shoulder"));
        let mut hip_carriers: Vec<usize> = Vec::new();
        for name in ["left_hip", "right_hip"] {
            if let Some(b) = keypoint_bone(name) {
                hip_carriers.push(b);
                hip_carriers.extend(ancestors(b));
            }
        }
        let mut shoulder_carriers: Vec<usize> = Vec::new();
        if let (Some(l), Some(r)) = shoulders {
            let right = ancestors(r);
            for b in ancestors(l) {
                if right.contains(&b) && !hip_carriers.contains(&b) {
                    for slot in 0..3 {
                        limit_bone(b, slot, TORSO_LIMIT);
                    }
                }
            }
            shoulder_carriers.extend([l, r]);
            shoulder_carriers.extend(ancestors(l));
            shoulder_carriers.extend(right);
        }

        // Neck: ancestors of the head landmark below the shoulder girdle.
        if let Some(nose) = keypoint_bone("nose") {
            for b in ancestors(nose) {
                if !shoulder_carriers.contains(&b) && !hip_carriers.contains(&b) {
                    for slot in 0..3 {
                        limit_bone(b, slot, TORSO_LIMIT);
                    }
                }
            }
        }

        let name_index: HashMap<&str, usize> = bones
            .iter()
            .map(|b| (b.name.as_str(), b.index))
            .collect();
        for (bone_name, limits) in explicit {
            let &b = name_index
                .get(bone_name.as_str())
                .ok_or_else(|| SkeletonError::UnknownConstraintBone(bone_name.clone()))?;
            for (axis, slot, range) in limits.slots() {
                let Some([min, max]) = range else {
                    continue;
                };
                if !(min <= max) {
                    return Err(SkeletonError::InvalidConstraint {
                        bone: bone_name.clone(),
                        axis,
                        min,
                        max,
                    });
                }
                if let Some(k) = optimizable_index[b] {
                    table.insert(3 * k + slot, (min, max));
                }
            }
        }

        let limits = table
            .into_iter()
            .map(|(dof, (min, max))| JointLimit { dof, min, max })
            .collect();
        Ok(Self { limits })
    }
}

/// Angle slot of the local axis that points from `bone` towards its farthest child.
fn twist_slot(bones: &[Bone], children: &[usize], bone: usize) -> Option<usize> {
    let offset = children
        .iter()
        .map(|&c| translation(&bones[c].rest_local))
        .max_by(|a, b| a.norm().total_cmp(&b.norm()))?;
    if offset.norm() <= Real::EPSILON {
        return None;
    }
    let axis = offset.iamax();
    debug_assert!(axis < 3, "bone {bone} offset axis out of range");
    // slots are ordered [y, x, z]
    Some([1, 0, 2][axis])
}
