//! Compact humanoid rig for tests.
//!
//! Every rest transform is a pure translation, so bone-local axes are aligned
//! with the world: +Y up, +X towards the rig's left side, +Z forward. Arms lie
//! along ±X and legs along -Y.

use crate::skeleton::{KeypointLayout, SkeletonError, SkeletonExport, SkeletonModel};
use crate::{translation, Mat4, Pt3, Real, Vec3};
use std::collections::BTreeMap;

/// `(name, parent, offset from parent)` in topological order.
const BONES: [(&str, Option<&str>, [Real; 3]); 35] = [
    ("hips", None, [0.0, 1.0, 0.0]),
    ("spine", Some("hips"), [0.0, 0.1, 0.0]),
    ("chest", Some("spine"), [0.0, 0.25, 0.0]),
    ("neck", Some("chest"), [0.0, 0.2, 0.0]),
    ("head", Some("neck"), [0.0, 0.1, 0.0]),
    ("nose", Some("head"), [0.0, 0.05, 0.1]),
    ("ear.L", Some("head"), [0.07, 0.03, 0.0]),
    ("ear.R", Some("head"), [-0.07, 0.03, 0.0]),
    ("shoulder.L", Some("chest"), [0.05, 0.15, 0.0]),
    ("upper_arm.L", Some("shoulder.L"), [0.12, 0.0, 0.0]),
    ("forearm.L", Some("upper_arm.L"), [0.28, 0.0, 0.0]),
    ("hand.L", Some("forearm.L"), [0.25, 0.0, 0.0]),
    ("index1.L", Some("hand.L"), [0.09, 0.0, 0.02]),
    ("index2.L", Some("index1.L"), [0.04, 0.0, 0.0]),
    ("pinky1.L", Some("hand.L"), [0.08, 0.0, -0.03]),
    ("shoulder.R", Some("chest"), [-0.05, 0.15, 0.0]),
    ("upper_arm.R", Some("shoulder.R"), [-0.12, 0.0, 0.0]),
    ("forearm.R", Some("upper_arm.R"), [-0.28, 0.0, 0.0]),
    ("hand.R", Some("forearm.R"), [-0.25, 0.0, 0.0]),
    ("index1.R", Some("hand.R"), [-0.09, 0.0, 0.02]),
    ("index2.R", Some("index1.R"), [-0.04, 0.0, 0.0]),
    ("pinky1.R", Some("hand.R"), [-0.08, 0.0, -0.03]),
    ("thigh.L", Some("hips"), [0.1, -0.05, 0.0]),
    ("shin.L", Some("thigh.L"), [0.0, -0.45, 0.0]),
    ("foot.L", Some("shin.L"), [0.0, -0.42, 0.0]),
    ("heel.L", Some("foot.L"), [0.0, -0.05, -0.04]),
    ("toe.L", Some("foot.L"), [0.0, -0.05, 0.12]),
    ("thigh.R", Some("hips"), [-0.1, -0.05, 0.0]),
    ("shin.R", Some("thigh.R"), [0.0, -0.45, 0.0]),
    ("foot.R", Some("shin.R"), [0.0, -0.42, 0.0]),
    ("heel.R", Some("foot.R"), [0.0, -0.05, -0.04]),
    ("toe.R", Some("foot.R"), [0.0, -0.05, 0.12]),
    ("eye.L", Some("head"), [0.03, 0.07, 0.08]),
    ("eye.R", Some("head"), [-0.03, 0.07, 0.08]),
    ("jaw", Some("head"), [0.0, -0.02, 0.08]),
];

const REMAP: [(&str, &str); 34] = [
    ("nose", "nose"),
    ("left_ear", "ear.L"),
    ("right_ear", "ear.R"),
    ("left_shoulder", "upper_arm.L"),
    ("right_shoulder", "upper_arm.R"),
    ("left_elbow", "forearm.L"),
    ("right_elbow", "forearm.R"),
    ("left_wrist", "hand.L"),
    ("right_wrist", "hand.R"),
    ("left_index", "index1.L"),
    ("right_index", "index1.R"),
    ("left_pinky", "pinky1.L"),
    ("right_pinky", "pinky1.R"),
    ("left_hip", "thigh.L"),
    ("right_hip", "thigh.R"),
    ("left_knee", "shin.L"),
    ("right_knee", "shin.R"),
    ("left_ankle", "foot.L"),
    ("right_ankle", "foot.R"),
    ("left_heel", "heel.L"),
    ("right_heel", "heel.R"),
    ("left_foot_index", "toe.L"),
    ("right_foot_index", "toe.R"),
    ("left_hand_wrist", "hand.L"),
    ("right_hand_wrist", "hand.R"),
    ("left_hand_index_finger_mcp", "index1.L"),
    ("right_hand_index_finger_mcp", "index1.R"),
    ("left_hand_index_finger_pip", "index2.L"),
    ("right_hand_index_finger_pip", "index2.R"),
    ("left_hand_pinky_mcp", "pinky1.L"),
    ("right_hand_pinky_mcp", "pinky1.R"),
    // eyes are exported but only the nose/ears drive the head
    ("left_eye", "eye.L"),
    ("right_eye", "eye.R"),
    ("mouth_left", "jaw"),
];

fn rows(m: &Mat4) -> [[Real; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    out
}

/// Rig export for the humanoid, including the keypoint remap.
pub fn export() -> SkeletonExport {
    let mut world: Vec<Mat4> = Vec::with_capacity(BONES.len());
    let mut export = SkeletonExport::default();
    for (name, parent, offset) in BONES {
        let local = Mat4::new_translation(&Vec3::from(offset));
        let parent_world = parent
            .and_then(|p| BONES.iter().position(|(n, _, _)| *n == p))
            .map_or_else(Mat4::identity, |p| world[p]);
        let w = parent_world * local;
        world.push(w);

        export.bone_names.push(name.to_string());
        export.bone_parents.push(parent.map(str::to_string));
        export.matrix_local_rest.push(rows(&local));
        export.matrix_world_rest.push(rows(&w));
    }
    export.remap = REMAP
        .iter()
        .map(|(k, b)| (k.to_string(), b.to_string()))
        .collect::<BTreeMap<_, _>>();
    export
}

/// Humanoid skeleton model for the given layout.
pub fn model(layout: KeypointLayout) -> Result<SkeletonModel, SkeletonError> {
    SkeletonModel::from_export(&export(), layout)
}

/// Keypoints observed from a posed rig.
///
/// Keypoints mapped to a bone sit at that bone's world position and are
/// flagged valid; unmapped keypoints are zero and invalid.
pub fn keypoints(
    model: &SkeletonModel,
    angles: &[Vec3],
    location: &Vec3,
    scale: Real,
) -> Result<(Vec<Pt3>, Vec<bool>), SkeletonError> {
    let world = model.eval_world_transforms(angles, location, scale)?;
    let mut kpts = vec![Pt3::origin(); model.num_keypoints()];
    let mut valid = vec![false; model.num_keypoints()];
    for (k, bone) in model.keypoint_bones().iter().enumerate() {
        if let Some(b) = bone {
            kpts[k] = Pt3::from(translation(&world[*b]));
            valid[k] = true;
        }
    }
    Ok((kpts, valid))
}

/// Zero angles except for the listed `(bone name, slot, value)` entries.
///
/// Unknown or non-optimizable bone names are ignored.
pub fn pose(model: &SkeletonModel, entries: &[(&str, usize, Real)]) -> Vec<Vec3> {
    let mut angles = vec![Vec3::zeros(); model.num_optimizable()];
    for (name, slot, value) in entries {
        let index = model
            .bones()
            .iter()
            .position(|b| b.name == *name)
            .and_then(|b| model.remap()[b]);
        if let Some(k) = index {
            angles[k][*slot] = *value;
        }
    }
    angles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_is_consistent() {
        let export = export();
        assert_eq!(export.bone_names.len(), BONES.len());
        let model = model(KeypointLayout::Body).unwrap();
        let hips = model.bones().iter().find(|b| b.name == "hips").unwrap();
        assert!((translation(&hips.rest_world) - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        let hand = model.bones().iter().find(|b| b.name == "hand.L").unwrap();
        assert!(
            (translation(&hand.rest_world) - Vec3::new(0.7, 1.5, 0.0)).norm() < 1e-12,
            "hand rest position {:?}",
            translation(&hand.rest_world)
        );
    }

    #[test]
    fn hand_layout_adds_finger_pairs() {
        let body = model(KeypointLayout::Body).unwrap();
        let hands = model(KeypointLayout::BodyWithHands).unwrap();
        assert_eq!(hands.num_keypoints(), 75);
        assert!(
            hands.optimizable_bone_names().iter().any(|n| n == "index1.L"),
            "finger bone should be optimizable with hand tracking"
        );
        assert!(!body.optimizable_bone_names().iter().any(|n| n == "index1.L"));
    }

    #[test]
    fn default_limits_cover_hinges_and_spine() {
        let model = model(KeypointLayout::Body).unwrap();
        let limited = |name: &str, slot: usize| {
            let b = model.bones().iter().position(|b| b.name == name).unwrap();
            let k = model.remap()[b].unwrap();
            model
                .constraints()
                .limits()
                .iter()
                .any(|l| l.dof == 3 * k + slot)
        };
        // forearm twists around X (slot 1), shin around Y (slot 0)
        assert!(limited("forearm.L", 1));
        assert!(!limited("forearm.L", 2));
        assert!(limited("shin.R", 0));
        assert!(!limited("shin.R", 1));
        assert!(limited("spine", 0) && limited("chest", 2));
        assert!(limited("neck", 1));
        assert!(!limited("hips", 0));
        for l in model.constraints().limits() {
            assert!(l.min <= l.max);
        }
    }

    #[test]
    fn explicit_limits_override_defaults() {
        let mut export = export();
        export.constraints.insert(
            "forearm.L".into(),
            crate::skeleton::AxisLimits {
                z: Some([0.0, 2.5]),
                ..Default::default()
            },
        );
        let model = SkeletonModel::from_export(&export, KeypointLayout::Body).unwrap();
        let b = model.bones().iter().position(|b| b.name == "forearm.L").unwrap();
        let k = model.remap()[b].unwrap();
        let limit = model
            .constraints()
            .limits()
            .iter()
            .find(|l| l.dof == 3 * k + 2)
            .unwrap();
        assert_eq!((limit.min, limit.max), (0.0, 2.5));

        export.constraints.insert(
            "forearm.L".into(),
            crate::skeleton::AxisLimits {
                x: Some([1.0, -1.0]),
                ..Default::default()
            },
        );
        let err = SkeletonModel::from_export(&export, KeypointLayout::Body).unwrap_err();
        assert!(matches!(
            err,
            SkeletonError::InvalidConstraint { axis: 'x', .. }
        ));
    }
}
