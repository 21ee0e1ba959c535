//! Integration test for loading exported rig data from disk.

use mocap_core::synthetic::humanoid;
use mocap_core::{translation, KeypointLayout, SkeletonError, SkeletonModel, Vec3};

#[test]
fn humanoid_round_trips_through_json_directory() {
    let dir = tempfile::tempdir().unwrap();
    humanoid::export()
        .save(dir.path().join("skeleton.json"))
        .unwrap();

    let model = SkeletonModel::load(dir.path(), KeypointLayout::Body).unwrap();
    let reference = humanoid::model(KeypointLayout::Body).unwrap();

    assert_eq!(model.bone_names(), reference.bone_names());
    assert_eq!(model.optimizable(), reference.optimizable());
    assert_eq!(model.correspondences(), reference.correspondences());
    assert_eq!(model.constraints(), reference.constraints());
}

#[test]
fn correspondence_tables_reference_mapped_bones() {
    let model = humanoid::model(KeypointLayout::Body).unwrap();
    let corr = model.correspondences();
    let subset = model.subset();

    assert!(!corr.direction.is_empty());
    for pair in &corr.direction {
        let (ja, jb) = pair.joints;
        let (ka, kb) = pair.keypoints;
        assert_eq!(model.keypoint_bones()[ka], Some(subset.bones[ja]));
        assert_eq!(model.keypoint_bones()[kb], Some(subset.bones[jb]));
        assert_ne!(ja, jb);
    }

    // all four torso pairs are mapped on the humanoid
    assert_eq!(corr.scale.len(), 4);
    let shoulders = corr
        .scale
        .iter()
        .find(|p| p.keypoints == (11, 12))
        .expect("shoulder pair");
    let rest_l = translation(&model.bones()[shoulders.bones.0].rest_world);
    let rest_r = translation(&model.bones()[shoulders.bones.1].rest_world);
    assert!((shoulders.rest_length - (rest_l - rest_r).norm()).abs() < 1e-12);
    assert!((shoulders.rest_length - 0.34).abs() < 1e-12);

    assert_eq!(corr.align_keypoints.len(), 4);
    assert_eq!(corr.align_keypoints.len(), corr.align_bones.len());
}

#[test]
fn inconsistent_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rig.json");
    let mut export = humanoid::export();
    export.matrix_world_rest.pop();
    export.save(&path).unwrap();

    let err = SkeletonModel::load(&path, KeypointLayout::Body).unwrap_err();
    assert!(matches!(err, SkeletonError::LengthMismatch { .. }), "{err}");

    std::fs::write(&path, "{ not json").unwrap();
    let err = SkeletonModel::load(&path, KeypointLayout::Body).unwrap_err();
    assert!(matches!(err, SkeletonError::Parse(_)), "{err}");
}

#[test]
fn posed_keypoints_follow_the_rig() {
    let model = humanoid::model(KeypointLayout::Body).unwrap();
    let angles = humanoid::pose(&model, &[("forearm.L", 2, std::f64::consts::FRAC_PI_2)]);
    let (kpts, valid) = humanoid::keypoints(&model, &angles, &Vec3::zeros(), 1.0).unwrap();

    let wrist = KeypointLayout::Body.index_of("left_wrist").unwrap();
    let elbow = KeypointLayout::Body.index_of("left_elbow").unwrap();
    assert!(valid[wrist] && valid[elbow]);
    // a quarter turn around Z swings the forearm from +X to +Y
    let dir = kpts[wrist] - kpts[elbow];
    assert!((dir - Vec3::new(0.0, 0.25, 0.0)).norm() < 1e-12, "{dir:?}");
    assert!(!valid[KeypointLayout::Body.index_of("left_eye_inner").unwrap()]);
}
