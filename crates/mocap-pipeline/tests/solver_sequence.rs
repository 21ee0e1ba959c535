//! Integration tests for frame-by-frame fitting and smoothing.
//!
//! This test validates:
//! 1. Graceful no-op on fully occluded frames
//! 2. Translation invariance of the scale estimate
//! 3. Convergence on a two-bone chain
//! 4. Tracking and spike attenuation on a synthetic sequence
//! 5. Loading skeleton and config files from disk
//! 6. Smoothed queries at a recorded timestamp staying close to the sample

use mocap_core::synthetic::{humanoid, noise::UniformKeypointNoise};
use mocap_core::{translation, KeypointLayout, Pt3, Real, SkeletonExport, SkeletonModel, Vec3};
use mocap_optim::FitBackend;
use mocap_pipeline::{AnimationTrack, IkSolver, IkSolverConfig, SolverError};

const FPS: Real = 30.0;

fn test_config() -> IkSolverConfig {
    IkSolverConfig {
        pose_reg_loss_weight: 1e-3,
        joint_constraint_loss_weight: 0.1,
        tolerance_grad: 1e-6,
        tolerance_change: 1e-9,
        ..Default::default()
    }
}

fn humanoid_solver(config: IkSolverConfig) -> IkSolver {
    let model = humanoid::model(config.layout()).unwrap();
    IkSolver::new(model, config).unwrap()
}

fn bone(model: &SkeletonModel, name: &str) -> usize {
    model.bones().iter().position(|b| b.name == name).unwrap()
}

/// Ground-truth angles at time `t`: an oscillating left elbow and knee.
fn truth_angles(model: &SkeletonModel, t: Real) -> Vec<Vec3> {
    use std::f64::consts::PI;
    humanoid::pose(
        model,
        &[
            ("forearm.L", 2, 0.6 + 0.4 * (PI * t).sin()),
            ("shin.L", 1, 0.4 + 0.3 * (PI * t).sin()),
            ("forearm.R", 2, -0.5),
        ],
    )
}

#[test]
fn fully_occluded_frame_keeps_previous_state() {
    let mut solver = humanoid_solver(test_config());
    let angles = truth_angles(solver.skeleton(), 0.25);
    let (kpts, valid) =
        humanoid::keypoints(solver.skeleton(), &angles, &Vec3::new(0.1, 0.0, 0.2), 1.2).unwrap();
    solver.fit(&kpts, &valid, 0.0).unwrap();

    let angles_before = solver.current_angles().to_vec();
    let scale_before = solver.scale();
    let location_before = solver.location();

    let report = solver
        .fit(&kpts, &vec![false; kpts.len()], 1.0 / FPS)
        .unwrap();
    assert!(report.skipped);
    assert_eq!(report.valid_pairs, 0);
    assert_eq!(report.iterations, 0);
    assert_eq!(solver.current_angles(), angles_before.as_slice());
    assert_eq!(solver.scale().to_bits(), scale_before.to_bits());
    assert_eq!(solver.location(), location_before);
    assert_eq!(solver.history_len(), 2);
}

#[test]
fn scale_estimate_ignores_translation() {
    let mut a = humanoid_solver(test_config());
    let mut b = humanoid_solver(test_config());
    let angles = truth_angles(a.skeleton(), 0.0);
    let (kpts, valid) = humanoid::keypoints(a.skeleton(), &angles, &Vec3::zeros(), 1.3).unwrap();
    let offset = Vec3::new(5.0, -2.0, 1.0);
    let shifted: Vec<Pt3> = kpts.iter().map(|p| p + offset).collect();

    a.fit(&kpts, &valid, 0.0).unwrap();
    b.fit(&shifted, &valid, 0.0).unwrap();

    assert!((a.scale() - 1.3).abs() < 1e-9, "scale {}", a.scale());
    assert!((a.scale() - b.scale()).abs() < 1e-12);
    assert!(
        (b.location() - a.location() - offset).norm() < 1e-3,
        "locations {:?} vs {:?}",
        a.location(),
        b.location()
    );
}

fn two_bone_export() -> SkeletonExport {
    let identity = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    let offset = [
        [1.0, 0.0, 0.0, 1.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    let mut export = SkeletonExport {
        bone_names: vec!["root".into(), "child".into()],
        bone_parents: vec![None, Some("root".into())],
        matrix_world_rest: vec![identity, offset],
        matrix_local_rest: vec![identity, offset],
        ..Default::default()
    };
    export.remap.insert("left_hip".into(), "root".into());
    export.remap.insert("left_knee".into(), "child".into());
    export
}

#[test]
fn two_bone_chain_converges_to_analytic_angle() {
    let model = SkeletonModel::from_export(&two_bone_export(), KeypointLayout::Body).unwrap();
    assert_eq!(model.optimizable_bone_names(), vec!["root".to_string()]);
    let config = IkSolverConfig {
        pose_reg_loss_weight: 1e-4,
        ..Default::default()
    };

    for backend in [FitBackend::Lbfgs, FitBackend::LevenbergMarquardt] {
        let mut solver = IkSolver::new(
            model.clone(),
            IkSolverConfig {
                backend,
                ..config.clone()
            },
        )
        .unwrap();
        let a: Real = 0.7;
        let layout = model.layout();
        let mut kpts = vec![Pt3::origin(); layout.num_keypoints()];
        let mut valid = vec![false; layout.num_keypoints()];
        let hip = layout.index_of("left_hip").unwrap();
        let knee = layout.index_of("left_knee").unwrap();
        kpts[knee] = Pt3::new(a.cos(), a.sin(), 0.0);
        valid[hip] = true;
        valid[knee] = true;

        let report = solver.fit(&kpts, &valid, 0.0).unwrap();
        assert_eq!(report.valid_pairs, 1);
        let z = solver.current_angles()[0][2];
        assert!((z - a).abs() < 1e-2, "{backend:?}: angle {z}, report {report:?}");

        let world = solver
            .eval_world_transforms(solver.current_angles(), &solver.location(), solver.scale())
            .unwrap();
        let child = translation(&world[1]);
        assert!(
            (child - kpts[knee].coords).norm() < 1e-2,
            "{backend:?}: child at {child:?}"
        );
    }
}

#[test]
fn sequence_tracks_motion_and_attenuates_a_spike() {
    let mut solver = humanoid_solver(test_config());
    let model = solver.skeleton().clone();
    let hand = bone(&model, "hand.L");
    let foot = bone(&model, "foot.L");
    let wrist = model.layout().index_of("left_wrist").unwrap();
    let location = Vec3::new(0.3, 0.0, -0.2);
    let scale = 1.1;
    let noise = UniformKeypointNoise {
        seed: 3,
        max_abs: 0.002,
    };
    let spike = 40;
    let mut track = AnimationTrack::new(&model);

    for frame in 0..60 {
        let t = frame as Real / FPS;
        let truth = truth_angles(&model, t);
        let (mut kpts, valid) = humanoid::keypoints(&model, &truth, &location, scale).unwrap();
        noise.apply(frame, &mut kpts);
        if frame == spike {
            kpts[wrist].y += 0.15;
        }
        let report = solver.fit(&kpts, &valid, t).unwrap();
        assert!(!report.skipped);
        track.record_smoothed(&solver, t).unwrap();

        let expected = model.eval_world_transforms(&truth, &location, scale).unwrap();
        let smoothed = solver
            .eval_world_transforms(
                &solver.smoothed_angles(t).unwrap(),
                &solver.smoothed_location(t).unwrap(),
                solver.scale(),
            )
            .unwrap();
        let err = |world: &[mocap_core::Mat4], b: usize| {
            (translation(&world[b]) - translation(&expected[b])).norm()
        };

        if frame == spike {
            let raw = solver
                .eval_world_transforms(solver.current_angles(), &solver.location(), solver.scale())
                .unwrap();
            let raw_err = err(&raw[..], hand);
            let smoothed_err = err(&smoothed[..], hand);
            assert!(raw_err > 0.03, "spike barely moved the raw fit: {raw_err}");
            assert!(
                smoothed_err < 0.75 * raw_err,
                "smoothing did not attenuate the spike: {smoothed_err} vs {raw_err}"
            );
        } else if !(spike..spike + 10).contains(&frame) {
            for b in [hand, foot] {
                let e = err(&smoothed[..], b);
                assert!(e < 0.03, "frame {frame}: bone {b} off by {e}");
            }
        }
    }

    assert!((solver.scale() - scale).abs() < 0.02, "scale {}", solver.scale());
    assert!(solver.history_len() <= 10);
    assert_eq!(track.len(), 60);
    let world = track.world_transforms(&model).unwrap();
    assert_eq!(world.len(), 60);
    assert_eq!(world[0].len(), model.bones().len());
}

#[test]
fn mismatched_inputs_are_rejected() {
    let mut solver = humanoid_solver(test_config());
    let n = solver.skeleton().num_keypoints();
    let err = solver
        .fit(&vec![Pt3::origin(); n - 1], &vec![true; n], 0.0)
        .unwrap_err();
    assert!(matches!(
        err,
        SolverError::KeypointCountMismatch { expected, got } if expected == n && got == n - 1
    ));
    let err = solver
        .fit(&vec![Pt3::origin(); n], &vec![true; n + 1], 0.0)
        .unwrap_err();
    assert!(matches!(err, SolverError::ValidityCountMismatch { .. }));
    assert_eq!(solver.history_len(), 0);
}

#[test]
fn solver_loads_skeleton_and_config_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    humanoid::export()
        .save(dir.path().join("skeleton.json"))
        .unwrap();
    let config_path = dir.path().join("solver.json");
    std::fs::write(
        &config_path,
        r#"{ "track_hands": true, "max_iter": 16, "smooth_range": 0.5 }"#,
    )
    .unwrap();

    let config = IkSolverConfig::from_json_file(&config_path).unwrap();
    assert!(config.track_hands);
    let solver = IkSolver::load(dir.path(), config).unwrap();
    assert_eq!(solver.skeleton().num_keypoints(), 75);
    assert_eq!(solver.config().max_iter, 16);

    std::fs::write(&config_path, r#"{ "smooth_range": -1.0 }"#).unwrap();
    assert!(IkSolverConfig::from_json_file(&config_path).is_err());
    assert!(IkSolverConfig::from_json_file(dir.path().join("missing.json")).is_err());
}

#[test]
fn track_round_trips_through_json() {
    let mut solver = humanoid_solver(test_config());
    let model = solver.skeleton().clone();
    let mut track = AnimationTrack::new(&model);
    for frame in 0..4 {
        let t = frame as Real / FPS;
        let (kpts, valid) =
            humanoid::keypoints(&model, &truth_angles(&model, t), &Vec3::zeros(), 1.0).unwrap();
        solver.fit(&kpts, &valid, t).unwrap();
        track.record_smoothed(&solver, t).unwrap();
    }

    let file = tempfile::NamedTempFile::new().unwrap();
    track.save(file.path()).unwrap();
    let loaded = AnimationTrack::load(file.path()).unwrap();
    assert_eq!(loaded.bone_names, model.bone_names());
    assert_eq!(loaded.optimizable_bones, model.optimizable_bone_names());
    assert_eq!(loaded.len(), 4);
    assert_eq!(
        loaded.frames[3].angle_vectors().len(),
        model.num_optimizable()
    );
}

#[test]
fn smoothing_at_a_sample_timestamp_stays_close_to_the_sample() {
    let mut solver = humanoid_solver(test_config());
    let model = solver.skeleton().clone();
    let rate = 120.0;
    let mut raw = Vec::new();
    for frame in 0..40 {
        let t = frame as Real / rate;
        let truth = humanoid::pose(
            &model,
            &[
                ("forearm.L", 2, 0.5 + 0.2 * (2.0 * t).sin()),
                ("shin.R", 1, 0.3 - 0.2 * t),
            ],
        );
        let (kpts, valid) = humanoid::keypoints(&model, &truth, &Vec3::zeros(), 1.0).unwrap();
        solver.fit(&kpts, &valid, t).unwrap();
        raw.push((t, solver.current_angles().to_vec()));
    }

    for &k in &[30, 35, 39] {
        let (t, sample) = &raw[k];
        let smoothed = solver.smoothed_angles(*t).unwrap();
        let diff = smoothed
            .iter()
            .zip(sample.iter())
            .map(|(a, b)| (a - b).amax())
            .fold(0.0, Real::max);
        assert!(diff < 0.02, "frame {k}: smoothed deviates by {diff}");
    }
}
