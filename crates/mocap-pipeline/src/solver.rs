//! Stateful per-frame fitter with smoothed queries.

use crate::config::IkSolverConfig;
use crate::error::SolverError;
use crate::history::TimedHistory;
use crate::smoothing::mls_weights;
use log::{debug, warn};
use mocap_core::{translation, DirectionPair, Mat4, Pt3, Real, SkeletonModel, Vec3};
use mocap_optim::{solve_pose, PoseFitProblem, Termination};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one [`IkSolver::fit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// No valid direction pair: the previous pose was kept.
    pub skipped: bool,
    pub iterations: usize,
    /// Loss after optimization, `None` when skipped.
    pub final_loss: Option<Real>,
    pub termination: Option<Termination>,
    /// Direction pairs with both keypoints valid.
    pub valid_pairs: usize,
    /// Scale estimate after this frame.
    pub scale: Real,
}

/// Retargets keypoint frames onto a skeleton, one frame at a time.
///
/// The angle vector persists between frames and warm-starts the next fit.
#[derive(Debug, Clone)]
pub struct IkSolver {
    model: SkeletonModel,
    config: IkSolverConfig,
    angles: Vec<Vec3>,
    scale: Real,
    location: Vec3,
    frames_fitted: usize,
    angle_history: TimedHistory<Vec<Vec3>>,
    location_history: TimedHistory<Vec3>,
}

impl IkSolver {
    pub fn new(model: SkeletonModel, config: IkSolverConfig) -> Result<Self, SolverError> {
        config
            .validate()
            .map_err(|e| SolverError::Config(format!("{e:#}")))?;
        if model.layout() != config.layout() {
            return Err(SolverError::Config(format!(
                "skeleton was built for {:?} but track_hands = {}",
                model.layout(),
                config.track_hands
            )));
        }
        let angles = vec![Vec3::zeros(); model.num_optimizable()];
        Ok(Self {
            model,
            angles,
            scale: 1.0,
            location: Vec3::zeros(),
            frames_fitted: 0,
            angle_history: TimedHistory::new(config.smooth_range),
            location_history: TimedHistory::new(config.smooth_range),
            config,
        })
    }

    /// Load the skeleton JSON at `path` with the layout selected by `config`.
    pub fn load(path: impl AsRef<Path>, config: IkSolverConfig) -> Result<Self, SolverError> {
        let model = SkeletonModel::load(path, config.layout())?;
        Self::new(model, config)
    }

    /// Fit one frame of keypoints observed at `timestamp`.
    ///
    /// Frames must arrive in non-decreasing timestamp order. A frame without
    /// any valid direction pair keeps the previous angles but still records
    /// a history sample.
    pub fn fit(
        &mut self,
        keypoints: &[Pt3],
        valid: &[bool],
        timestamp: Real,
    ) -> Result<FitReport, SolverError> {
        let expected = self.model.num_keypoints();
        if keypoints.len() != expected {
            return Err(SolverError::KeypointCountMismatch {
                expected,
                got: keypoints.len(),
            });
        }
        if valid.len() != expected {
            return Err(SolverError::ValidityCountMismatch {
                expected,
                got: valid.len(),
            });
        }

        let correspondences = self.model.correspondences();
        let pairs: Vec<DirectionPair> = correspondences
            .direction
            .iter()
            .filter(|p| valid[p.keypoints.0] && valid[p.keypoints.1])
            .copied()
            .collect();

        let ratios: Vec<Real> = correspondences
            .scale
            .iter()
            .filter(|p| valid[p.keypoints.0] && valid[p.keypoints.1])
            .map(|p| (keypoints[p.keypoints.0] - keypoints[p.keypoints.1]).norm() / p.rest_length)
            .collect();
        if !ratios.is_empty() {
            let estimate = ratios.iter().sum::<Real>() / ratios.len() as Real;
            if estimate > 0.0 && estimate.is_finite() {
                self.scale = estimate;
            }
        }

        let mut report = FitReport {
            skipped: pairs.is_empty(),
            iterations: 0,
            final_loss: None,
            termination: None,
            valid_pairs: pairs.len(),
            scale: self.scale,
        };

        if pairs.is_empty() {
            debug!("frame at t = {timestamp}: no valid direction pairs, keeping previous pose");
        } else {
            let targets: Vec<Vec3> = pairs
                .iter()
                .map(|p| (keypoints[p.keypoints.1] - keypoints[p.keypoints.0]) / self.scale)
                .collect();
            let problem =
                PoseFitProblem::from_model(&self.model, &pairs, targets, self.config.weights())?;
            let x0 = DVector::from_iterator(
                3 * self.angles.len(),
                self.angles.iter().flat_map(|a| a.iter().copied()),
            );
            let opts = self.config.solve_options(self.frames_fitted == 0);
            let (x, solve) = solve_pose(&problem, x0, self.config.backend, &opts);

            if x.iter().all(|v| v.is_finite()) {
                for (k, a) in self.angles.iter_mut().enumerate() {
                    *a = Vec3::new(x[3 * k], x[3 * k + 1], x[3 * k + 2]);
                }
            } else {
                warn!("frame at t = {timestamp}: solver produced non-finite angles, keeping previous pose");
            }
            report.iterations = solve.iterations;
            report.final_loss = Some(solve.final_cost);
            report.termination = Some(solve.termination);
            debug!(
                "frame at t = {timestamp}: {} pairs, scale {:.4}, {} iterations, loss {:.3e} ({:?})",
                pairs.len(),
                self.scale,
                solve.iterations,
                solve.final_cost,
                solve.termination
            );
        }

        if let Some(location) = self.align_location(keypoints, valid)? {
            self.location = location;
        }

        self.frames_fitted += 1;
        self.angle_history.push(timestamp, self.angles.clone());
        self.location_history.push(timestamp, self.location);
        Ok(report)
    }

    /// Root translation aligning valid alignment keypoints with their bones.
    fn align_location(&self, keypoints: &[Pt3], valid: &[bool]) -> Result<Option<Vec3>, SolverError> {
        let correspondences = self.model.correspondences();
        let used: Vec<(usize, usize)> = correspondences
            .align_keypoints
            .iter()
            .zip(correspondences.align_bones.iter())
            .filter(|(k, _)| valid[**k])
            .map(|(k, b)| (*k, *b))
            .collect();
        if used.is_empty() {
            return Ok(None);
        }
        let world = self
            .model
            .eval_world_transforms(&self.angles, &Vec3::zeros(), self.scale)?;
        let n = used.len() as Real;
        let observed = used
            .iter()
            .fold(Vec3::zeros(), |acc, (k, _)| acc + keypoints[*k].coords)
            / n;
        let modeled = used
            .iter()
            .fold(Vec3::zeros(), |acc, (_, b)| acc + translation(&world[*b]))
            / n;
        Ok(Some(observed - modeled))
    }

    /// Angles smoothed over the history window around `t`.
    pub fn smoothed_angles(&self, t: Real) -> Result<Vec<Vec3>, SolverError> {
        let window = self.angle_history.window(t, self.config.smooth_range);
        if window.len() <= 2 {
            return window
                .last()
                .copied()
                .or_else(|| self.angle_history.latest())
                .map(|(_, a)| a.clone())
                .ok_or(SolverError::EmptyHistory);
        }
        let times: Vec<Real> = window.iter().map(|(ts, _)| *ts).collect();
        let weights = mls_weights(&times, t, self.config.smooth_range, self.config.smoothing_degree);
        let mut out = vec![Vec3::zeros(); self.angles.len()];
        for ((_, sample), w) in window.iter().zip(weights.iter()) {
            for (o, a) in out.iter_mut().zip(sample.iter()) {
                *o += a * *w;
            }
        }
        Ok(out)
    }

    /// Root location smoothed over the history window around `t`.
    pub fn smoothed_location(&self, t: Real) -> Result<Vec3, SolverError> {
        let window = self.location_history.window(t, self.config.smooth_range);
        if window.len() <= 2 {
            return window
                .last()
                .copied()
                .or_else(|| self.location_history.latest())
                .map(|(_, l)| *l)
                .ok_or(SolverError::EmptyHistory);
        }
        let times: Vec<Real> = window.iter().map(|(ts, _)| *ts).collect();
        let weights = mls_weights(&times, t, self.config.smooth_range, self.config.smoothing_degree);
        Ok(window
            .iter()
            .zip(weights.iter())
            .fold(Vec3::zeros(), |acc, ((_, l), w)| acc + l * *w))
    }

    /// World transforms of every bone for an explicit state.
    pub fn eval_world_transforms(
        &self,
        angles: &[Vec3],
        location: &Vec3,
        scale: Real,
    ) -> Result<Vec<Mat4>, SolverError> {
        if angles.len() != self.model.num_optimizable() {
            return Err(SolverError::AngleCountMismatch {
                expected: self.model.num_optimizable(),
                got: angles.len(),
            });
        }
        Ok(self.model.eval_world_transforms(angles, location, scale)?)
    }

    /// Latest unsmoothed angles.
    pub fn current_angles(&self) -> &[Vec3] {
        &self.angles
    }

    /// Latest scale estimate (1.0 until a frame provides one).
    pub fn scale(&self) -> Real {
        self.scale
    }

    /// Latest unsmoothed root location.
    pub fn location(&self) -> Vec3 {
        self.location
    }

    pub fn history_len(&self) -> usize {
        self.angle_history.len()
    }

    pub fn frames_fitted(&self) -> usize {
        self.frames_fitted
    }

    pub fn optimizable_bone_names(&self) -> Vec<String> {
        self.model.optimizable_bone_names()
    }

    pub fn skeleton(&self) -> &SkeletonModel {
        &self.model
    }

    pub fn config(&self) -> &IkSolverConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocap_core::synthetic::humanoid;
    use mocap_core::KeypointLayout;

    fn solver() -> IkSolver {
        let model = humanoid::model(KeypointLayout::Body).unwrap();
        IkSolver::new(model, IkSolverConfig::default()).unwrap()
    }

    #[test]
    fn queries_before_any_fit_fail() {
        let solver = solver();
        assert!(matches!(
            solver.smoothed_angles(0.0),
            Err(SolverError::EmptyHistory)
        ));
        assert!(matches!(
            solver.smoothed_location(0.0),
            Err(SolverError::EmptyHistory)
        ));
    }

    #[test]
    fn layout_mismatch_is_a_config_error() {
        let model = humanoid::model(KeypointLayout::Body).unwrap();
        let config = IkSolverConfig {
            track_hands: true,
            ..Default::default()
        };
        assert!(matches!(
            IkSolver::new(model, config),
            Err(SolverError::Config(_))
        ));
    }

    #[test]
    fn short_history_returns_latest_sample() {
        let mut solver = solver();
        let angles = humanoid::pose(solver.skeleton(), &[("forearm.L", 2, 0.5)]);
        let (kpts, valid) =
            humanoid::keypoints(solver.skeleton(), &angles, &Vec3::zeros(), 1.0).unwrap();
        solver.fit(&kpts, &valid, 0.0).unwrap();
        solver.fit(&kpts, &valid, 0.1).unwrap();
        let smoothed = solver.smoothed_angles(0.1).unwrap();
        assert_eq!(smoothed, solver.current_angles());
        // empty window: fall back to the newest sample
        assert_eq!(solver.smoothed_location(5.0).unwrap(), solver.location());
    }

    #[test]
    fn wrong_angle_count_is_rejected() {
        let solver = solver();
        let err = solver
            .eval_world_transforms(&[Vec3::zeros()], &Vec3::zeros(), 1.0)
            .unwrap_err();
        assert!(matches!(err, SolverError::AngleCountMismatch { got: 1, .. }));
    }
}
