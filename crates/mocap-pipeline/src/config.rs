//! Solver configuration.
//!
//! Every field has a default, so a partial JSON object is a valid config.

use anyhow::{ensure, Context, Result};
use mocap_core::{KeypointLayout, Real};
use mocap_optim::{FitBackend, PoseFitWeights, SolveOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Highest supported local polynomial order for smoothing.
pub const MAX_SMOOTHING_DEGREE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkSolverConfig {
    /// Use the 75-point layout with per-finger keypoints.
    pub track_hands: bool,
    /// Initial line-search step.
    pub lr: Real,
    /// Iteration budget for warm-started frames.
    pub max_iter: usize,
    /// Iteration budget for the first frame, which starts from the rest pose.
    pub first_frame_max_iter: usize,
    pub tolerance_change: Real,
    pub tolerance_grad: Real,
    /// L-BFGS memory.
    pub history_size: usize,
    pub joint_constraint_loss_weight: Real,
    pub pose_reg_loss_weight: Real,
    /// Half-width of the smoothing window, in seconds.
    pub smooth_range: Real,
    /// Order of the local polynomial fitted by the smoother.
    pub smoothing_degree: usize,
    pub backend: FitBackend,
}

impl Default for IkSolverConfig {
    fn default() -> Self {
        Self {
            track_hands: false,
            lr: 1.0,
            max_iter: 24,
            first_frame_max_iter: 100,
            tolerance_change: 1e-6,
            tolerance_grad: 1e-4,
            history_size: 100,
            joint_constraint_loss_weight: 1.0,
            pose_reg_loss_weight: 0.1,
            smooth_range: 0.3,
            smoothing_degree: 1,
            backend: FitBackend::Lbfgs,
        }
    }
}

impl IkSolverConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read solver config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse solver config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.lr > 0.0, "lr must be positive, got {}", self.lr);
        ensure!(
            self.max_iter > 0 && self.first_frame_max_iter > 0,
            "iteration budgets must be positive"
        );
        ensure!(
            self.tolerance_change >= 0.0 && self.tolerance_grad >= 0.0,
            "tolerances must be non-negative"
        );
        ensure!(self.history_size > 0, "history_size must be positive");
        ensure!(
            self.joint_constraint_loss_weight >= 0.0 && self.pose_reg_loss_weight >= 0.0,
            "loss weights must be non-negative"
        );
        ensure!(
            self.smooth_range > 0.0,
            "smooth_range must be positive, got {}",
            self.smooth_range
        );
        ensure!(
            self.smoothing_degree <= MAX_SMOOTHING_DEGREE,
            "smoothing_degree must be at most {MAX_SMOOTHING_DEGREE}, got {}",
            self.smoothing_degree
        );
        Ok(())
    }

    pub fn layout(&self) -> KeypointLayout {
        KeypointLayout::from_track_hands(self.track_hands)
    }

    pub fn weights(&self) -> PoseFitWeights {
        PoseFitWeights {
            joint_constraint: self.joint_constraint_loss_weight,
            pose_reg: self.pose_reg_loss_weight,
        }
    }

    /// Solver options for one frame.
    pub fn solve_options(&self, first_frame: bool) -> SolveOptions {
        SolveOptions {
            max_iters: if first_frame {
                self.first_frame_max_iter
            } else {
                self.max_iter
            },
            lr: self.lr,
            tolerance_grad: self.tolerance_grad,
            tolerance_change: self.tolerance_change,
            history_size: self.history_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: IkSolverConfig =
            serde_json::from_str(r#"{ "max_iter": 16, "backend": "levenberg_marquardt" }"#)
                .unwrap();
        assert_eq!(config.max_iter, 16);
        assert_eq!(config.backend, FitBackend::LevenbergMarquardt);
        assert_eq!(config.first_frame_max_iter, 100);
        assert_eq!(config.smooth_range, 0.3);
        config.validate().unwrap();
    }

    #[test]
    fn first_frame_gets_larger_budget() {
        let config = IkSolverConfig::default();
        assert_eq!(config.solve_options(true).max_iters, 100);
        assert_eq!(config.solve_options(false).max_iters, 24);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = IkSolverConfig {
            smooth_range: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IkSolverConfig {
            smoothing_degree: 7,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("smoothing_degree"), "{err}");
    }
}
