//! Recorded animation for the export side.

use crate::error::SolverError;
use crate::solver::IkSolver;
use anyhow::{Context, Result};
use mocap_core::{Mat4, Real, SkeletonModel, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Solver state at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFrame {
    pub timestamp: Real,
    /// YXZ Euler angles `[y, x, z]` per optimizable bone.
    pub angles: Vec<[Real; 3]>,
    pub location: [Real; 3],
    pub scale: Real,
}

impl TrackFrame {
    pub fn new(timestamp: Real, angles: &[Vec3], location: &Vec3, scale: Real) -> Self {
        Self {
            timestamp,
            angles: angles.iter().map(|a| [a[0], a[1], a[2]]).collect(),
            location: [location[0], location[1], location[2]],
            scale,
        }
    }

    pub fn angle_vectors(&self) -> Vec<Vec3> {
        self.angles.iter().map(|a| Vec3::from(*a)).collect()
    }

    pub fn location_vector(&self) -> Vec3 {
        Vec3::from(self.location)
    }
}

/// Per-frame poses with the bone names needed to drive a rig.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationTrack {
    pub bone_names: Vec<String>,
    /// Bones the `angles` of each frame refer to, in order.
    pub optimizable_bones: Vec<String>,
    pub frames: Vec<TrackFrame>,
}

impl AnimationTrack {
    pub fn new(model: &SkeletonModel) -> Self {
        Self {
            bone_names: model.bone_names(),
            optimizable_bones: model.optimizable_bone_names(),
            frames: Vec::new(),
        }
    }

    /// Append the solver's smoothed state at `t` and its current scale.
    pub fn record_smoothed(&mut self, solver: &IkSolver, t: Real) -> Result<(), SolverError> {
        let angles = solver.smoothed_angles(t)?;
        let location = solver.smoothed_location(t)?;
        self.frames
            .push(TrackFrame::new(t, &angles, &location, solver.scale()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// World transforms of every bone for every frame.
    pub fn world_transforms(&self, model: &SkeletonModel) -> Result<Vec<Vec<Mat4>>, SolverError> {
        self.frames
            .iter()
            .map(|f| {
                let angles = f.angle_vectors();
                if angles.len() != model.num_optimizable() {
                    return Err(SolverError::AngleCountMismatch {
                        expected: model.num_optimizable(),
                        got: angles.len(),
                    });
                }
                Ok(model.eval_world_transforms(&angles, &f.location_vector(), f.scale)?)
            })
            .collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("failed to serialize track")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
    }
}
