use super::{AxisLimits, SkeletonError};
use crate::Real;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File name looked up when [`SkeletonExport::load`] is given a directory.
pub const SKELETON_FILE_NAME: &str = "skeleton.json";

/// Rig data written by the external export step.
///
/// Per-bone data is stored as parallel arrays; matrices are row-major 4x4.
/// `remap` maps canonical keypoint names (see [`super::KeypointLayout`]) to
/// bone names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonExport {
    pub bone_names: Vec<String>,
    pub bone_parents: Vec<Option<String>>,
    pub matrix_world_rest: Vec<[[Real; 4]; 4]>,
    pub matrix_local_rest: Vec<[[Real; 4]; 4]>,
    pub remap: BTreeMap<String, String>,
    /// Explicit per-bone angle limits in radians, overriding the defaults.
    #[serde(default)]
    pub constraints: BTreeMap<String, AxisLimits>,
}

impl SkeletonExport {
    /// Read an export from a JSON file, or from `skeleton.json` inside a directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SkeletonError> {
        let path = path.as_ref();
        let file = if path.is_dir() {
            path.join(SKELETON_FILE_NAME)
        } else {
            path.to_path_buf()
        };
        let data = fs::read_to_string(&file)?;
        let export = serde_json::from_str(&data)?;
        Ok(export)
    }

    /// Write the export as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SkeletonError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check array lengths against the bone list.
    pub(crate) fn check_lengths(&self) -> Result<(), SkeletonError> {
        let n = self.bone_names.len();
        if n == 0 {
            return Err(SkeletonError::EmptySkeleton);
        }
        let fields = [
            ("bone_parents", self.bone_parents.len()),
            ("matrix_world_rest", self.matrix_world_rest.len()),
            ("matrix_local_rest", self.matrix_local_rest.len()),
        ];
        for (field, got) in fields {
            if got != n {
                return Err(SkeletonError::LengthMismatch {
                    field,
                    expected: n,
                    got,
                });
            }
        }
        Ok(())
    }
}
