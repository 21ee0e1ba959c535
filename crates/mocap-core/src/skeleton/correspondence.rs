use super::{KeypointLayout, SkeletonError};
use crate::{translation, Mat4, Real};

/// Observed keypoint pair compared against a modeled joint pair.
///
/// Joint indices address the optimization subset chain, not `all_bones`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionPair {
    pub keypoints: (usize, usize),
    pub joints: (usize, usize),
}

/// Keypoint pair with the rest-pose distance between its bones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePair {
    pub keypoints: (usize, usize),
    pub bones: (usize, usize),
    pub rest_length: Real,
}

/// Keypoint ↔ bone correspondence tables resolved to indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    pub direction: Vec<DirectionPair>,
    pub scale: Vec<ScalePair>,
    /// Keypoints whose centroid is matched to the centroid of `align_bones`.
    pub align_keypoints: Vec<usize>,
    /// Indices into `all_bones`, parallel to `align_keypoints`.
    pub align_bones: Vec<usize>,
}

impl Correspondences {
    /// Resolve the layout's pairs against the bone each keypoint is mapped to.
    ///
    /// `keypoint_bones[k]` is the `all_bones` index for keypoint `k`, and
    /// `subset_index[b]` the optimization-subset index of bone `b`.
    pub fn build(
        layout: KeypointLayout,
        keypoint_bones: &[Option<usize>],
        subset_index: &[Option<usize>],
        rest_world: &[Mat4],
    ) -> Result<Self, SkeletonError> {
        let bone_of = |name: &str| -> Option<(usize, usize)> {
            let k = layout.index_of(name)?;
            keypoint_bones[k].map(|b| (k, b))
        };

        let mut direction = Vec::new();
        for (a, b) in layout.connections() {
            let (Some((ka, ba)), Some((kb, bb))) = (bone_of(&a), bone_of(&b)) else {
                continue;
            };
            if ba == bb {
                continue;
            }
            let (Some(ja), Some(jb)) = (subset_index[ba], subset_index[bb]) else {
                continue;
            };
            direction.push(DirectionPair {
                keypoints: (ka, kb),
                joints: (ja, jb),
            });
        }
        if direction.is_empty() {
            return Err(SkeletonError::NoCorrespondences);
        }

        let mut scale = Vec::new();
        for (a, b) in layout.scale_pairs() {
            let (Some((ka, ba)), Some((kb, bb))) = (bone_of(a), bone_of(b)) else {
                continue;
            };
            let rest_length = (translation(&rest_world[ba]) - translation(&rest_world[bb])).norm();
            if rest_length > Real::EPSILON {
                scale.push(ScalePair {
                    keypoints: (ka, kb),
                    bones: (ba, bb),
                    rest_length,
                });
            }
        }

        let (align_keypoints, align_bones): (Vec<usize>, Vec<usize>) = layout
            .alignment_keypoints()
            .iter()
            .filter_map(|name| bone_of(name))
            .unzip();

        Ok(Self {
            direction,
            scale,
            align_keypoints,
            align_bones,
        })
    }
}
