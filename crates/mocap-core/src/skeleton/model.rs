use super::{
    Bone, Correspondences, JointConstraints, KeypointLayout, KinematicChain, SkeletonError,
    SkeletonExport,
};
use crate::kinematics::{basis_from_angles, forward};
use crate::{mat4_from_rows, Mat4, Real, Vec3};
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// Bones needed to evaluate every mapped keypoint, as a standalone chain.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneSubset {
    /// `all_bones` index of each subset bone, in topological order.
    pub bones: Vec<usize>,
    pub chain: KinematicChain,
    /// Optimizable index of each subset bone (`None` = fixed identity basis).
    pub remap: Vec<Option<usize>>,
}

/// Immutable skeleton model built once from exported rig data.
#[derive(Debug, Clone)]
pub struct SkeletonModel {
    layout: KeypointLayout,
    bones: Vec<Bone>,
    chain: KinematicChain,
    /// `all_bones` index each layout keypoint is mapped to.
    keypoint_bones: Vec<Option<usize>>,
    /// Optimizable index of every bone in `bones`.
    remap: Vec<Option<usize>>,
    optimizable: Vec<usize>,
    subset: BoneSubset,
    constraints: JointConstraints,
    correspondences: Correspondences,
}

impl SkeletonModel {
    /// Load rig data from a JSON file (or a directory holding `skeleton.json`).
    pub fn load(path: impl AsRef<Path>, layout: KeypointLayout) -> Result<Self, SkeletonError> {
        let export = SkeletonExport::load(path)?;
        Self::from_export(&export, layout)
    }

    pub fn from_export(
        export: &SkeletonExport,
        layout: KeypointLayout,
    ) -> Result<Self, SkeletonError> {
        export.check_lengths()?;

        let mut name_index: HashMap<&str, usize> = HashMap::with_capacity(export.bone_names.len());
        for (i, name) in export.bone_names.iter().enumerate() {
            if name_index.insert(name.as_str(), i).is_some() {
                return Err(SkeletonError::DuplicateBone(name.clone()));
            }
        }

        let mut bones = Vec::with_capacity(export.bone_names.len());
        for (i, name) in export.bone_names.iter().enumerate() {
            let parent = match &export.bone_parents[i] {
                None => None,
                Some(parent_name) => {
                    let &p = name_index.get(parent_name.as_str()).ok_or_else(|| {
                        SkeletonError::UnknownParent {
                            bone: name.clone(),
                            parent: parent_name.clone(),
                        }
                    })?;
                    if p >= i {
                        return Err(SkeletonError::ParentOrder {
                            bone: name.clone(),
                            parent: parent_name.clone(),
                        });
                    }
                    Some(p)
                }
            };
            bones.push(Bone {
                index: i,
                name: name.clone(),
                parent,
                rest_local: mat4_from_rows(&export.matrix_local_rest[i]),
                rest_world: mat4_from_rows(&export.matrix_world_rest[i]),
            });
        }

        // keypoint index -> bone index; keypoints outside the layout are ignored
        let mut keypoint_bones = vec![None; layout.num_keypoints()];
        for (keypoint, bone_name) in &export.remap {
            let &b = name_index.get(bone_name.as_str()).ok_or_else(|| {
                SkeletonError::UnknownRemapBone {
                    keypoint: keypoint.clone(),
                    bone: bone_name.clone(),
                }
            })?;
            if let Some(k) = layout.index_of(keypoint) {
                keypoint_bones[k] = Some(b);
            }
        }

        // Subset: mapped bones and all their ancestors. Optimizable: subset
        // bones with a mapped strict descendant.
        let n = bones.len();
        let mut in_subset = vec![false; n];
        let mut is_optimizable = vec![false; n];
        for &b in keypoint_bones.iter().flatten() {
            in_subset[b] = true;
            let mut cur = bones[b].parent;
            while let Some(p) = cur {
                in_subset[p] = true;
                is_optimizable[p] = true;
                cur = bones[p].parent;
            }
        }

        let optimizable: Vec<usize> = (0..n).filter(|&i| is_optimizable[i]).collect();
        let mut remap = vec![None; n];
        for (k, &b) in optimizable.iter().enumerate() {
            remap[b] = Some(k);
        }

        let subset_bones: Vec<usize> = (0..n).filter(|&i| in_subset[i]).collect();
        let mut subset_index = vec![None; n];
        for (s, &b) in subset_bones.iter().enumerate() {
            subset_index[b] = Some(s);
        }
        let subset_chain = KinematicChain::new(
            subset_bones
                .iter()
                .map(|&b| bones[b].parent.and_then(|p| subset_index[p]))
                .collect(),
            subset_bones.iter().map(|&b| bones[b].rest_local).collect(),
        )?;
        let subset = BoneSubset {
            remap: subset_bones.iter().map(|&b| remap[b]).collect(),
            bones: subset_bones,
            chain: subset_chain,
        };

        let chain = KinematicChain::new(
            bones.iter().map(|b| b.parent).collect(),
            bones.iter().map(|b| b.rest_local).collect(),
        )?;

        let keypoint_bone =
            |name: &str| -> Option<usize> { layout.index_of(name).and_then(|k| keypoint_bones[k]) };
        let constraints =
            JointConstraints::build(&bones, keypoint_bone, &remap, &export.constraints)?;

        let rest_world: Vec<Mat4> = bones.iter().map(|b| b.rest_world).collect();
        let correspondences =
            Correspondences::build(layout, &keypoint_bones, &subset_index, &rest_world)?;

        info!(
            "skeleton loaded: {} bones, {} in subset, {} optimizable, {} direction pairs, {} scale pairs, {} limits",
            bones.len(),
            subset.bones.len(),
            optimizable.len(),
            correspondences.direction.len(),
            correspondences.scale.len(),
            constraints.len()
        );

        Ok(Self {
            layout,
            bones,
            chain,
            keypoint_bones,
            remap,
            optimizable,
            subset,
            constraints,
            correspondences,
        })
    }

    pub fn layout(&self) -> KeypointLayout {
        self.layout
    }

    pub fn num_keypoints(&self) -> usize {
        self.layout.num_keypoints()
    }

    /// Bone each layout keypoint is mapped to, if any.
    pub fn keypoint_bones(&self) -> &[Option<usize>] {
        &self.keypoint_bones
    }

    /// All bones in topological order.
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    /// Optimizable index of every bone (`None` = fixed identity basis).
    pub fn remap(&self) -> &[Option<usize>] {
        &self.remap
    }

    /// `all_bones` indices of the optimizable bones.
    pub fn optimizable(&self) -> &[usize] {
        &self.optimizable
    }

    pub fn num_optimizable(&self) -> usize {
        self.optimizable.len()
    }

    pub fn optimizable_bone_names(&self) -> Vec<String> {
        self.optimizable
            .iter()
            .map(|&b| self.bones[b].name.clone())
            .collect()
    }

    pub fn bone_names(&self) -> Vec<String> {
        self.bones.iter().map(|b| b.name.clone()).collect()
    }

    pub fn subset(&self) -> &BoneSubset {
        &self.subset
    }

    pub fn constraints(&self) -> &JointConstraints {
        &self.constraints
    }

    pub fn correspondences(&self) -> &Correspondences {
        &self.correspondences
    }

    /// World transforms of every bone for a posed, scaled and translated skeleton.
    ///
    /// Rotation and translation rows are multiplied by `scale`, then `location`
    /// is added to every translation.
    pub fn eval_world_transforms(
        &self,
        angles: &[Vec3],
        location: &Vec3,
        scale: Real,
    ) -> Result<Vec<Mat4>, SkeletonError> {
        if angles.len() != self.optimizable.len() {
            return Err(SkeletonError::LengthMismatch {
                field: "angles",
                expected: self.optimizable.len(),
                got: angles.len(),
            });
        }
        let basis = basis_from_angles(&self.remap, angles);
        let mut world = forward(&self.chain, &basis);
        for m in &mut world {
            for r in 0..3 {
                for c in 0..4 {
                    m[(r, c)] *= scale;
                }
                m[(r, 3)] += location[r];
            }
        }
        Ok(world)
    }
}
