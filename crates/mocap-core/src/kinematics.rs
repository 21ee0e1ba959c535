//! Forward and backward evaluation of hierarchical bone transforms.
//!
//! For each bone `i` with rest transform `rest[i]` and pose basis `basis[i]`:
//!
//! ```text
//! local[i] = rest[i] * basis[i]
//! world[i] = world[parent[i]] * local[i]     (root: world[i] = local[i])
//! ```
//!
//! [`backward`] is the exact reverse-mode derivative of [`forward`]: given
//! `dL/dworld` for every bone it returns `dL/dbasis`, accumulating each
//! bone's contribution into its parent on the way from leaves to roots.

use crate::skeleton::{KinematicChain, SkeletonError};
use crate::{euler_yxz_to_rotation, homogeneous_rotation, Mat3, Mat4, Vec3};
use std::collections::HashSet;

/// Compose local transforms into world transforms in one index pass.
pub fn forward(chain: &KinematicChain, basis: &[Mat4]) -> Vec<Mat4> {
    debug_assert_eq!(basis.len(), chain.len());
    let mut world: Vec<Mat4> = Vec::with_capacity(chain.len());
    for (i, (rest, b)) in chain.rest_local().iter().zip(basis.iter()).enumerate() {
        let local = rest * b;
        let m = match chain.parents()[i] {
            Some(p) => world[p] * local,
            None => local,
        };
        world.push(m);
    }
    world
}

/// Gradient of a loss with respect to every `basis[i]`, given its gradient
/// with respect to every `world[i]`.
///
/// `world` must be the output of [`forward`] for the same `basis`.
pub fn backward(
    chain: &KinematicChain,
    basis: &[Mat4],
    world: &[Mat4],
    d_world: &[Mat4],
) -> Vec<Mat4> {
    debug_assert_eq!(basis.len(), chain.len());
    debug_assert_eq!(world.len(), chain.len());
    debug_assert_eq!(d_world.len(), chain.len());

    let mut d_world = d_world.to_vec();
    let mut d_basis = vec![Mat4::zeros(); chain.len()];
    for i in (0..chain.len()).rev() {
        let rest = &chain.rest_local()[i];
        match chain.parents()[i] {
            Some(p) => {
                d_basis[i] = rest.transpose() * world[p].transpose() * d_world[i];
                let local = rest * basis[i];
                let to_parent = d_world[i] * local.transpose();
                d_world[p] += to_parent;
            }
            None => {
                d_basis[i] = rest.transpose() * d_world[i];
            }
        }
    }
    d_basis
}

/// Per-bone basis matrices: YXZ rotations for optimizable bones, identity otherwise.
pub fn basis_from_angles(remap: &[Option<usize>], angles: &[Vec3]) -> Vec<Mat4> {
    remap
        .iter()
        .map(|slot| match slot {
            Some(k) => homogeneous_rotation(&euler_yxz_to_rotation(&angles[*k])),
            None => Mat4::identity(),
        })
        .collect()
}

/// Replacement applied to one bone by [`rebase_world_transforms`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldOverride {
    /// Replace only the rotation block, keeping the bone's world position.
    Rotation(Mat3),
    /// Replace the full world transform.
    Full(Mat4),
}

/// Override the world transform of some bones and carry their descendants along.
///
/// Every descendant of an overridden bone keeps its original transform
/// relative to its parent.
pub fn rebase_world_transforms(
    parents: &[Option<usize>],
    world: &[Mat4],
    overrides: &[(usize, WorldOverride)],
) -> Result<Vec<Mat4>, SkeletonError> {
    let mut updated = world.to_vec();
    let mut moved: HashSet<usize> = HashSet::with_capacity(overrides.len());
    for (i, o) in overrides {
        match o {
            WorldOverride::Rotation(r) => updated[*i].fixed_view_mut::<3, 3>(0, 0).copy_from(r),
            WorldOverride::Full(m) => updated[*i] = *m,
        }
        moved.insert(*i);
    }
    for (i, parent) in parents.iter().enumerate() {
        let Some(p) = *parent else {
            continue;
        };
        if moved.contains(&p) && !moved.contains(&i) {
            let parent_inv = world[p]
                .try_inverse()
                .ok_or(SkeletonError::SingularTransform(p))?;
            updated[i] = updated[p] * (parent_inv * world[i]);
            moved.insert(i);
        }
    }
    Ok(updated)
}
