//! Randomized kinematic chains.

use crate::skeleton::KinematicChain;
use crate::{euler_yxz_to_rotation, homogeneous_rotation, Mat4, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random topologically ordered chain with `n` bones.
///
/// Bone 0 is always a root; later bones occasionally start a new root.
/// Rest transforms combine a random rotation with a random offset.
pub fn random_chain(seed: u64, n: usize) -> KinematicChain {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut parents = Vec::with_capacity(n);
    let mut rest_local = Vec::with_capacity(n);
    for i in 0..n {
        let parent = if i == 0 || rng.random_bool(0.1) {
            None
        } else {
            Some(rng.random_range(0..i))
        };
        let angles = Vec3::new(
            rng.random_range(-0.8..0.8),
            rng.random_range(-0.8..0.8),
            rng.random_range(-0.8..0.8),
        );
        let offset = Vec3::new(
            rng.random_range(-0.5..0.5),
            rng.random_range(-0.5..0.5),
            rng.random_range(-0.5..0.5),
        );
        let rest: Mat4 = Mat4::new_translation(&offset) * homogeneous_rotation(&euler_yxz_to_rotation(&angles));
        parents.push(parent);
        rest_local.push(rest);
    }
    KinematicChain::from_parts(parents, rest_local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_are_reproducible_and_ordered() {
        let a = random_chain(42, 20);
        let b = random_chain(42, 20);
        assert_eq!(a, b);
        assert_eq!(a.parents()[0], None);
        for (i, p) in a.parents().iter().enumerate() {
            if let Some(p) = p {
                assert!(*p < i);
            }
        }
    }
}
