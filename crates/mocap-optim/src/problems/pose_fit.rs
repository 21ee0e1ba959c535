//! Per-frame joint-angle fitting against observed bone directions.
//!
//! Parameters are the flattened YXZ Euler angles of the optimizable bones,
//! `x[3 k + slot]` with slots ordered `[y, x, z]`. The loss is
//!
//! ```text
//! L(x) = 1/(3M) sum_p |dir_p(x) - target_p|^2
//!      + w_b sum_l [ e(4 (x_l - max_l)) + e(4 (min_l - x_l)) ]
//!      + w_r 1/n sum_i x_i^2
//! ```
//!
//! where `dir_p` is the world-space offset between the two joints of pair
//! `p` and `e` is the overflow-safe exponential. The same loss is exposed as
//! a residual vector whose squared norm equals `L`, so it can be handed to
//! either solver family.

use crate::backend_lm::LmBackend;
use crate::lbfgs::LbfgsBackend;
use crate::traits::{
    MinimizerBackend, NllsProblem, NllsSolverBackend, Objective, SolveOptions, SolveReport,
};
use anyhow::{ensure, Result};
use mocap_core::{
    backward, basis_from_angles, euler_yxz_partials, forward, stable_exp, stable_exp_derivative,
    translation, DirectionPair, JointLimit, KinematicChain, Mat4, Real, SkeletonModel, Vec3,
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Steepness of the joint-limit barrier.
const BARRIER_SHARPNESS: Real = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseFitWeights {
    /// Weight of the joint-limit barrier.
    pub joint_constraint: Real,
    /// Weight of the mean squared angle regularizer.
    pub pose_reg: Real,
}

impl Default for PoseFitWeights {
    fn default() -> Self {
        Self {
            joint_constraint: 1.0,
            pose_reg: 0.1,
        }
    }
}

/// Solver family used for the per-frame fit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitBackend {
    /// L-BFGS with a strong-Wolfe line search on the scalar loss.
    #[default]
    Lbfgs,
    /// Levenberg-Marquardt on the residual form.
    LevenbergMarquardt,
}

/// One frame's fitting problem over a kinematic chain.
#[derive(Debug, Clone)]
pub struct PoseFitProblem<'a> {
    chain: &'a KinematicChain,
    /// Optimizable index of every chain bone.
    remap: &'a [Option<usize>],
    num_optimizable: usize,
    limits: &'a [JointLimit],
    weights: PoseFitWeights,
    /// Chain indices `(a, b)` of each compared joint pair.
    pairs: Vec<(usize, usize)>,
    /// Observed offset `b - a` for each pair, in rest-pose units.
    targets: Vec<Vec3>,
}

impl<'a> PoseFitProblem<'a> {
    pub fn new(
        chain: &'a KinematicChain,
        remap: &'a [Option<usize>],
        limits: &'a [JointLimit],
        weights: PoseFitWeights,
        pairs: Vec<(usize, usize)>,
        targets: Vec<Vec3>,
    ) -> Result<Self> {
        ensure!(
            remap.len() == chain.len(),
            "remap covers {} bones, chain has {}",
            remap.len(),
            chain.len()
        );
        ensure!(!pairs.is_empty(), "at least one joint pair is required");
        ensure!(
            pairs.len() == targets.len(),
            "{} joint pairs but {} targets",
            pairs.len(),
            targets.len()
        );
        ensure!(
            pairs.iter().all(|&(a, b)| a < chain.len() && b < chain.len()),
            "joint pair index out of range"
        );
        let num_optimizable = remap.iter().flatten().max().map_or(0, |k| k + 1);
        ensure!(
            limits.iter().all(|l| l.dof < 3 * num_optimizable),
            "joint limit addresses a missing degree of freedom"
        );
        Ok(Self {
            chain,
            remap,
            num_optimizable,
            limits,
            weights,
            pairs,
            targets,
        })
    }

    /// Problem over the model's optimization subset for the given pairs.
    pub fn from_model(
        model: &'a SkeletonModel,
        pairs: &[DirectionPair],
        targets: Vec<Vec3>,
        weights: PoseFitWeights,
    ) -> Result<Self> {
        let subset = model.subset();
        Self::new(
            &subset.chain,
            &subset.remap,
            model.constraints().limits(),
            weights,
            pairs.iter().map(|p| p.joints).collect(),
            targets,
        )
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    fn angles(&self, x: &DVector<Real>) -> Vec<Vec3> {
        debug_assert_eq!(x.len(), 3 * self.num_optimizable);
        x.as_slice()
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect()
    }

    fn pose(&self, x: &DVector<Real>) -> (Vec<Vec3>, Vec<Mat4>, Vec<Mat4>) {
        let angles = self.angles(x);
        let basis = basis_from_angles(self.remap, &angles);
        let world = forward(self.chain, &basis);
        (angles, basis, world)
    }

    /// Model-minus-observed offset for every pair.
    fn direction_errors(&self, world: &[Mat4]) -> Vec<Vec3> {
        self.pairs
            .iter()
            .zip(self.targets.iter())
            .map(|(&(a, b), target)| translation(&world[b]) - translation(&world[a]) - target)
            .collect()
    }

    /// Pull `dL/dbasis` back onto the Euler angles of each optimizable bone.
    fn chain_to_angles(&self, angles: &[Vec3], d_basis: &[Mat4], out: &mut [Real]) {
        for (bone, slot) in self.remap.iter().enumerate() {
            let Some(k) = *slot else {
                continue;
            };
            let g = d_basis[bone].fixed_view::<3, 3>(0, 0);
            for (s, partial) in euler_yxz_partials(&angles[k]).iter().enumerate() {
                out[3 * k + s] += g.component_mul(partial).sum();
            }
        }
    }

    fn direction_scale(&self) -> Real {
        1.0 / (3 * self.pairs.len()) as Real
    }

    fn barrier_args(&self, x: &DVector<Real>, limit: &JointLimit) -> (Real, Real) {
        let v = x[limit.dof];
        (
            BARRIER_SHARPNESS * (v - limit.max),
            BARRIER_SHARPNESS * (limit.min - v),
        )
    }
}

impl Objective for PoseFitProblem<'_> {
    fn num_params(&self) -> usize {
        3 * self.num_optimizable
    }

    fn cost_and_gradient(&self, x: &DVector<Real>) -> (Real, DVector<Real>) {
        let n = 3 * self.num_optimizable;
        let (angles, basis, world) = self.pose(x);
        let errors = self.direction_errors(&world);
        let inv = self.direction_scale();

        let mut cost = inv * errors.iter().map(|e| e.norm_squared()).sum::<Real>();
        let mut d_world = vec![Mat4::zeros(); self.chain.len()];
        for (&(a, b), e) in self.pairs.iter().zip(errors.iter()) {
            let g = e * (2.0 * inv);
            for r in 0..3 {
                d_world[b][(r, 3)] += g[r];
                d_world[a][(r, 3)] -= g[r];
            }
        }
        let d_basis = backward(self.chain, &basis, &world, &d_world);
        let mut grad = DVector::zeros(n);
        self.chain_to_angles(&angles, &d_basis, grad.as_mut_slice());

        let w_b = self.weights.joint_constraint;
        for limit in self.limits {
            let (hi, lo) = self.barrier_args(x, limit);
            cost += w_b * (stable_exp(hi) + stable_exp(lo));
            grad[limit.dof] += w_b
                * BARRIER_SHARPNESS
                * (stable_exp_derivative(hi) - stable_exp_derivative(lo));
        }

        if n > 0 {
            let w_r = self.weights.pose_reg / n as Real;
            cost += w_r * x.norm_squared();
            grad.axpy(2.0 * w_r, x, 1.0);
        }
        (cost, grad)
    }
}

impl NllsProblem for PoseFitProblem<'_> {
    fn num_params(&self) -> usize {
        3 * self.num_optimizable
    }

    /// `3M` direction rows, two barrier rows per limit, one row per angle.
    fn num_residuals(&self) -> usize {
        3 * self.pairs.len() + 2 * self.limits.len() + 3 * self.num_optimizable
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        let n = 3 * self.num_optimizable;
        let (_, _, world) = self.pose(x);
        let s = self.direction_scale().sqrt();
        let mut r = Vec::with_capacity(NllsProblem::num_residuals(self));
        for e in self.direction_errors(&world) {
            r.extend(e.iter().map(|v| v * s));
        }
        let w_b = self.weights.joint_constraint;
        for limit in self.limits {
            let (hi, lo) = self.barrier_args(x, limit);
            r.push((w_b * stable_exp(hi)).sqrt());
            r.push((w_b * stable_exp(lo)).sqrt());
        }
        if n > 0 {
            let w = (self.weights.pose_reg / n as Real).sqrt();
            r.extend(x.iter().map(|v| v * w));
        }
        DVector::from_vec(r)
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let n = 3 * self.num_optimizable;
        let rows = NllsProblem::num_residuals(self);
        let mut jac = DMatrix::zeros(rows, n);
        let (angles, basis, world) = self.pose(x);
        let s = self.direction_scale().sqrt();

        let mut d_world = vec![Mat4::zeros(); self.chain.len()];
        let mut row_grad = vec![0.0; n];
        for (p, &(a, b)) in self.pairs.iter().enumerate() {
            for c in 0..3 {
                d_world.iter_mut().for_each(|m| m.fill(0.0));
                d_world[b][(c, 3)] += s;
                d_world[a][(c, 3)] -= s;
                let d_basis = backward(self.chain, &basis, &world, &d_world);
                row_grad.iter_mut().for_each(|v| *v = 0.0);
                self.chain_to_angles(&angles, &d_basis, &mut row_grad);
                for (j, v) in row_grad.iter().enumerate() {
                    jac[(3 * p + c, j)] = *v;
                }
            }
        }

        let w_b = self.weights.joint_constraint;
        let mut row = 3 * self.pairs.len();
        for limit in self.limits {
            let (hi, lo) = self.barrier_args(x, limit);
            let r_hi = (w_b * stable_exp(hi)).sqrt();
            let r_lo = (w_b * stable_exp(lo)).sqrt();
            if r_hi > 0.0 {
                jac[(row, limit.dof)] =
                    w_b * BARRIER_SHARPNESS * stable_exp_derivative(hi) / (2.0 * r_hi);
            }
            if r_lo > 0.0 {
                jac[(row + 1, limit.dof)] =
                    -w_b * BARRIER_SHARPNESS * stable_exp_derivative(lo) / (2.0 * r_lo);
            }
            row += 2;
        }

        if n > 0 {
            let w = (self.weights.pose_reg / n as Real).sqrt();
            for i in 0..n {
                jac[(row + i, i)] = w;
            }
        }
        jac
    }
}

/// Run the selected solver family on a pose-fit problem.
pub fn solve_pose(
    problem: &PoseFitProblem<'_>,
    x0: DVector<Real>,
    backend: FitBackend,
    opts: &SolveOptions,
) -> (DVector<Real>, SolveReport) {
    match backend {
        FitBackend::Lbfgs => LbfgsBackend.minimize(problem, x0, opts),
        FitBackend::LevenbergMarquardt => LmBackend.solve(problem, x0, opts),
    }
}
