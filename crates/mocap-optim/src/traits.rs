use mocap_core::Real;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Smooth scalar objective with an analytic gradient.
pub trait Objective {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;

    /// Objective value and gradient at `x`.
    fn cost_and_gradient(&self, x: &DVector<Real>) -> (Real, DVector<Real>);

    fn cost(&self, x: &DVector<Real>) -> Real {
        self.cost_and_gradient(x).0
    }
}

/// Non-linear least squares problem with dense parameter/residual vectors.
///
/// The cost is `||r(x)||^2` (no 1/2 factor), matching [`Objective`] so both
/// solver families report comparable values.
pub trait NllsProblem {
    /// Number of parameters in the optimization vector.
    fn num_params(&self) -> usize;
    /// Number of residual rows in the problem.
    fn num_residuals(&self) -> usize;

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Maximum number of solver iterations before termination.
    ///
    /// The LM backend follows the MINPACK convention and caps function
    /// evaluations at `max_iters * (n + 1)`.
    pub max_iters: usize,
    /// Initial step length of each line search.
    pub lr: Real,
    /// Stop once the largest gradient component falls below this value.
    pub tolerance_grad: Real,
    /// Stop once the cost or the parameter step changes less than this value.
    pub tolerance_change: Real,
    /// Number of correction pairs kept by L-BFGS.
    pub history_size: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            lr: 1.0,
            tolerance_grad: 1e-7,
            tolerance_change: 1e-9,
            history_size: 100,
        }
    }
}

/// Why a solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    GradientTolerance,
    ChangeTolerance,
    MaxIterations,
    MaxEvaluations,
    LineSearchFailed,
    NoParameters,
    Numerical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub iterations: usize,
    pub evaluations: usize,
    pub initial_cost: Real,
    pub final_cost: Real,
    pub converged: bool,
    pub termination: Termination,
}

/// Solver for least-squares problems.
pub trait NllsSolverBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}

/// Solver for general smooth objectives.
pub trait MinimizerBackend {
    fn minimize<O: Objective>(
        &self,
        objective: &O,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport);
}
