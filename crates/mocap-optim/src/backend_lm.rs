use crate::traits::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport, Termination};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use mocap_core::Real;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<Real>,
}

impl<P: NllsProblem> LeastSquaresProblem<Real, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        let r = self.problem.residuals(&self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let j = self.problem.jacobian(&self.params);
        j.iter().all(|v| v.is_finite()).then_some(j)
    }
}

fn termination_of(reason: &TerminationReason) -> Termination {
    match reason {
        TerminationReason::Converged { .. } => Termination::ChangeTolerance,
        TerminationReason::ResidualsZero | TerminationReason::Orthogonal => {
            Termination::GradientTolerance
        }
        TerminationReason::LostPatience => Termination::MaxEvaluations,
        TerminationReason::NoParameters => Termination::NoParameters,
        _ => Termination::Numerical,
    }
}

/// Levenberg-Marquardt over the residual form of a problem.
///
/// `tolerance_change` is used as both `ftol` and `xtol`, `tolerance_grad` as
/// `gtol`. Iterations reported are residual evaluations.
#[derive(Debug, Default, Clone, Copy)]
pub struct LmBackend;

impl NllsSolverBackend for LmBackend {
    fn solve<P: NllsProblem>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        let initial_cost = problem.residuals(&x0).norm_squared();
        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.tolerance_change)
            .with_xtol(opts.tolerance_change)
            .with_gtol(opts.tolerance_grad)
            .with_patience(opts.max_iters.max(1));

        let wrapper = LmWrapper {
            problem,
            params: x0,
        };

        let (wrapper, report) = lm.minimize(wrapper);
        let x_opt = wrapper.params();

        (
            x_opt,
            SolveReport {
                iterations: report.number_of_evaluations,
                evaluations: report.number_of_evaluations,
                initial_cost,
                // the crate reports 0.5 * ||r||^2
                final_cost: 2.0 * report.objective_function,
                converged: report.termination.was_successful(),
                termination: termination_of(&report.termination),
            },
        )
    }
}
