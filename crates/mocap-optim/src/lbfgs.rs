//! Limited-memory BFGS with a strong-Wolfe line search.
//!
//! The outer loop keeps the last `history_size` correction pairs `(s, y)` and
//! builds search directions with the two-loop recursion. Step lengths come
//! from a bracketing/zoom line search with cubic interpolation that enforces
//!
//! ```text
//! f(x + t d) <= f(x) + c1 t g·d        (sufficient decrease)
//! |g(x + t d)·d| <= c2 |g·d|           (curvature)
//! ```

use crate::traits::{MinimizerBackend, Objective, SolveOptions, SolveReport, Termination};
use log::warn;
use mocap_core::Real;
use nalgebra::DVector;
use std::collections::VecDeque;

const WOLFE_C1: Real = 1e-4;
const WOLFE_C2: Real = 0.9;
const MAX_LINE_SEARCH: usize = 25;
/// Curvature pairs with `y·s` below this are not stored.
const MIN_CURVATURE: Real = 1e-10;

#[derive(Debug, Default, Clone, Copy)]
pub struct LbfgsBackend;

impl MinimizerBackend for LbfgsBackend {
    fn minimize<O: Objective>(
        &self,
        objective: &O,
        x0: DVector<Real>,
        opts: &SolveOptions,
    ) -> (DVector<Real>, SolveReport) {
        minimize(objective, x0, opts)
    }
}

struct Corrections {
    s: VecDeque<DVector<Real>>,
    y: VecDeque<DVector<Real>>,
    rho: VecDeque<Real>,
    capacity: usize,
}

impl Corrections {
    fn new(capacity: usize) -> Self {
        Self {
            s: VecDeque::with_capacity(capacity),
            y: VecDeque::with_capacity(capacity),
            rho: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, s: DVector<Real>, y: DVector<Real>, ys: Real) {
        if self.s.len() == self.capacity {
            self.s.pop_front();
            self.y.pop_front();
            self.rho.pop_front();
        }
        self.s.push_back(s);
        self.y.push_back(y);
        self.rho.push_back(1.0 / ys);
    }

    /// Two-loop recursion: approximate `-H g`.
    fn direction(&self, g: &DVector<Real>, h_diag: Real) -> DVector<Real> {
        let m = self.s.len();
        let mut alpha = vec![0.0; m];
        let mut q = -g;
        for i in (0..m).rev() {
            alpha[i] = self.rho[i] * self.s[i].dot(&q);
            q.axpy(-alpha[i], &self.y[i], 1.0);
        }
        let mut r = q * h_diag;
        for i in 0..m {
            let beta = self.rho[i] * self.y[i].dot(&r);
            r.axpy(alpha[i] - beta, &self.s[i], 1.0);
        }
        r
    }
}

/// Minimize `objective` from `x0`.
///
/// Terminates when the largest gradient component drops below
/// `tolerance_grad`, when the cost or step changes less than
/// `tolerance_change`, or when `max_iters` iterations (or `1.25 * max_iters`
/// objective evaluations) are used up.
pub fn minimize<O: Objective>(
    objective: &O,
    x0: DVector<Real>,
    opts: &SolveOptions,
) -> (DVector<Real>, SolveReport) {
    let max_evals = opts.max_iters + opts.max_iters / 4;
    let mut x = x0;
    let (mut f, mut g) = objective.cost_and_gradient(&x);
    let mut report = SolveReport {
        iterations: 0,
        evaluations: 1,
        initial_cost: f,
        final_cost: f,
        converged: false,
        termination: Termination::MaxIterations,
    };

    if x.is_empty() {
        report.converged = true;
        report.termination = Termination::NoParameters;
        return (x, report);
    }
    if !f.is_finite() {
        report.termination = Termination::Numerical;
        return (x, report);
    }
    if g.amax() <= opts.tolerance_grad {
        report.converged = true;
        report.termination = Termination::GradientTolerance;
        return (x, report);
    }

    let mut corrections = Corrections::new(opts.history_size);
    let mut h_diag = 1.0;

    for iter in 1..=opts.max_iters {
        report.iterations = iter;

        let d = if iter == 1 {
            -&g
        } else {
            corrections.direction(&g, h_diag)
        };
        let gtd = g.dot(&d);
        if gtd > -opts.tolerance_change {
            report.converged = true;
            report.termination = Termination::ChangeTolerance;
            break;
        }

        let t0 = if iter == 1 {
            (1.0 / g.abs().sum()).min(1.0) * opts.lr
        } else {
            opts.lr
        };

        let ls = strong_wolfe(objective, &x, t0, &d, f, &g, gtd, opts.tolerance_change);
        report.evaluations += ls.evaluations;

        if !ls.f.is_finite() || ls.f > f {
            warn!(
                "line search failed to decrease the objective (f = {}, f_new = {})",
                f, ls.f
            );
            report.termination = Termination::LineSearchFailed;
            break;
        }

        let s = &d * ls.t;
        let y = &ls.g - &g;
        let ys = y.dot(&s);
        if ys > MIN_CURVATURE {
            h_diag = ys / y.dot(&y);
            corrections.push(s.clone(), y, ys);
        }

        x += &s;
        let f_prev = f;
        f = ls.f;
        g = ls.g;

        if g.amax() <= opts.tolerance_grad {
            report.converged = true;
            report.termination = Termination::GradientTolerance;
            break;
        }
        if s.amax() <= opts.tolerance_change || (f - f_prev).abs() < opts.tolerance_change {
            report.converged = true;
            report.termination = Termination::ChangeTolerance;
            break;
        }
        if report.evaluations >= max_evals {
            report.termination = Termination::MaxEvaluations;
            break;
        }
    }

    report.final_cost = f;
    (x, report)
}

struct LineSearchResult {
    t: Real,
    f: Real,
    g: DVector<Real>,
    evaluations: usize,
}

/// One line-search sample: step, value, gradient and directional derivative.
#[derive(Clone)]
struct Sample {
    t: Real,
    f: Real,
    g: DVector<Real>,
    gtd: Real,
}

/// Minimizer of the cubic interpolating two samples, clamped to `bounds`.
fn cubic_interpolate(a: (Real, Real, Real), b: (Real, Real, Real), bounds: Option<(Real, Real)>) -> Real {
    let (x1, f1, g1) = a;
    let (x2, f2, g2) = b;
    let (lo, hi) = bounds.unwrap_or(if x1 <= x2 { (x1, x2) } else { (x2, x1) });

    let d1 = g1 + g2 - 3.0 * (f1 - f2) / (x1 - x2);
    let d2_square = d1 * d1 - g1 * g2;
    if d2_square >= 0.0 {
        let d2 = d2_square.sqrt();
        let min_pos = if x1 <= x2 {
            x2 - (x2 - x1) * ((g2 + d2 - d1) / (g2 - g1 + 2.0 * d2))
        } else {
            x1 - (x1 - x2) * ((g1 + d2 - d1) / (g1 - g2 + 2.0 * d2))
        };
        if min_pos.is_finite() {
            return min_pos.max(lo).min(hi);
        }
    }
    0.5 * (lo + hi)
}

#[allow(clippy::too_many_arguments)]
fn strong_wolfe<O: Objective>(
    objective: &O,
    x: &DVector<Real>,
    t_init: Real,
    d: &DVector<Real>,
    f: Real,
    g: &DVector<Real>,
    gtd: Real,
    tolerance_change: Real,
) -> LineSearchResult {
    let d_norm = d.amax();
    let mut evaluations = 0;
    let mut eval = |t: Real| -> Sample {
        evaluations += 1;
        let (f_t, g_t) = objective.cost_and_gradient(&(x + d * t));
        let gtd_t = g_t.dot(d);
        Sample {
            t,
            f: f_t,
            g: g_t,
            gtd: gtd_t,
        }
    };

    let start = Sample {
        t: 0.0,
        f,
        g: g.clone(),
        gtd,
    };
    let mut prev = start.clone();
    let mut cur = eval(t_init);
    let mut ls_iter = 0;

    // Bracketing phase.
    let mut bracket: [Sample; 2];
    loop {
        if cur.f > f + WOLFE_C1 * cur.t * gtd || (ls_iter > 1 && cur.f >= prev.f) {
            bracket = [prev, cur];
            break;
        }
        if cur.gtd.abs() <= -WOLFE_C2 * gtd {
            return LineSearchResult {
                t: cur.t,
                f: cur.f,
                g: cur.g,
                evaluations,
            };
        }
        if cur.gtd >= 0.0 {
            bracket = [prev, cur];
            break;
        }

        let min_step = cur.t + 0.01 * (cur.t - prev.t);
        let max_step = cur.t * 10.0;
        let t_next = cubic_interpolate(
            (prev.t, prev.f, prev.gtd),
            (cur.t, cur.f, cur.gtd),
            Some((min_step, max_step)),
        );
        prev = cur;
        cur = eval(t_next);
        ls_iter += 1;

        if ls_iter == MAX_LINE_SEARCH {
            bracket = [start, cur];
            break;
        }
    }

    // Zoom phase.
    let mut insufficient_progress = false;
    let (mut low, mut high) = if bracket[0].f <= bracket[1].f { (0, 1) } else { (1, 0) };
    while ls_iter < MAX_LINE_SEARCH {
        let width = (bracket[1].t - bracket[0].t).abs();
        if width * d_norm < tolerance_change {
            break;
        }

        let mut t = cubic_interpolate(
            (bracket[0].t, bracket[0].f, bracket[0].gtd),
            (bracket[1].t, bracket[1].f, bracket[1].gtd),
            None,
        );
        let b_max = bracket[0].t.max(bracket[1].t);
        let b_min = bracket[0].t.min(bracket[1].t);
        let eps = 0.1 * (b_max - b_min);
        if (b_max - t).min(t - b_min) < eps {
            // Too close to a bracket end: move away unless the last step was fine.
            if insufficient_progress || t >= b_max || t <= b_min {
                t = if (t - b_max).abs() < (t - b_min).abs() {
                    b_max - eps
                } else {
                    b_min + eps
                };
                insufficient_progress = false;
            } else {
                insufficient_progress = true;
            }
        } else {
            insufficient_progress = false;
        }

        let sample = eval(t);
        ls_iter += 1;

        if sample.f > f + WOLFE_C1 * t * gtd || sample.f >= bracket[low].f {
            bracket[high] = sample;
            (low, high) = if bracket[0].f <= bracket[1].f { (0, 1) } else { (1, 0) };
        } else {
            if sample.gtd.abs() <= -WOLFE_C2 * gtd {
                bracket[low] = sample;
                break;
            }
            if sample.gtd * (bracket[high].t - bracket[low].t) >= 0.0 {
                bracket[high] = bracket[low].clone();
            }
            bracket[low] = sample;
        }
    }

    let [a, b] = bracket;
    let best = if low == 0 { a } else { b };
    LineSearchResult {
        t: best.t,
        f: best.f,
        g: best.g,
        evaluations,
    }
}
