//! Box-constrained Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! The solver minimizes `Σ r_i(θ)²` over a box `lower <= θ <= upper`:
//!
//! - Jacobian by forward differences (backward when the forward step would
//!   leave the box)
//! - Marquardt scaling: damping proportional to the squared column norms
//! - every trial point is projected back into the box
//! - a parameter pinned on a bound that the gradient pushes against is held
//!   fixed for that iteration, so the step goes to the free parameters
//!
//! A starting point whose Jacobian is rank-deficient is rejected up front;
//! this is the only "singular" failure, since damping keeps every later step
//! solvable.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::math::ols::{column_condition, solve_least_squares};

/// Relative singular value below which a Jacobian is treated as singular.
const SINGULAR_RCOND: f64 = 1e-10;
/// Damping above which no further progress is possible.
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_MIN: f64 = 1e-15;
/// Relative SSE drop that counts as no progress once a parameter sits on a bound.
const BOUND_STALL_FTOL: f64 = 1e-6;

/// Solver knobs.
#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Stop when an accepted step lowers the SSE by less than this fraction.
    pub ftol: f64,
    /// Stop when the accepted step is this small relative to `‖θ‖`.
    pub xtol: f64,
    /// Stop when every Jacobian column is this close to orthogonal to `r`.
    pub gtol: f64,
    pub lambda_init: f64,
    /// Hard wall-clock deadline.
    pub deadline: Option<Instant>,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            lambda_init: 1e-3,
            deadline: None,
        }
    }
}

/// Why the solver stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ExactFit,
    ResidualTolerance,
    StepTolerance,
    GradientTolerance,
    /// No downhill step exists even with maximal damping.
    DampingSaturated,
    /// A parameter sits on a bound and the SSE has stopped moving.
    BoundStall,
}

/// Result of a successful minimization.
#[derive(Debug, Clone)]
pub struct LmReport {
    pub params: Vec<f64>,
    pub residuals: Vec<f64>,
    pub sse: f64,
    pub iterations: usize,
    pub termination: Termination,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LmError {
    #[error("residuals are not finite at the starting point")]
    NonFiniteStart,
    #[error("Jacobian is singular at the starting point")]
    SingularJacobian,
    #[error("iteration limit reached ({0})")]
    IterationLimit(usize),
    #[error("deadline exceeded after {0} iterations")]
    Deadline(usize),
}

/// Minimize `‖r(θ)‖²` subject to box bounds.
///
/// `residual(θ, out)` must fill `out` (length `m`) with the residuals at `θ`.
pub fn minimize<F>(
    residual: F,
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    m: usize,
    opts: &LmOptions,
) -> Result<LmReport, LmError>
where
    F: Fn(&[f64], &mut [f64]),
{
    let n = x0.len();
    let mut x = project(x0, lower, upper);
    let mut r = vec![0.0; m];
    if !evaluate(&residual, &x, &mut r) {
        return Err(LmError::NonFiniteStart);
    }
    let mut sse = sum_sq(&r);

    // Anything below this is indistinguishable from a perfect fit.
    let exact_tol = 1e-28 * m as f64;

    let mut jac = jacobian(&residual, &x, &r, lower, upper).ok_or(LmError::NonFiniteStart)?;
    if m >= n && column_condition(&jac) < SINGULAR_RCOND {
        return Err(LmError::SingularJacobian);
    }

    let mut lambda = opts.lambda_init;
    let mut iterations = 0usize;
    let mut trial = vec![0.0; m];

    loop {
        if sse <= exact_tol {
            return Ok(report(x, r, sse, iterations, Termination::ExactFit));
        }
        let r_vec = DVector::from_column_slice(&r);
        let grad = jac.tr_mul(&r_vec);
        if gradient_is_flat(&jac, &grad, r_vec.norm(), &x, lower, upper, opts.gtol) {
            return Ok(report(x, r, sse, iterations, Termination::GradientTolerance));
        }
        if iterations >= opts.max_iterations {
            return Err(LmError::IterationLimit(iterations));
        }
        iterations += 1;

        // Marquardt scaling, floored so parameters without current influence
        // still receive some damping.
        let col_sq: Vec<f64> = jac.column_iter().map(|c| c.norm_squared()).collect();
        let floor = col_sq.iter().cloned().fold(0.0, f64::max) * 1e-12 + f64::MIN_POSITIVE;
        let diag: Vec<f64> = col_sq.iter().map(|&d| d.max(floor)).collect();
        // Non-empty: with every parameter blocked the gradient test above succeeds.
        let free: Vec<usize> = (0..n)
            .filter(|&j| !is_blocked(x[j], grad[j], lower[j], upper[j]))
            .collect();
        let nf = free.len();

        loop {
            if let Some(deadline) = opts.deadline {
                if Instant::now() >= deadline {
                    return Err(LmError::Deadline(iterations));
                }
            }

            let mut a = DMatrix::<f64>::zeros(m + nf, nf);
            for (col, &j) in free.iter().enumerate() {
                for i in 0..m {
                    a[(i, col)] = jac[(i, j)];
                }
                a[(m + col, col)] = (lambda * diag[j]).sqrt();
            }
            let mut b = DVector::<f64>::zeros(m + nf);
            for i in 0..m {
                b[i] = -r[i];
            }

            let accepted = solve_least_squares(&a, &b).and_then(|delta| {
                let mut stepped = x.clone();
                for (col, &j) in free.iter().enumerate() {
                    stepped[j] += delta[col];
                }
                let x_new = project(&stepped, lower, upper);
                if !evaluate(&residual, &x_new, &mut trial) {
                    return None;
                }
                let sse_new = sum_sq(&trial);
                (sse_new < sse).then_some((x_new, sse_new))
            });

            match accepted {
                Some((x_new, sse_new)) => {
                    let rel_drop = (sse - sse_new) / sse;
                    let step = x_new
                        .iter()
                        .zip(&x)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>()
                        .sqrt();
                    let x_norm = x_new.iter().map(|v| v * v).sum::<f64>().sqrt();

                    x = x_new;
                    std::mem::swap(&mut r, &mut trial);
                    sse = sse_new;
                    lambda = (lambda * 0.1).max(LAMBDA_MIN);

                    if rel_drop <= opts.ftol {
                        return Ok(report(x, r, sse, iterations, Termination::ResidualTolerance));
                    }
                    if step <= opts.xtol * (x_norm + opts.xtol) {
                        return Ok(report(x, r, sse, iterations, Termination::StepTolerance));
                    }
                    if rel_drop <= BOUND_STALL_FTOL && on_bound(&x, lower, upper) {
                        return Ok(report(x, r, sse, iterations, Termination::BoundStall));
                    }
                    match jacobian(&residual, &x, &r, lower, upper) {
                        Some(j) => jac = j,
                        // The current point is fine; only its neighborhood is not.
                        None => {
                            return Ok(report(x, r, sse, iterations, Termination::DampingSaturated));
                        }
                    }
                    break;
                }
                None => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        return Ok(report(x, r, sse, iterations, Termination::DampingSaturated));
                    }
                }
            }
        }
    }
}

fn report(params: Vec<f64>, residuals: Vec<f64>, sse: f64, iterations: usize, termination: Termination) -> LmReport {
    LmReport {
        params,
        residuals,
        sse,
        iterations,
        termination,
    }
}

fn project(x: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(lower.iter().zip(upper))
        .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
        .collect()
}

fn evaluate<F>(residual: &F, x: &[f64], out: &mut [f64]) -> bool
where
    F: Fn(&[f64], &mut [f64]),
{
    residual(x, out);
    out.iter().all(|v| v.is_finite())
}

/// At a bound with the descent direction `-g` pointing out of the box.
fn is_blocked(x: f64, g: f64, lower: f64, upper: f64) -> bool {
    (x <= lower && g > 0.0) || (x >= upper && g < 0.0)
}

fn on_bound(x: &[f64], lower: &[f64], upper: &[f64]) -> bool {
    x.iter()
        .zip(lower.iter().zip(upper))
        .any(|(&v, (&lo, &hi))| v <= lo || v >= hi)
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Forward-difference Jacobian. Returns `None` if any shifted evaluation is non-finite.
fn jacobian<F>(residual: &F, x: &[f64], r: &[f64], lower: &[f64], upper: &[f64]) -> Option<DMatrix<f64>>
where
    F: Fn(&[f64], &mut [f64]),
{
    let m = r.len();
    let n = x.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut shifted = x.to_vec();
    let mut r_shifted = vec![0.0; m];

    for j in 0..n {
        let mut h = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
        if x[j] + h > upper[j] {
            h = -h;
        }
        if x[j] + h < lower[j] {
            // Degenerate box (lower == upper): the parameter is fixed.
            continue;
        }
        shifted[j] = x[j] + h;
        let ok = evaluate(residual, &shifted, &mut r_shifted);
        shifted[j] = x[j];
        if !ok {
            return None;
        }
        for i in 0..m {
            jac[(i, j)] = (r_shifted[i] - r[i]) / h;
        }
    }
    Some(jac)
}

/// MINPACK-style gradient test on the projected gradient: the cosine between
/// the residual vector and every free Jacobian column is below `gtol`.
fn gradient_is_flat(
    jac: &DMatrix<f64>,
    g: &DVector<f64>,
    r_norm: f64,
    x: &[f64],
    lower: &[f64],
    upper: &[f64],
    gtol: f64,
) -> bool {
    if r_norm == 0.0 {
        return true;
    }
    for (j, col) in jac.column_iter().enumerate() {
        let gj = g[j];
        if is_blocked(x[j], gj, lower[j], upper[j]) {
            continue;
        }
        let c_norm = col.norm();
        if c_norm == 0.0 {
            continue;
        }
        if (gj / (c_norm * r_norm)).abs() > gtol {
            return false;
        }
    }
    true
}
