//! Fitting one model to one compound.
//!
//! Given:
//! - positive concentrations `x_i`
//! - observed responses `y_i` (replicates kept as separate rows)
//! - a model kind
//!
//! we run a bounded Levenberg–Marquardt from several starting points and keep
//! the lowest-SSE converged solution.
//!
//! Failure is a value (`FitFailure`), never a panic: a failed fit is recorded
//! in the summary table and does not affect sibling fits.

use std::time::{Duration, Instant};

use crate::domain::{CompoundGroup, FitFailure, FitOptions, FitResult, FittedCurve, ModelKind};
use crate::fit::metrics;
use crate::fit::start_grid::start_points;
use crate::math::{minimize, LmError, LmOptions, LmReport};
use crate::models::{predict, setup, summarize, ModelSetup};

/// Fit `model` to a compound group, using its positive-concentration rows.
pub fn fit_group(group: &CompoundGroup, model: ModelKind, opts: &FitOptions) -> FitResult {
    let (x, y) = group.positive_points();
    fit(&group.compound, model, &x, &y, opts)
}

/// Fit `model` to paired concentrations and responses.
///
/// Rows with a non-positive concentration are ignored.
pub fn fit(compound: &str, model: ModelKind, x: &[f64], y: &[f64], opts: &FitOptions) -> FitResult {
    FitResult {
        compound: compound.to_string(),
        model,
        outcome: fit_curve(model, x, y, opts),
    }
}

/// Core fitting routine.
pub fn fit_curve(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    opts: &FitOptions,
) -> Result<FittedCurve, FitFailure> {
    let (x, y): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(xi, _)| **xi > 0.0)
        .map(|(&xi, &yi)| (xi, yi))
        .unzip();

    let n = x.len();
    let k = model.param_count();
    if n < k {
        return Err(FitFailure::TooFewPoints { n, k });
    }

    let data = summarize(&x, &y).ok_or(FitFailure::NonFiniteResidual)?;
    let model_setup = setup(model, &data);
    let starts = start_points(&model_setup, &data, opts.potency_starts);
    let (lower, upper) = model_setup.internal_bounds();

    let started = Instant::now();
    let lm_opts = LmOptions {
        max_iterations: opts.max_iterations,
        deadline: opts.time_budget.map(|b| started + b),
        ..LmOptions::default()
    };

    let residual = |theta: &[f64], out: &mut [f64]| {
        let params = model_setup.to_external(theta);
        for i in 0..n {
            out[i] = y[i] - predict(model, x[i], &params);
        }
    };

    let mut best: Option<LmReport> = None;
    let mut first_failure: Option<FitFailure> = None;

    for (idx, start) in starts.iter().enumerate() {
        if lm_opts.deadline.is_some_and(|d| Instant::now() >= d) {
            log::debug!("{model}: time budget spent before start {idx}");
            first_failure = Some(to_failure(LmError::Deadline(0), started.elapsed()));
            break;
        }
        let x0 = model_setup.to_internal(start);
        match minimize(&residual, &x0, &lower, &upper, n, &lm_opts) {
            Ok(report) => {
                // Strict `<` keeps the earlier start on ties.
                if best.as_ref().is_none_or(|b| report.sse < b.sse) {
                    best = Some(report);
                }
            }
            Err(err) => {
                let deadline_hit = matches!(err, LmError::Deadline(_));
                let failure = to_failure(err, started.elapsed());
                log::debug!("{model} start {idx} failed: {failure}");
                // An expired budget outranks whatever the first start hit.
                if idx == 0 || deadline_hit {
                    first_failure = Some(failure);
                }
                if deadline_hit {
                    break;
                }
            }
        }
    }

    let Some(report) = best else {
        return Err(first_failure.unwrap_or(FitFailure::NonFiniteResidual));
    };

    finish(model, &model_setup, &x, &y, report)
}

fn finish(
    model: ModelKind,
    model_setup: &ModelSetup,
    x: &[f64],
    y: &[f64],
    report: LmReport,
) -> Result<FittedCurve, FitFailure> {
    let params = model_setup.to_external(&report.params);
    if params.iter().any(|p| !p.is_finite()) {
        return Err(FitFailure::NonFiniteResidual);
    }

    let residuals: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| yi - predict(model, xi, &params))
        .collect();
    if residuals.iter().any(|r| !r.is_finite()) {
        return Err(FitFailure::NonFiniteResidual);
    }

    let metrics = metrics::evaluate(&residuals, y, model.param_count());
    Ok(FittedCurve {
        params,
        residuals,
        metrics,
        iterations: report.iterations,
    })
}

fn to_failure(err: LmError, elapsed: Duration) -> FitFailure {
    match err {
        LmError::NonFiniteStart => FitFailure::NonFiniteResidual,
        LmError::SingularJacobian => FitFailure::SingularJacobian,
        LmError::IterationLimit(iterations) => FitFailure::IterationLimit { iterations },
        LmError::Deadline(_) => FitFailure::TimeBudget {
            elapsed_ms: elapsed.as_millis() as u64,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    const CONCS: [f64; 6] = [0.1, 1.0, 10.0, 100.0, 1000.0, 10000.0];

    fn logistic_data(truth: [f64; 4], replicates: usize, noise: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, noise.max(1e-300)).unwrap();
        let mut x = Vec::new();
        let mut y = Vec::new();
        for &c in &CONCS {
            for _ in 0..replicates {
                let e = if noise > 0.0 { normal.sample(&mut rng) } else { 0.0 };
                x.push(c);
                y.push(predict(ModelKind::FourParam, c, &truth) + e);
            }
        }
        (x, y)
    }

    #[test]
    fn recovers_noiseless_four_param_curve() {
        let truth = [0.1, 1.0, 100.0, 1.5];
        let (x, y) = logistic_data(truth, 3, 0.0, 0);
        let curve = fit_curve(ModelKind::FourParam, &x, &y, &FitOptions::default()).unwrap();
        assert_relative_eq!(curve.params[2], 100.0, max_relative = 0.01);
        assert_relative_eq!(curve.params[3], 1.5, max_relative = 0.01);
        assert!(curve.metrics.rmse < 1e-4);
        assert_eq!(curve.residuals.len(), x.len());
    }

    #[test]
    fn recovers_potency_under_small_noise() {
        let truth = [0.05, 0.9, 500.0, 2.0];
        let (x, y) = logistic_data(truth, 3, 0.01, 7);
        let fit = fit("B", ModelKind::FourParam, &x, &y, &FitOptions::default());
        assert!(fit.converged(), "{:?}", fit.failure());
        assert_relative_eq!(fit.ic50(), 500.0, max_relative = 0.10);
    }

    #[test]
    fn mismatched_form_fits_worse() {
        let truth = [0.1, 1.0, 100.0, 1.5];
        let (x, y) = logistic_data(truth, 3, 0.01, 11);
        let opts = FitOptions::default();
        let four = fit("A", ModelKind::FourParam, &x, &y, &opts);
        let expo = fit("A", ModelKind::Exponential, &x, &y, &opts);
        let four_rmse = four.metrics().unwrap().rmse;
        let expo_rmse = expo.metrics().unwrap_or_else(|| panic!("{:?}", expo.failure())).rmse;
        assert!(four_rmse < expo_rmse, "4PL {four_rmse} vs Exponential {expo_rmse}");
    }

    #[test]
    fn flat_response_converges_against_the_potency_bound() {
        let x: Vec<f64> = [0.1, 1.0, 10.0, 100.0, 1000.0].iter().flat_map(|&c| [c, c]).collect();
        let y = vec![0.5; x.len()];
        let curve = fit_curve(ModelKind::ThreeParam, &x, &y, &FitOptions::default()).unwrap();
        assert!(curve.iterations < 100, "took {} iterations", curve.iterations);
        assert!(curve.metrics.rmse < 1e-6);
        // ic50 pinned two decades above the highest concentration.
        assert_relative_eq!(curve.params[1], 1e5, max_relative = 1e-9);
    }

    #[test]
    fn too_few_points_is_a_failure_not_a_panic() {
        let fit = fit("X", ModelKind::FourParam, &[1.0, 10.0, 100.0], &[1.0, 0.5, 0.1], &FitOptions::default());
        assert_eq!(fit.failure(), Some(&FitFailure::TooFewPoints { n: 3, k: 4 }));
        assert!(fit.params().is_empty());
        assert!(fit.ic50().is_nan());
    }

    #[test]
    fn zero_concentrations_are_not_fitted() {
        let truth = [0.1, 1.0, 100.0, 1.5];
        let (mut x, mut y) = logistic_data(truth, 1, 0.0, 0);
        x.push(0.0);
        y.push(5.0);
        let curve = fit_curve(ModelKind::FourParam, &x, &y, &FitOptions::default()).unwrap();
        assert_eq!(curve.residuals.len(), CONCS.len());
    }

    #[test]
    fn exhausted_iteration_budget_is_reported() {
        let truth = [0.1, 1.0, 100.0, 1.5];
        let (x, y) = logistic_data(truth, 3, 0.05, 3);
        let opts = FitOptions {
            max_iterations: 0,
            potency_starts: 0,
            time_budget: None,
        };
        let fit = fit("A", ModelKind::FourParam, &x, &y, &opts);
        assert_eq!(fit.failure(), Some(&FitFailure::IterationLimit { iterations: 0 }));
    }

    #[test]
    fn zero_time_budget_is_reported() {
        let truth = [0.1, 1.0, 100.0, 1.5];
        let (x, y) = logistic_data(truth, 3, 0.05, 3);
        let opts = FitOptions {
            time_budget: Some(Duration::ZERO),
            ..FitOptions::default()
        };
        let fit = fit("A", ModelKind::FourParam, &x, &y, &opts);
        assert!(matches!(fit.failure(), Some(FitFailure::TimeBudget { .. })));
    }

    #[test]
    fn fitting_is_deterministic() {
        let truth = [0.15, 0.95, 250.0, 1.8];
        let (x, y) = logistic_data(truth, 3, 0.05, 42);
        let opts = FitOptions::default();
        let a = fit("C", ModelKind::FiveParam, &x, &y, &opts);
        let b = fit("C", ModelKind::FiveParam, &x, &y, &opts);
        assert_eq!(a, b);
    }
}
