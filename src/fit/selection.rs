//! Model selection across the fits attempted for one compound.
//!
//! Selection rules:
//! 1. Consider converged fits only.
//! 2. Find the best value of the configured metric (R² maximized, RMSE/AIC/BIC minimized).
//! 3. Every fit within a relative 0.1% of that value is a tie; ties are
//!    resolved by fewer parameters, then the better metric value, then model
//!    registry order. This is a total order, so selection is deterministic.
//!
//! An R² request on constant-response data (R² undefined) is answered with
//! RMSE instead; the returned `SelectionResult::metric` says which one won.

use std::cmp::Ordering;

use thiserror::Error;

use crate::domain::{FitResult, SelectionMetric, SelectionResult};

/// Relative tolerance inside which two metric values count as tied.
pub const TIE_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionFailure {
    #[error("no model converged for '{compound}'")]
    NoConvergedFit { compound: String },
}

/// Pick the winning fit for one compound.
///
/// `fits` should all belong to `compound`; their order does not affect the result.
pub fn select_best(
    compound: &str,
    fits: &[FitResult],
    metric: SelectionMetric,
) -> Result<SelectionResult, SelectionFailure> {
    let converged: Vec<&FitResult> = fits.iter().filter(|f| f.converged()).collect();
    let no_fit = || SelectionFailure::NoConvergedFit {
        compound: compound.to_string(),
    };
    if converged.is_empty() {
        return Err(no_fit());
    }

    let effective = effective_metric(&converged, metric);

    let scored: Vec<(&FitResult, f64)> = converged
        .iter()
        .filter_map(|f| {
            let v = effective.value_of(f.metrics()?);
            v.is_finite().then_some((*f, v))
        })
        .collect();

    let best_value = scored
        .iter()
        .map(|(_, v)| *v)
        .reduce(|a, b| if is_better(effective, b, a) { b } else { a })
        .ok_or_else(no_fit)?;

    let tol = TIE_TOLERANCE * best_value.abs();
    let (winner, value) = scored
        .into_iter()
        .filter(|(_, v)| (v - best_value).abs() <= tol)
        .min_by(|a, b| tie_order(effective, a, b))
        .ok_or_else(no_fit)?;

    Ok(SelectionResult {
        compound: compound.to_string(),
        fit: winner.clone(),
        metric: effective,
        value,
    })
}

/// The metric actually usable for these fits.
///
/// R² is undefined when the responses have zero variance; fall back to RMSE.
pub fn effective_metric(fits: &[&FitResult], requested: SelectionMetric) -> SelectionMetric {
    if requested == SelectionMetric::R2
        && fits
            .iter()
            .filter_map(|f| f.metrics())
            .any(|m| m.r2.is_nan())
    {
        SelectionMetric::Rmse
    } else {
        requested
    }
}

fn is_better(metric: SelectionMetric, a: f64, b: f64) -> bool {
    if metric.higher_is_better() { a > b } else { a < b }
}

fn tie_order(metric: SelectionMetric, a: &(&FitResult, f64), b: &(&FitResult, f64)) -> Ordering {
    let by_value = if metric.higher_is_better() {
        b.1.total_cmp(&a.1)
    } else {
        a.1.total_cmp(&b.1)
    };
    a.0.model
        .param_count()
        .cmp(&b.0.model.param_count())
        .then(by_value)
        .then(a.0.model.cmp(&b.0.model))
}
