//! Curve Predictor: dense, log-uniform samples of a fitted model.
//!
//! A `PredictionCurve` is never authoritative state; it is re-derived from a
//! `FitResult` whenever a renderer needs it.

use thiserror::Error;

use crate::domain::{FitResult, ModelKind, PredictionCurve};
use crate::math::{log_space, GridError};
use crate::models::predict;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error("{model} fit for '{compound}' did not converge; nothing to predict")]
    NotConverged { compound: String, model: ModelKind },
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Sample `n_points` concentrations log-uniformly over `range` (both bounds
/// > 0, inclusive) and evaluate the fitted model at each.
///
/// A single point sits at the geometric midpoint of `range`.
pub fn predict_curve(
    fit: &FitResult,
    range: (f64, f64),
    n_points: usize,
) -> Result<PredictionCurve, PredictError> {
    let Ok(curve) = &fit.outcome else {
        return Err(PredictError::NotConverged {
            compound: fit.compound.clone(),
            model: fit.model,
        });
    };
    let xs = match n_points {
        1 => log_space(range.0, range.1, 3)?.into_iter().skip(1).take(1).collect(),
        _ => log_space(range.0, range.1, n_points)?,
    };
    let points = xs
        .into_iter()
        .map(|x| (x, predict(fit.model, x, &curve.params)))
        .collect();
    Ok(PredictionCurve {
        compound: fit.compound.clone(),
        model: fit.model,
        points,
    })
}

/// Range a compound's curve is drawn over: its positive concentration extent,
/// widened by one decade each way when only one concentration was measured.
pub fn curve_range(extent: (f64, f64)) -> (f64, f64) {
    let (lo, hi) = extent;
    if hi > lo { (lo, hi) } else { (lo / 10.0, hi * 10.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitFailure, FitMetrics, FittedCurve};

    fn fit() -> FitResult {
        FitResult {
            compound: "A".to_string(),
            model: ModelKind::FourParam,
            outcome: Ok(FittedCurve {
                params: vec![0.1, 1.0, 100.0, 1.5],
                residuals: vec![],
                metrics: FitMetrics {
                    n: 18,
                    k: 4,
                    sse: 0.0,
                    rmse: 0.0,
                    r2: 1.0,
                    aic: 0.0,
                    bic: 0.0,
                },
                iterations: 1,
            }),
        }
    }

    #[test]
    fn samples_log_uniformly_between_bounds() {
        let c = predict_curve(&fit(), (0.1, 10_000.0), 200).unwrap();
        assert_eq!(c.points.len(), 200);
        assert_eq!(c.points[0].0, 0.1);
        assert_eq!(c.points[199].0, 10_000.0);
        assert!(c.points.windows(2).all(|w| w[0].0 < w[1].0));
        // Decreasing sigmoid.
        assert!(c.points[0].1 > c.points[199].1);
    }

    #[test]
    fn prediction_is_idempotent() {
        let a = predict_curve(&fit(), (1.0, 1000.0), 50).unwrap();
        let b = predict_curve(&fit(), (1.0, 1000.0), 50).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_failed_fits_and_bad_ranges() {
        let failed = FitResult {
            compound: "A".to_string(),
            model: ModelKind::FourParam,
            outcome: Err(FitFailure::SingularJacobian),
        };
        assert!(matches!(
            predict_curve(&failed, (1.0, 10.0), 10),
            Err(PredictError::NotConverged { .. })
        ));
        assert!(matches!(
            predict_curve(&fit(), (0.0, 10.0), 10),
            Err(PredictError::Grid(_))
        ));
    }

    #[test]
    fn one_point_lands_on_the_geometric_midpoint() {
        let c = predict_curve(&fit(), (1.0, 10_000.0), 1).unwrap();
        assert_eq!(c.points.len(), 1);
        let (x, y) = c.points[0];
        assert!((x - 100.0).abs() < 1e-9, "x = {x}");
        assert!((y - 0.55).abs() < 1e-9, "y = {y}");
        assert!(matches!(
            predict_curve(&fit(), (1.0, 10.0), 0),
            Err(PredictError::Grid(GridError::TooFewSteps(0)))
        ));
    }

    #[test]
    fn single_concentration_range_is_widened() {
        assert_eq!(curve_range((5.0, 5.0)), (0.5, 50.0));
        assert_eq!(curve_range((1.0, 10.0)), (1.0, 10.0));
    }
}
