//! Model evaluation for the dose-response families.
//!
//! Every model is a pure function of `(concentration, params)`. Parameter
//! vectors follow `ModelKind::param_names()` order.

use crate::domain::ModelKind;

/// Hill term `1 / (1 + (x / c)^h)`.
///
/// For `x = 0` the limit is taken explicitly so zero concentrations never
/// produce NaN (`h > 0` → 1, `h < 0` → 0).
fn hill_fraction(x: f64, c: f64, h: f64) -> f64 {
    if x <= 0.0 {
        return if h >= 0.0 { 1.0 } else { 0.0 };
    }
    let ratio = (x / c).powf(h);
    if ratio.is_infinite() {
        return 0.0;
    }
    1.0 / (1.0 + ratio)
}

/// Predict the response at concentration `x`.
///
/// # Panics
/// Panics if `params` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, x: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::FourParam => {
            let (bottom, top, c, h) = (params[0], params[1], params[2], params[3]);
            bottom + (top - bottom) * hill_fraction(x, c, h)
        }
        ModelKind::ThreeParam => {
            let (top, c, h) = (params[0], params[1], params[2]);
            top * hill_fraction(x, c, h)
        }
        ModelKind::FiveParam => {
            let (bottom, top, c, h, s) = (params[0], params[1], params[2], params[3], params[4]);
            bottom + (top - bottom) * hill_fraction(x, c, h).powf(s)
        }
        ModelKind::Biphasic => {
            let (bottom, top, c1, c2, f, h) =
                (params[0], params[1], params[2], params[3], params[4], params[5]);
            let mix = f * hill_fraction(x, c1, h) + (1.0 - f) * hill_fraction(x, c2, h);
            bottom + (top - bottom) * mix
        }
        ModelKind::Exponential => {
            let (bottom, top, scale) = (params[0], params[1], params[2]);
            bottom + (top - bottom) * (-x.max(0.0) / scale).exp()
        }
    }
}

/// Concentration of half-maximal effect for a fitted parameter vector.
pub fn potency(model: ModelKind, params: &[f64]) -> f64 {
    match model {
        ModelKind::FourParam => params[2],
        ModelKind::ThreeParam => params[1],
        ModelKind::FiveParam => {
            let (c, h, s) = (params[2], params[3], params[4]);
            // Solve (1 + (x/c)^h)^-s = 1/2.
            c * (2f64.powf(1.0 / s) - 1.0).powf(1.0 / h)
        }
        ModelKind::Biphasic => {
            if params[4] >= 0.5 {
                params[2]
            } else {
                params[3]
            }
        }
        ModelKind::Exponential => params[2] * std::f64::consts::LN_2,
    }
}

/// Response approached at saturating concentration.
pub fn dmax(model: ModelKind, params: &[f64]) -> f64 {
    match model {
        ModelKind::FourParam | ModelKind::FiveParam => {
            if params[3] >= 0.0 { params[0] } else { params[1] }
        }
        ModelKind::ThreeParam => {
            if params[2] >= 0.0 { 0.0 } else { params[0] }
        }
        ModelKind::Biphasic => {
            if params[5] >= 0.0 { params[0] } else { params[1] }
        }
        ModelKind::Exponential => params[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_param_hits_midpoint_at_ic50() {
        let p = [0.1, 1.0, 100.0, 1.5];
        let y = predict(ModelKind::FourParam, 100.0, &p);
        assert!((y - 0.55).abs() < 1e-12);
        assert!((potency(ModelKind::FourParam, &p) - 100.0).abs() < 1e-12);
        assert_eq!(dmax(ModelKind::FourParam, &p), 0.1);
    }

    #[test]
    fn zero_concentration_uses_the_limit() {
        let decreasing = [0.0, 2.0, 10.0, 1.0];
        let increasing = [0.0, 2.0, 10.0, -1.0];
        assert_eq!(predict(ModelKind::FourParam, 0.0, &decreasing), 2.0);
        assert_eq!(predict(ModelKind::FourParam, 0.0, &increasing), 0.0);
    }

    #[test]
    fn five_param_potency_is_half_max_concentration() {
        let p = [0.0, 1.0, 50.0, 1.2, 2.0];
        let ic50 = potency(ModelKind::FiveParam, &p);
        let y = predict(ModelKind::FiveParam, ic50, &p);
        assert!((y - 0.5).abs() < 1e-9, "y at ic50 = {y}");
    }

    #[test]
    fn five_param_reduces_to_four_param() {
        let p4 = [0.2, 0.9, 30.0, 1.1];
        let p5 = [0.2, 0.9, 30.0, 1.1, 1.0];
        for &x in &[0.1, 1.0, 30.0, 1e4] {
            let a = predict(ModelKind::FourParam, x, &p4);
            let b = predict(ModelKind::FiveParam, x, &p5);
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn exponential_potency_is_half_life() {
        let p = [0.0, 1.0, 20.0];
        let half = potency(ModelKind::Exponential, &p);
        assert!((predict(ModelKind::Exponential, half, &p) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn extreme_ratios_stay_finite() {
        let p = [0.0, 1.0, 1e-6, 10.0];
        assert!(predict(ModelKind::FourParam, 1e6, &p).is_finite());
        let p = [0.0, 1.0, 1e6, -10.0];
        assert!(predict(ModelKind::FourParam, 1e-6, &p).is_finite());
    }
}
