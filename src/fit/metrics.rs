//! Goodness-of-fit metrics.
//!
//! - RMSE = sqrt(SSE / n)
//! - R²   = 1 - SSE / SS_tot (NaN when SS_tot = 0)
//! - AIC  = n * ln(SSE/n) + 2k
//! - BIC  = n * ln(SSE/n) + k * ln(n)
//!
//! `SSE/n` is floored at 1e-12 inside the logarithm so an exact fit gives a
//! finite (very negative) information criterion instead of `-inf`.

use crate::domain::FitMetrics;

const SSE_PER_FLOOR: f64 = 1e-12;

/// Compute every metric from residuals, the observed responses and `k`.
pub fn evaluate(residuals: &[f64], responses: &[f64], k: usize) -> FitMetrics {
    let n = residuals.len();
    let sse = sse(residuals);
    FitMetrics {
        n,
        k,
        sse,
        rmse: rmse(n, sse),
        r2: r_squared(sse, responses),
        aic: aic(n, sse, k),
        bic: bic(n, sse, k),
    }
}

pub fn sse(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

pub fn rmse(n: usize, sse: f64) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    (sse / n as f64).sqrt()
}

/// Coefficient of determination against the mean response.
pub fn r_squared(sse: f64, responses: &[f64]) -> f64 {
    let n = responses.len();
    if n == 0 {
        return f64::NAN;
    }
    let mean = responses.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = responses.iter().map(|y| (y - mean) * (y - mean)).sum();
    if ss_tot <= 0.0 {
        return f64::NAN;
    }
    1.0 - sse / ss_tot
}

pub fn aic(n: usize, sse: f64, k: usize) -> f64 {
    log_likelihood_term(n, sse) + 2.0 * k as f64
}

pub fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    log_likelihood_term(n, sse) + (k as f64) * n_f.ln()
}

fn log_likelihood_term(n: usize, sse: f64) -> f64 {
    let n_f = n as f64;
    let sse_per = (sse / n_f).max(SSE_PER_FLOOR);
    n_f * sse_per.ln()
}
