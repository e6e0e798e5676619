//! Log-spaced grids.
//!
//! Used for potency seeds during multi-start fitting and for sampling
//! prediction curves on a log concentration axis.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("invalid log range: min={min}, max={max} (must be finite, >0, and max>min)")]
    InvalidRange { min: f64, max: f64 },
    #[error("log grid needs at least 2 steps (got {0})")]
    TooFewSteps(usize),
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
///
/// The endpoints are returned exactly, so callers can rely on
/// `out[0] == min` and `out[steps - 1] == max`.
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, GridError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(GridError::InvalidRange { min, max });
    }
    if steps < 2 {
        return Err(GridError::TooFewSteps(steps));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    out.push(min);
    for i in 1..steps - 1 {
        out.push((ln_min + step * i as f64).exp());
    }
    out.push(max);
    Ok(out)
}
