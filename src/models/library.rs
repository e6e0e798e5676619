//! Initial guesses and parameter bounds for each model.
//!
//! Guesses and bounds are derived from the observed data of one compound:
//!
//! - asymptotes start at the observed response extremes and may drift about
//!   half a span beyond them
//! - potency starts at the geometric mean of the concentration range and is
//!   bounded two decades beyond it on either side
//! - the Hill slope starts at ±1 (sign from the response direction) and is
//!   bounded to a plausible magnitude of [0.1, 10]
//!
//! Potency-like parameters are optimized on a log10 scale.

use crate::domain::ModelKind;

/// Largest plausible Hill slope magnitude.
pub const HILL_MAX: f64 = 10.0;
/// Smallest plausible Hill slope magnitude.
pub const HILL_MIN: f64 = 0.1;
/// Decades the potency may move beyond the observed concentration range.
pub const POTENCY_DECADES: f64 = 2.0;

/// Range of the 5PL asymmetry factor.
const ASYMMETRY_RANGE: (f64, f64) = (0.2, 5.0);

/// How a parameter is represented inside the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamScale {
    Linear,
    /// Optimized as `log10(value)`; the value must be > 0.
    Log10,
}

impl ParamScale {
    pub fn to_internal(self, value: f64) -> f64 {
        match self {
            ParamScale::Linear => value,
            ParamScale::Log10 => value.log10(),
        }
    }

    pub fn to_external(self, internal: f64) -> f64 {
        match self {
            ParamScale::Linear => internal,
            ParamScale::Log10 => 10f64.powf(internal),
        }
    }
}

/// Guess and bounds for one parameter (external units).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub scale: ParamScale,
    pub guess: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Everything the fitter needs to start optimizing one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSetup {
    pub model: ModelKind,
    pub params: Vec<ParamSpec>,
    /// Indices of potency parameters that receive multi-start seeds.
    pub potency_indices: Vec<usize>,
}

impl ModelSetup {
    pub fn guess(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.guess).collect()
    }

    pub fn to_internal(&self, external: &[f64]) -> Vec<f64> {
        self.params
            .iter()
            .zip(external)
            .map(|(p, &v)| p.scale.to_internal(v))
            .collect()
    }

    pub fn to_external(&self, internal: &[f64]) -> Vec<f64> {
        self.params
            .iter()
            .zip(internal)
            .map(|(p, &v)| p.scale.to_external(v))
            .collect()
    }

    /// Lower and upper bounds in internal coordinates.
    pub fn internal_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.params
            .iter()
            .map(|p| (p.scale.to_internal(p.lower), p.scale.to_internal(p.upper)))
            .unzip()
    }
}

/// Whether the response rises or falls with concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increasing,
    Decreasing,
}

/// Observed extents of one compound's fitted data.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSummary {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub direction: Direction,
}

/// Summarize positive-concentration data. Returns `None` when empty or non-finite.
pub fn summarize(x: &[f64], y: &[f64]) -> Option<DataSummary> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for (&xi, &yi) in x.iter().zip(y) {
        if !(xi.is_finite() && xi > 0.0 && yi.is_finite()) {
            return None;
        }
        x_min = x_min.min(xi);
        x_max = x_max.max(xi);
        y_min = y_min.min(yi);
        y_max = y_max.max(yi);
    }
    Some(DataSummary {
        x_min,
        x_max,
        y_min,
        y_max,
        direction: infer_direction(x, y),
    })
}

/// Sign of the least-squares slope of response against `log10(concentration)`.
///
/// A flat or undetermined slope is treated as decreasing (inhibition).
pub fn infer_direction(x: &[f64], y: &[f64]) -> Direction {
    let n = x.len().min(y.len());
    if n < 2 {
        return Direction::Decreasing;
    }
    let lx: Vec<f64> = x[..n].iter().map(|v| v.log10()).collect();
    let xbar = lx.iter().sum::<f64>() / n as f64;
    let ybar = y[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (xi, yi) in lx.iter().zip(&y[..n]) {
        let dx = xi - xbar;
        cov += dx * (yi - ybar);
        var += dx * dx;
    }
    if var <= 1e-18 || !cov.is_finite() {
        return Direction::Decreasing;
    }
    if cov / var > 0.0 {
        Direction::Increasing
    } else {
        Direction::Decreasing
    }
}

/// Build guesses and bounds for `model` from observed data.
pub fn setup(model: ModelKind, data: &DataSummary) -> ModelSetup {
    let span = data.y_max - data.y_min;
    let flat_pad = (0.01 * data.y_max.abs().max(data.y_min.abs())).max(1e-3);
    let (lo_guess, hi_guess) = if span < flat_pad {
        (data.y_min - flat_pad / 2.0, data.y_max + flat_pad / 2.0)
    } else {
        (data.y_min, data.y_max)
    };
    let margin = 0.5 * span + flat_pad;
    let asym = |name: &'static str, guess: f64| ParamSpec {
        name,
        scale: ParamScale::Linear,
        guess,
        lower: data.y_min - margin,
        upper: data.y_max + margin,
    };

    let stretch = 10f64.powf(POTENCY_DECADES);
    let potency = |name: &'static str, guess: f64| ParamSpec {
        name,
        scale: ParamScale::Log10,
        guess,
        lower: data.x_min / stretch,
        upper: data.x_max * stretch,
    };
    let geo_mean = (data.x_min * data.x_max).sqrt();

    let hill = match data.direction {
        Direction::Decreasing => ParamSpec {
            name: "hill",
            scale: ParamScale::Linear,
            guess: 1.0,
            lower: HILL_MIN,
            upper: HILL_MAX,
        },
        Direction::Increasing => ParamSpec {
            name: "hill",
            scale: ParamScale::Linear,
            guess: -1.0,
            lower: -HILL_MAX,
            upper: -HILL_MIN,
        },
    };

    match model {
        ModelKind::FourParam => ModelSetup {
            model,
            params: vec![
                asym("bottom", lo_guess),
                asym("top", hi_guess),
                potency("ic50", geo_mean),
                hill,
            ],
            potency_indices: vec![2],
        },
        ModelKind::ThreeParam => ModelSetup {
            model,
            params: vec![asym("top", hi_guess), potency("ic50", geo_mean), hill],
            potency_indices: vec![1],
        },
        ModelKind::FiveParam => ModelSetup {
            model,
            params: vec![
                asym("bottom", lo_guess),
                asym("top", hi_guess),
                potency("ic50", geo_mean),
                hill,
                ParamSpec {
                    name: "asymmetry",
                    scale: ParamScale::Log10,
                    guess: 1.0,
                    lower: ASYMMETRY_RANGE.0,
                    upper: ASYMMETRY_RANGE.1,
                },
            ],
            potency_indices: vec![2],
        },
        ModelKind::Biphasic => {
            let (l, u) = (data.x_min.log10(), data.x_max.log10());
            let third = (u - l) / 3.0;
            ModelSetup {
                model,
                params: vec![
                    asym("bottom", lo_guess),
                    asym("top", hi_guess),
                    potency("ic50_1", 10f64.powf(l + third)),
                    potency("ic50_2", 10f64.powf(l + 2.0 * third)),
                    ParamSpec {
                        name: "fraction",
                        scale: ParamScale::Linear,
                        guess: 0.5,
                        lower: 0.0,
                        upper: 1.0,
                    },
                    hill,
                ],
                potency_indices: vec![2, 3],
            }
        }
        ModelKind::Exponential => {
            // y(0) = top, y(inf) = bottom; rising data swaps the extremes.
            let (bottom, top) = match data.direction {
                Direction::Decreasing => (lo_guess, hi_guess),
                Direction::Increasing => (hi_guess, lo_guess),
            };
            ModelSetup {
                model,
                params: vec![asym("bottom", bottom), asym("top", top), potency("scale", geo_mean)],
                potency_indices: vec![2],
            }
        }
    }
}
