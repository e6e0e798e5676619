//! Shared domain types.
//!
//! Plain, serializable values. They are:
//!
//! - used in-memory during fitting
//! - exported to TSV/JSON
//! - handed to the rendering layer without any shared mutable state

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub compound: String,
    /// Concentration (>= 0). Zero is kept in the dataset but never fitted.
    pub concentration: f64,
    pub response: f64,
}

/// All measurements that share one compound identifier.
///
/// Replicates at the same concentration are kept as separate observations.
#[derive(Debug, Clone)]
pub struct CompoundGroup {
    pub compound: String,
    pub measurements: Vec<Measurement>,
}

impl CompoundGroup {
    /// `(concentration, response)` pairs with a strictly positive concentration.
    pub fn positive_points(&self) -> (Vec<f64>, Vec<f64>) {
        self.measurements
            .iter()
            .filter(|m| m.concentration > 0.0)
            .map(|m| (m.concentration, m.response))
            .unzip()
    }

    /// Smallest and largest positive concentration, if any.
    pub fn concentration_extent(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for m in &self.measurements {
            if m.concentration > 0.0 {
                lo = lo.min(m.concentration);
                hi = hi.max(m.concentration);
            }
        }
        if lo.is_finite() && hi.is_finite() {
            Some((lo, hi))
        } else {
            None
        }
    }
}

/// Names of the three logical input columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub compound: String,
    pub concentration: String,
    pub response: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            compound: "Compound".to_string(),
            concentration: "Conc".to_string(),
            response: "Rab10".to_string(),
        }
    }
}

/// A validated input table.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub columns: ColumnMap,
    pub measurements: Vec<Measurement>,
}

impl Dataset {
    pub fn new(columns: ColumnMap, measurements: Vec<Measurement>) -> Self {
        Self { columns, measurements }
    }

    /// Group measurements by compound.
    ///
    /// Groups are returned in the order each compound first appears in the
    /// table. Every downstream table relies on this order.
    pub fn groups(&self) -> Vec<CompoundGroup> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<CompoundGroup> = Vec::new();
        for m in &self.measurements {
            let idx = *index.entry(m.compound.as_str()).or_insert_with(|| {
                groups.push(CompoundGroup {
                    compound: m.compound.clone(),
                    measurements: Vec::new(),
                });
                groups.len() - 1
            });
            groups[idx].measurements.push(m.clone());
        }
        groups
    }

    /// Compound identifiers in first-encounter order.
    pub fn compounds(&self) -> Vec<String> {
        self.groups().into_iter().map(|g| g.compound).collect()
    }
}

/// Concrete dose-response model forms.
///
/// The declaration order is the registry order used as the final tie-break
/// during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "4PL")]
    FourParam,
    #[serde(rename = "3PL")]
    ThreeParam,
    #[serde(rename = "5PL")]
    FiveParam,
    #[serde(rename = "Biphasic")]
    Biphasic,
    #[serde(rename = "Exponential")]
    Exponential,
}

impl ModelKind {
    /// Models attempted for every compound.
    pub const CORE: [ModelKind; 2] = [ModelKind::FourParam, ModelKind::ThreeParam];

    /// Models added when `enable_custom_models` is set.
    pub const EXTENDED: [ModelKind; 3] = [
        ModelKind::FiveParam,
        ModelKind::Biphasic,
        ModelKind::Exponential,
    ];

    /// The models to attempt for a given configuration, in registry order.
    pub fn registry(enable_custom_models: bool) -> Vec<ModelKind> {
        let mut out = Self::CORE.to_vec();
        if enable_custom_models {
            out.extend_from_slice(&Self::EXTENDED);
        }
        out
    }

    /// Short label used in tables and legends.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::FourParam => "4PL",
            ModelKind::ThreeParam => "3PL",
            ModelKind::FiveParam => "5PL",
            ModelKind::Biphasic => "Biphasic",
            ModelKind::Exponential => "Exponential",
        }
    }

    /// Number of free parameters.
    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    /// Parameter names in vector order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::FourParam => &["bottom", "top", "ic50", "hill"],
            ModelKind::ThreeParam => &["top", "ic50", "hill"],
            ModelKind::FiveParam => &["bottom", "top", "ic50", "hill", "asymmetry"],
            ModelKind::Biphasic => &["bottom", "top", "ic50_1", "ic50_2", "fraction", "hill"],
            ModelKind::Exponential => &["bottom", "top", "scale"],
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Goodness-of-fit metric used to pick the winning model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMetric {
    Rmse,
    Aic,
    Bic,
    R2,
}

impl SelectionMetric {
    pub fn display_name(self) -> &'static str {
        match self {
            SelectionMetric::Rmse => "RMSE",
            SelectionMetric::Aic => "AIC",
            SelectionMetric::Bic => "BIC",
            SelectionMetric::R2 => "R2",
        }
    }

    /// `true` for R², the only metric that is maximized.
    pub fn higher_is_better(self) -> bool {
        matches!(self, SelectionMetric::R2)
    }

    /// Read this metric's value from a metric set.
    pub fn value_of(self, metrics: &FitMetrics) -> f64 {
        match self {
            SelectionMetric::Rmse => metrics.rmse,
            SelectionMetric::Aic => metrics.aic,
            SelectionMetric::Bic => metrics.bic,
            SelectionMetric::R2 => metrics.r2,
        }
    }
}

/// Goodness-of-fit diagnostics for one converged fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub n: usize,
    pub k: usize,
    pub sse: f64,
    pub rmse: f64,
    /// NaN when the response has zero total variance.
    pub r2: f64,
    pub aic: f64,
    pub bic: f64,
}

/// Why a single (compound, model) fit did not produce parameters.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum FitFailure {
    #[error("too few points (n={n} < k={k})")]
    TooFewPoints { n: usize, k: usize },
    #[error("non-finite residuals")]
    NonFiniteResidual,
    #[error("singular Jacobian")]
    SingularJacobian,
    #[error("iteration limit reached ({iterations})")]
    IterationLimit { iterations: usize },
    #[error("time budget exceeded ({elapsed_ms} ms)")]
    TimeBudget { elapsed_ms: u64 },
}

/// Parameters and diagnostics of a converged fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCurve {
    pub params: Vec<f64>,
    /// `response - predicted` for every fitted observation, in input order.
    pub residuals: Vec<f64>,
    pub metrics: FitMetrics,
    pub iterations: usize,
}

/// Outcome of one (compound, model) fit. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub compound: String,
    pub model: ModelKind,
    pub outcome: Result<FittedCurve, FitFailure>,
}

impl FitResult {
    pub fn converged(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Fitted parameters; empty when the fit failed.
    pub fn params(&self) -> &[f64] {
        match &self.outcome {
            Ok(curve) => &curve.params,
            Err(_) => &[],
        }
    }

    pub fn residuals(&self) -> &[f64] {
        match &self.outcome {
            Ok(curve) => &curve.residuals,
            Err(_) => &[],
        }
    }

    pub fn metrics(&self) -> Option<&FitMetrics> {
        self.outcome.as_ref().ok().map(|c| &c.metrics)
    }

    pub fn failure(&self) -> Option<&FitFailure> {
        self.outcome.as_ref().err()
    }

    /// Concentration at half-maximal effect (NaN when not converged).
    pub fn ic50(&self) -> f64 {
        match &self.outcome {
            Ok(curve) => crate::models::potency(self.model, &curve.params),
            Err(_) => f64::NAN,
        }
    }

    /// Response approached at saturating concentration (NaN when not converged).
    pub fn dmax(&self) -> f64 {
        match &self.outcome {
            Ok(curve) => crate::models::dmax(self.model, &curve.params),
            Err(_) => f64::NAN,
        }
    }
}

/// The winning fit for one compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub compound: String,
    pub fit: FitResult,
    /// Metric actually used (differs from the requested one after an R² fallback).
    pub metric: SelectionMetric,
    pub value: f64,
}

/// A smooth, re-derivable curve sampled from a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionCurve {
    pub compound: String,
    pub model: ModelKind,
    /// Strictly increasing concentrations paired with predicted responses.
    pub points: Vec<(f64, f64)>,
}

/// A compound that was never fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCompound {
    pub compound: String,
    pub reason: String,
}

/// Recoverable problems surfaced to the caller after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalysisWarning {
    /// No positive concentration; the compound was not fitted.
    SkippedCompound { compound: String, reason: String },
    /// A single model did not converge for a compound.
    FitConvergence {
        compound: String,
        model: ModelKind,
        failure: FitFailure,
    },
    /// No model converged; the compound is missing from the best-models table.
    SelectionFailure { compound: String },
    /// R² was requested but undefined; RMSE was used instead.
    DegenerateMetric { compound: String },
    /// An overlay compound has no selected model.
    OverlayReference { compound: String },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::SkippedCompound { compound, reason } => {
                write!(f, "compound '{compound}' skipped: {reason}")
            }
            AnalysisWarning::FitConvergence {
                compound,
                model,
                failure,
            } => write!(f, "{model} did not converge for '{compound}': {failure}"),
            AnalysisWarning::SelectionFailure { compound } => {
                write!(f, "no model converged for '{compound}'; omitted from best models")
            }
            AnalysisWarning::DegenerateMetric { compound } => write!(
                f,
                "R2 undefined for '{compound}' (constant response); selected by RMSE instead"
            ),
            AnalysisWarning::OverlayReference { compound } => {
                write!(f, "compound '{compound}' not found in results; skipped in overlay")
            }
        }
    }
}

/// Optimizer knobs for a single fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Levenberg–Marquardt iteration budget per start.
    pub max_iterations: usize,
    /// Number of log-spaced potency seeds tried in addition to the heuristic start.
    pub potency_starts: usize,
    /// Optional wall-clock cap for one (compound, model) fit, across all starts.
    pub time_budget: Option<Duration>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            potency_starts: 5,
            time_budget: None,
        }
    }
}

/// Plot-related options handed to the rendering collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    /// Ordered compounds to overlay (empty = no overlay).
    pub overlay_compounds: Vec<String>,
    /// Compound -> color token (e.g. `#e74c3c`).
    pub compound_colors: BTreeMap<String, String>,
    pub show_ic50_lines: bool,
    pub show_dmax_lines: bool,
    /// Points per prediction curve; `1` samples the midpoint of the range.
    pub curve_points: usize,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            overlay_compounds: Vec::new(),
            compound_colors: BTreeMap::new(),
            show_ic50_lines: true,
            show_dmax_lines: true,
            curve_points: 200,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub columns: ColumnMap,
    pub selection_metric: SelectionMetric,
    pub enable_custom_models: bool,
    pub fit: FitOptions,
    pub plot: PlotOptions,
    /// Worker threads for fitting (0 = rayon default).
    pub threads: usize,

    pub write_svg: bool,
    pub add_timestamp: bool,
    pub ascii_plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}
