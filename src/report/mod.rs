//! Result aggregation: the summary and best-models tables.
//!
//! Both tables are read-only projections built once after every fit has
//! finished. Row order is the order compounds first appear in the input
//! table (and registry order within a compound); nothing here re-sorts.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::{FitResult, ModelKind, SelectionMetric, SelectionResult};

/// One row per (compound, model) attempted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub compound: String,
    pub model: ModelKind,
    pub converged: bool,
    /// `ok`, or the failure reason.
    pub status: String,
    pub n: Option<usize>,
    pub k: usize,
    pub ic50: Option<f64>,
    pub dmax: Option<f64>,
    pub rmse: Option<f64>,
    pub r2: Option<f64>,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
    pub params: Vec<f64>,
}

impl SummaryRow {
    pub fn from_fit(fit: &FitResult) -> Self {
        let metrics = fit.metrics();
        let status = match fit.failure() {
            None => "ok".to_string(),
            Some(f) => f.to_string(),
        };
        Self {
            compound: fit.compound.clone(),
            model: fit.model,
            converged: fit.converged(),
            status,
            n: metrics.map(|m| m.n),
            k: fit.model.param_count(),
            ic50: fit.converged().then(|| fit.ic50()),
            dmax: fit.converged().then(|| fit.dmax()),
            rmse: metrics.map(|m| m.rmse),
            r2: metrics.map(|m| m.r2),
            aic: metrics.map(|m| m.aic),
            bic: metrics.map(|m| m.bic),
            params: fit.params().to_vec(),
        }
    }
}

/// All attempted fits, converged or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Build from fits already in output order.
    pub fn from_fits(fits: &[FitResult]) -> Self {
        Self {
            rows: fits.iter().map(SummaryRow::from_fit).collect(),
        }
    }
}

/// One row per compound with a successful selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestModelRow {
    pub compound: String,
    pub model: ModelKind,
    pub ic50: f64,
    pub dmax: f64,
    pub metric: SelectionMetric,
    pub metric_value: f64,
    pub rmse: f64,
    pub r2: f64,
    pub aic: f64,
    pub bic: f64,
}

impl BestModelRow {
    /// `None` if the selected fit has no metrics (never the case for a real selection).
    pub fn from_selection(sel: &SelectionResult) -> Option<Self> {
        let m = sel.fit.metrics()?;
        Some(Self {
            compound: sel.compound.clone(),
            model: sel.fit.model,
            ic50: sel.fit.ic50(),
            dmax: sel.fit.dmax(),
            metric: sel.metric,
            metric_value: sel.value,
            rmse: m.rmse,
            r2: m.r2,
            aic: m.aic,
            bic: m.bic,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BestModelsTable {
    pub rows: Vec<BestModelRow>,
}

impl BestModelsTable {
    pub fn from_selections(selections: &[SelectionResult]) -> Self {
        Self {
            rows: selections.iter().filter_map(BestModelRow::from_selection).collect(),
        }
    }

    pub fn get(&self, compound: &str) -> Option<&BestModelRow> {
        self.rows.iter().find(|r| r.compound == compound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitFailure, FitMetrics, FittedCurve};

    fn converged(compound: &str, model: ModelKind, params: Vec<f64>) -> FitResult {
        FitResult {
            compound: compound.to_string(),
            model,
            outcome: Ok(FittedCurve {
                params,
                residuals: vec![0.01, -0.01],
                metrics: FitMetrics {
                    n: 18,
                    k: model.param_count(),
                    sse: 0.0002,
                    rmse: 0.01,
                    r2: 0.99,
                    aic: -100.0,
                    bic: -95.0,
                },
                iterations: 12,
            }),
        }
    }

    #[test]
    fn summary_keeps_failed_fits_with_status() {
        let fits = vec![
            converged("B", ModelKind::FourParam, vec![0.1, 1.0, 50.0, 1.2]),
            FitResult {
                compound: "B".to_string(),
                model: ModelKind::Biphasic,
                outcome: Err(FitFailure::TooFewPoints { n: 4, k: 6 }),
            },
            converged("A", ModelKind::FourParam, vec![0.1, 1.0, 10.0, 1.0]),
        ];
        let table = SummaryTable::from_fits(&fits);
        assert_eq!(table.rows.len(), 3);
        // Input order, no re-sorting.
        assert_eq!(table.rows[0].compound, "B");
        assert_eq!(table.rows[2].compound, "A");

        let failed = &table.rows[1];
        assert!(!failed.converged);
        assert_eq!(failed.status, "too few points (n=4 < k=6)");
        assert_eq!(failed.k, 6);
        assert!(failed.ic50.is_none() && failed.rmse.is_none());
        assert!(failed.params.is_empty());

        assert_eq!(table.rows[0].ic50, Some(50.0));
        assert_eq!(table.rows[0].dmax, Some(0.1));
    }

    #[test]
    fn best_models_row_exposes_potency_and_metric() {
        let sel = SelectionResult {
            compound: "A".to_string(),
            fit: converged("A", ModelKind::ThreeParam, vec![1.0, 25.0, 1.0]),
            metric: SelectionMetric::Bic,
            value: -95.0,
        };
        let table = BestModelsTable::from_selections(&[sel]);
        let row = table.get("A").unwrap();
        assert_eq!(row.model, ModelKind::ThreeParam);
        assert_eq!(row.ic50, 25.0);
        assert_eq!(row.dmax, 0.0);
        assert_eq!(row.metric, SelectionMetric::Bic);
        assert_eq!(row.metric_value, -95.0);
        assert!(table.get("missing").is_none());
    }
}
