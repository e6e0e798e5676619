//! Shared analysis pipeline used by the `fit` and `example` commands.
//!
//! dataset -> group by compound -> fit every (compound, model) in parallel
//! -> barrier -> select per compound -> summary / best-models tables
//!
//! The CLI focuses on presentation and file output; this module does no I/O.

use rayon::prelude::*;

use crate::domain::{
    AnalysisConfig, AnalysisWarning, CompoundGroup, Dataset, FitResult, ModelKind, SelectionResult,
    SkippedCompound,
};
use crate::error::AppError;
use crate::fit::{fit_group, select_best};
use crate::report::{BestModelsTable, SummaryTable};

/// All computed outputs of a single analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    /// Compounds that were fitted, in first-encounter order.
    pub groups: Vec<CompoundGroup>,
    /// Every attempted fit, grouped by compound then registry order.
    pub fits: Vec<FitResult>,
    pub selections: Vec<SelectionResult>,
    pub skipped: Vec<SkippedCompound>,
    pub warnings: Vec<AnalysisWarning>,
    pub summary: SummaryTable,
    pub best: BestModelsTable,
}

impl AnalysisRun {
    pub fn selection(&self, compound: &str) -> Option<&SelectionResult> {
        self.selections.iter().find(|s| s.compound == compound)
    }

    pub fn group(&self, compound: &str) -> Option<&CompoundGroup> {
        self.groups.iter().find(|g| g.compound == compound)
    }
}

/// Run the full analysis, optionally inside a dedicated rayon pool.
pub fn run_analysis(dataset: &Dataset, config: &AnalysisConfig) -> Result<AnalysisRun, AppError> {
    if config.threads == 0 {
        return Ok(analyze(dataset, config));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to build thread pool: {e}")))?;
    Ok(pool.install(|| analyze(dataset, config)))
}

/// Run the analysis on the current rayon pool.
pub fn analyze(dataset: &Dataset, config: &AnalysisConfig) -> AnalysisRun {
    let mut warnings = Vec::new();
    let mut skipped = Vec::new();

    let mut groups = Vec::new();
    for group in dataset.groups() {
        if group.concentration_extent().is_none() {
            let reason = "no positive concentration".to_string();
            let w = AnalysisWarning::SkippedCompound {
                compound: group.compound.clone(),
                reason: reason.clone(),
            };
            log::warn!("{w}");
            warnings.push(w);
            skipped.push(SkippedCompound {
                compound: group.compound,
                reason,
            });
            continue;
        }
        groups.push(group);
    }

    let models = ModelKind::registry(config.enable_custom_models);
    let jobs: Vec<(&CompoundGroup, ModelKind)> = groups
        .iter()
        .flat_map(|g| models.iter().map(move |&m| (g, m)))
        .collect();

    log::info!(
        "fitting {} compounds x {} models ({} jobs)",
        groups.len(),
        models.len(),
        jobs.len()
    );

    // Indexed parallel collect preserves job order; this is the only barrier.
    let fits: Vec<FitResult> = jobs
        .par_iter()
        .map(|(group, model)| fit_group(group, *model, &config.fit))
        .collect();

    for fit in &fits {
        if let Some(failure) = fit.failure() {
            let w = AnalysisWarning::FitConvergence {
                compound: fit.compound.clone(),
                model: fit.model,
                failure: failure.clone(),
            };
            log::warn!("{w}");
            warnings.push(w);
        }
    }

    let mut selections = Vec::new();
    for (group, chunk) in groups.iter().zip(fits.chunks(models.len().max(1))) {
        match select_best(&group.compound, chunk, config.selection_metric) {
            Ok(sel) => {
                if sel.metric != config.selection_metric {
                    let w = AnalysisWarning::DegenerateMetric {
                        compound: group.compound.clone(),
                    };
                    log::warn!("{w}");
                    warnings.push(w);
                }
                log::debug!(
                    "{}: selected {} ({} = {})",
                    sel.compound,
                    sel.fit.model,
                    sel.metric.display_name(),
                    sel.value
                );
                selections.push(sel);
            }
            Err(err) => {
                log::debug!("{err}");
                let w = AnalysisWarning::SelectionFailure {
                    compound: group.compound.clone(),
                };
                log::warn!("{w}");
                warnings.push(w);
            }
        }
    }

    let summary = SummaryTable::from_fits(&fits);
    let best = BestModelsTable::from_selections(&selections);

    AnalysisRun {
        groups,
        fits,
        selections,
        skipped,
        warnings,
        summary,
        best,
    }
}
