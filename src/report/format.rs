//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{AnalysisConfig, AnalysisWarning, SkippedCompound};
use crate::report::{BestModelsTable, SummaryTable};

/// Header with the run configuration and dataset size.
pub fn format_run_header(config: &AnalysisConfig, n_rows: usize, n_compounds: usize) -> String {
    let mut out = String::new();
    out.push_str("=== dr - Dose-Response Fit ===\n");
    out.push_str(&format!("Input: {}\n", config.input.display()));
    out.push_str(&format!(
        "Columns: compound={} | concentration={} | response={}\n",
        config.columns.compound, config.columns.concentration, config.columns.response
    ));
    out.push_str(&format!("Rows: {n_rows} | compounds: {n_compounds}\n"));
    let models: Vec<&str> = crate::domain::ModelKind::registry(config.enable_custom_models)
        .into_iter()
        .map(|m| m.display_name())
        .collect();
    out.push_str(&format!(
        "Models: {} | selection metric: {}\n",
        models.join(", "),
        config.selection_metric.display_name()
    ));
    out
}

/// Per-compound model diagnostics; the selected model is starred.
pub fn format_model_diagnostics(summary: &SummaryTable, best: &BestModelsTable) -> String {
    let mut out = String::new();
    out.push_str("Model diagnostics:\n");
    out.push_str(
        format!(
            "  {:<16} {:<12} {:>12} {:>10} {:>8} {:>10} {:>10}  {}\n",
            "compound", "model", "IC50", "RMSE", "R2", "AIC", "BIC", "status"
        )
        .trim_end(),
    );
    out.push('\n');
    for row in &summary.rows {
        let chosen = best
            .get(&row.compound)
            .is_some_and(|b| b.model == row.model);
        let star = if chosen { "*" } else { " " };
        out.push_str(
            format!(
                "{star} {:<16} {:<12} {:>12} {:>10} {:>8} {:>10} {:>10}  {}\n",
                truncate(&row.compound, 16),
                row.model.display_name(),
                fmt_opt(row.ic50, 3),
                fmt_opt(row.rmse, 4),
                fmt_opt(row.r2, 4),
                fmt_opt(row.aic, 2),
                fmt_opt(row.bic, 2),
                row.status,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// The best-model and IC50 sections.
pub fn format_best_models(best: &BestModelsTable) -> String {
    let mut out = String::new();
    out.push_str("=== BEST MODELS ===\n");
    for row in &best.rows {
        out.push_str(&format!(
            "{}: {} ({} = {:.4})\n",
            row.compound,
            row.model.display_name(),
            row.metric.display_name(),
            row.metric_value
        ));
    }
    out.push_str("\n=== IC50 VALUES ===\n");
    for row in &best.rows {
        out.push_str(&format!(
            "{}: IC50 = {:.2} (Model: {}, RMSE: {:.4})\n",
            row.compound,
            row.ic50,
            row.model.display_name(),
            row.rmse
        ));
    }
    out
}

/// Skipped compounds and recoverable warnings, or an empty string if none.
pub fn format_warnings(skipped: &[SkippedCompound], warnings: &[AnalysisWarning]) -> String {
    let listed: Vec<&AnalysisWarning> = warnings
        .iter()
        .filter(|w| !matches!(w, AnalysisWarning::SkippedCompound { .. }))
        .collect();
    if skipped.is_empty() && listed.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    if !skipped.is_empty() {
        out.push_str("Skipped compounds:\n");
        for s in skipped {
            out.push_str(&format!("- {}: {}\n", s.compound, s.reason));
        }
    }
    if !listed.is_empty() {
        out.push_str("Warnings:\n");
        for w in listed {
            out.push_str(&format!("- {w}\n"));
        }
    }
    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) if x.is_nan() => "NaN".to_string(),
        Some(x) => format!("{x:.decimals$}"),
        None => "-".to_string(),
    }
}

pub(crate) fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
