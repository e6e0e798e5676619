//! Tab-delimited table exports.
//!
//! `summary_table.txt` has one row per attempted (compound, model) fit and
//! `best_models.txt` one row per compound with a selected model. Failed fits
//! leave numeric cells empty; undefined values print as `NaN`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::report::format::fmt_vec;
use crate::report::{BestModelsTable, SummaryTable};

pub const SUMMARY_FILE: &str = "summary_table.txt";
pub const BEST_MODELS_FILE: &str = "best_models.txt";

const SUMMARY_HEADER: [&str; 13] = [
    "Compound", "Model", "Converged", "Status", "N", "K", "IC50", "Dmax", "RMSE", "R2", "AIC", "BIC", "Params",
];
const BEST_HEADER: [&str; 10] = [
    "Compound", "Model", "IC50", "Dmax", "Metric", "MetricValue", "RMSE", "R2", "AIC", "BIC",
];

/// Write both tables into `dir` and return their paths.
pub fn write_tables(dir: &Path, summary: &SummaryTable, best: &BestModelsTable) -> Result<(PathBuf, PathBuf), AppError> {
    let summary_path = dir.join(SUMMARY_FILE);
    let best_path = dir.join(BEST_MODELS_FILE);

    let file = create(&summary_path)?;
    write_summary(file, summary).map_err(|e| write_error(&summary_path, e))?;
    let file = create(&best_path)?;
    write_best_models(file, best).map_err(|e| write_error(&best_path, e))?;

    log::info!("wrote {} and {}", summary_path.display(), best_path.display());
    Ok((summary_path, best_path))
}

pub fn write_summary<W: Write>(out: W, table: &SummaryTable) -> csv::Result<()> {
    let mut wtr = tab_writer(out);
    wtr.write_record(SUMMARY_HEADER)?;
    for r in &table.rows {
        wtr.write_record([
            r.compound.clone(),
            r.model.to_string(),
            r.converged.to_string(),
            r.status.clone(),
            r.n.map(|n| n.to_string()).unwrap_or_default(),
            r.k.to_string(),
            cell(r.ic50),
            cell(r.dmax),
            cell(r.rmse),
            cell(r.r2),
            cell(r.aic),
            cell(r.bic),
            if r.converged { fmt_vec(&r.params) } else { String::new() },
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_best_models<W: Write>(out: W, table: &BestModelsTable) -> csv::Result<()> {
    let mut wtr = tab_writer(out);
    wtr.write_record(BEST_HEADER)?;
    for r in &table.rows {
        wtr.write_record([
            r.compound.clone(),
            r.model.to_string(),
            r.ic50.to_string(),
            r.dmax.to_string(),
            r.metric.display_name().to_string(),
            r.metric_value.to_string(),
            r.rmse.to_string(),
            r.r2.to_string(),
            r.aic.to_string(),
            r.bic.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Tab-delimited writer; fields holding a tab, quote or newline get quoted.
fn tab_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b'\t').from_writer(out)
}

fn cell(v: Option<f64>) -> String {
    // f64 Display already renders NaN as `NaN`.
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::new(4, format!("Failed to create '{}': {e}", path.display())))
}

fn write_error(path: &Path, e: csv::Error) -> AppError {
    AppError::new(4, format!("Failed to write '{}': {e}", path.display()))
}
