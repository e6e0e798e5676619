//! Read/write `plot_spec.json`.
//!
//! The plot spec is the portable hand-off to renderers: a run writes it next
//! to the tables and `dr plot` can re-render it later without refitting.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::SelectionMetric;
use crate::error::AppError;
use crate::plot::PlotSpec;

pub const PLOT_SPEC_FILE: &str = "plot_spec.json";

/// On-disk envelope around a `PlotSpec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpecFile {
    pub tool: String,
    pub created: DateTime<Local>,
    pub selection_metric: SelectionMetric,
    pub spec: PlotSpec,
}

impl PlotSpecFile {
    pub fn new(spec: PlotSpec, selection_metric: SelectionMetric) -> Self {
        Self {
            tool: "dr".to_string(),
            created: Local::now(),
            selection_metric,
            spec,
        }
    }
}

pub fn write_plot_spec(path: &Path, file: &PlotSpecFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create plot spec '{}': {e}", path.display())))?;
    write_plot_spec_to(out, file)
        .map_err(|e| AppError::new(4, format!("Failed to write plot spec '{}': {e}", path.display())))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

pub fn write_plot_spec_to<W: Write>(out: W, file: &PlotSpecFile) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(out, file)
}

pub fn read_plot_spec(path: &Path) -> Result<PlotSpecFile, AppError> {
    let input = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open plot spec '{}': {e}", path.display())))?;
    read_plot_spec_from(input)
}

pub fn read_plot_spec_from<R: Read>(input: R) -> Result<PlotSpecFile, AppError> {
    serde_json::from_reader(input).map_err(|e| AppError::new(2, format!("Invalid plot spec JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_spec_reads_back() {
        let spec = PlotSpec {
            concentration_label: "Conc".to_string(),
            response_label: "Rab10".to_string(),
            compounds: Vec::new(),
            overlay: None,
        };
        let file = PlotSpecFile::new(spec, SelectionMetric::Bic);
        let mut buf = Vec::new();
        write_plot_spec_to(&mut buf, &file).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("\"selection_metric\": \"bic\""));
        let back = read_plot_spec_from(buf.as_slice()).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn garbage_is_an_input_error() {
        let err = read_plot_spec_from("{ not json".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
