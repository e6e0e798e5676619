//! Delimited table ingest.
//!
//! Turns a comma- or tab-delimited file into a `Dataset` of
//! `(compound, concentration, response)` measurements.
//!
//! - **Strict schema**: the three configured columns must exist (exit code 2)
//! - **Row-level validation**: unparseable rows are skipped and reported
//! - **No fitting logic here**

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{ColumnMap, Dataset, Measurement};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the dataset plus what was dropped on the way.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl IngestedData {
    pub fn rows_used(&self) -> usize {
        self.dataset.measurements.len()
    }
}

/// Field delimiter chosen from the file extension.
///
/// `.csv` is comma-delimited; `.tsv` and `.txt` are tab-delimited.
pub fn delimiter_for(path: &Path) -> Result<u8, AppError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("csv") => Ok(b','),
        Some("tsv") | Some("txt") => Ok(b'\t'),
        _ => Err(AppError::new(
            2,
            format!(
                "Unsupported input format '{}': expected .csv, .tsv or .txt",
                path.display()
            ),
        )),
    }
}

/// Open and ingest `path`.
pub fn load_dataset(path: &Path, columns: &ColumnMap) -> Result<IngestedData, AppError> {
    let delimiter = delimiter_for(path)?;
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open input '{}': {e}", path.display())))?;
    let data = read_dataset(file, delimiter, columns)?;

    for err in &data.row_errors {
        log::warn!("{}:{}: {}", path.display(), err.line, err.message);
    }
    log::info!(
        "read {} rows from {} ({} usable)",
        data.rows_read,
        path.display(),
        data.rows_used()
    );
    Ok(data)
}

/// Ingest from any reader. Fails with exit code 3 when no row is usable.
pub fn read_dataset<R: Read>(input: R, delimiter: u8, columns: &ColumnMap) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read table header: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let compound_idx = require_column(&header_map, &columns.compound)?;
    let conc_idx = require_column(&header_map, &columns.concentration)?;
    let response_idx = require_column(&header_map, &columns.response)?;

    let mut measurements = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, compound_idx, conc_idx, response_idx, columns) {
            Ok(m) => measurements.push(m),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if measurements.is_empty() {
        return Err(AppError::new(
            3,
            format!("No usable rows ({rows_read} read, {} rejected)", row_errors.len()),
        ));
    }

    Ok(IngestedData {
        dataset: Dataset::new(columns.clone(), measurements),
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for duplicated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

fn parse_row(
    record: &StringRecord,
    compound_idx: usize,
    conc_idx: usize,
    response_idx: usize,
    columns: &ColumnMap,
) -> Result<Measurement, String> {
    let compound = record
        .get(compound_idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing `{}`", columns.compound))?;
    let concentration = parse_number(record.get(conc_idx), &columns.concentration)?;
    let response = parse_number(record.get(response_idx), &columns.response)?;

    if concentration < 0.0 {
        return Err(format!("negative `{}`: {concentration}", columns.concentration));
    }

    Ok(Measurement {
        compound: compound.to_string(),
        concentration,
        response,
    })
}

fn parse_number(raw: Option<&str>, column: &str) -> Result<f64, String> {
    let raw = raw.filter(|s| !s.is_empty()).ok_or_else(|| format!("missing `{column}`"))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("invalid number in `{column}`: '{raw}'"))?;
    if !value.is_finite() {
        return Err(format!("non-finite `{column}`: '{raw}'"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str, delimiter: u8) -> Result<IngestedData, AppError> {
        read_dataset(text.as_bytes(), delimiter, &ColumnMap::default())
    }

    #[test]
    fn delimiter_follows_extension() {
        assert_eq!(delimiter_for(Path::new("a.csv")).unwrap(), b',');
        assert_eq!(delimiter_for(Path::new("a.TSV")).unwrap(), b'\t');
        assert_eq!(delimiter_for(Path::new("dir/example_data.txt")).unwrap(), b'\t');
        let err = delimiter_for(Path::new("a.xlsx")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(delimiter_for(Path::new("noext")).is_err());
    }

    #[test]
    fn reads_tab_delimited_rows_in_order() {
        let data = read("Compound\tConc\tRab10\nB\t0.1\t1.0\nA\t1\t0.8\nB\t10\t0.2\n", b'\t').unwrap();
        assert_eq!(data.rows_read, 3);
        assert_eq!(data.rows_used(), 3);
        assert!(data.row_errors.is_empty());
        assert_eq!(data.dataset.compounds(), vec!["B".to_string(), "A".to_string()]);
        assert_eq!(data.dataset.measurements[1].concentration, 1.0);
    }

    #[test]
    fn header_match_ignores_case_and_bom() {
        let data = read("\u{feff}compound,CONC,rab10\nA,1,0.5\n", b',').unwrap();
        assert_eq!(data.rows_used(), 1);
    }

    #[test]
    fn custom_column_names() {
        let cols = ColumnMap {
            compound: "Drug".to_string(),
            concentration: "Dose".to_string(),
            response: "Signal".to_string(),
        };
        let data = read_dataset("Dose,Drug,Signal\n5,X,0.3\n".as_bytes(), b',', &cols).unwrap();
        let m = &data.dataset.measurements[0];
        assert_eq!((m.compound.as_str(), m.concentration, m.response), ("X", 5.0, 0.3));
    }

    #[test]
    fn missing_column_is_an_input_error() {
        let err = read("Compound,Conc\nA,1\n", b',').unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Rab10"));
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let data = read("Compound,Conc,Rab10\nA,1,0.5\nA,abc,0.4\nA,-1,0.3\n,1,0.2\nA,10,\nA,100,0.1\n", b',').unwrap();
        assert_eq!(data.rows_used(), 2);
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
        assert!(data.row_errors[1].message.contains("negative"));
    }

    #[test]
    fn tab_files_are_split_by_extension() {
        let dir = std::env::temp_dir().join(format!("dose-curves-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        // The comma inside the compound name only survives a tab split.
        let text = "Compound\tConc\tRab10\nMix 1,2\t10\t0.4\nMix 1,2\t100\t0.2\n";
        for name in ["plate.tsv", "plate.txt"] {
            let path = dir.join(name);
            std::fs::write(&path, text).unwrap();
            let data = load_dataset(&path, &ColumnMap::default()).unwrap();
            assert_eq!(data.rows_used(), 2, "{name}");
            assert_eq!(data.dataset.compounds(), vec!["Mix 1,2".to_string()]);
            assert_eq!(data.dataset.measurements[1].response, 0.2);
        }

        let csv_path = dir.join("plate.csv");
        std::fs::write(&csv_path, text).unwrap();
        assert_eq!(load_dataset(&csv_path, &ColumnMap::default()).unwrap_err().exit_code(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn no_usable_rows_is_exit_3() {
        let err = read("Compound,Conc,Rab10\nA,x,y\n", b',').unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
