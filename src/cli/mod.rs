//! Command-line parsing for the dose-response fitter.
//!
//! Argument parsing and command dispatch stay separate from the fitting code;
//! `app::config_from_args` turns these structs into an `AnalysisConfig`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::SelectionMetric;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dr", version, about = "Dose-response curve fitting and model selection")]
pub struct Cli {
    /// Log verbosity (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every model to every compound in a table, select the best, and write results.
    Fit(FitArgs),
    /// Generate the reference dataset and run `fit` on it with all compounds overlaid.
    Example(ExampleArgs),
    /// Render a saved plot spec in the terminal.
    Plot(PlotArgs),
}

/// Options for a fitting run.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Input table (.csv comma-delimited, .tsv/.txt tab-delimited).
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Options shared by `fit` and `example`.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Output directory (created if missing).
    #[arg(short = 'o', long, value_name = "DIR", default_value = "dose_response_output")]
    pub output_dir: PathBuf,

    /// Compound identifier column.
    #[arg(long, default_value = "Compound")]
    pub compound_col: String,

    /// Concentration column.
    #[arg(long, default_value = "Conc")]
    pub concentration_col: String,

    /// Response column.
    #[arg(long, default_value = "Rab10")]
    pub response_col: String,

    /// Metric used to pick the best model per compound.
    #[arg(long, value_enum, default_value_t = SelectionMetric::Rmse)]
    pub metric: SelectionMetric,

    /// Only fit the core models (4PL, 3PL).
    #[arg(long)]
    pub no_custom_models: bool,

    /// Compounds to overlay, comma-separated and in order (e.g. "A,B").
    #[arg(long, default_value = "")]
    pub overlay: String,

    /// Per-compound colors (e.g. "A:#e74c3c;B:#3498db").
    #[arg(long, default_value = "")]
    pub colors: String,

    /// Hide IC50 reference lines.
    #[arg(long)]
    pub no_ic50_lines: bool,

    /// Hide Dmax reference lines.
    #[arg(long)]
    pub no_dmax_lines: bool,

    /// Do not append a timestamp to figure file names.
    #[arg(long)]
    pub no_timestamp: bool,

    /// Skip SVG figures.
    #[arg(long)]
    pub no_svg: bool,

    /// Print ASCII plots in the terminal.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Optimizer iteration budget per start.
    #[arg(long, default_value_t = 400)]
    pub max_iter: usize,

    /// Potency seeds per model (multi-start).
    #[arg(long, default_value_t = 5)]
    pub starts: usize,

    /// Wall-clock budget per (compound, model) fit in milliseconds.
    #[arg(long, value_name = "MS")]
    pub fit_timeout_ms: Option<u64>,

    /// Worker threads (0 = one per core).
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

/// Options for the reference example.
#[derive(Debug, Parser, Clone)]
pub struct ExampleArgs {
    /// Random seed for the reference data.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Standard deviation of the response noise.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Options for plotting a saved spec.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Plot spec JSON produced by `dr fit`.
    #[arg(long, value_name = "JSON")]
    pub spec: PathBuf,

    /// Only this compound (default: every compound plus the overlay).
    #[arg(long)]
    pub compound: Option<String>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Parse `"A, B,,C"` into `["A", "B", "C"]`, keeping order and duplicates out.
pub fn parse_overlay_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !out.iter().any(|c| c == token) {
            out.push(token.to_string());
        }
    }
    out
}

/// Parse `"A:#e74c3c;B:#3498db"` into a compound -> color map.
///
/// Each entry splits at its first `:`. Entries without one, or with an empty
/// side, are skipped with a warning.
pub fn parse_color_map(raw: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once(':').map(|(c, k)| (c.trim(), k.trim())) {
            Some((compound, color)) if !compound.is_empty() && !color.is_empty() => {
                map.insert(compound.to_string(), color.to_string());
            }
            _ => log::warn!("ignoring color entry '{entry}': expected COMPOUND:COLOR"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fit_defaults() {
        let cli = Cli::try_parse_from(["dr", "fit", "-i", "data.csv"]).unwrap();
        assert_eq!(cli.log_level, tracing::Level::WARN);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.input, PathBuf::from("data.csv"));
        assert_eq!(args.run.metric, SelectionMetric::Rmse);
        assert_eq!(args.run.response_col, "Rab10");
        assert!(!args.run.no_custom_models);
        assert_eq!(args.run.fit_timeout_ms, None);
    }

    #[test]
    fn metric_and_flags_parse() {
        let cli = Cli::try_parse_from([
            "dr", "fit", "-i", "d.txt", "--metric", "r2", "--no-custom-models", "--overlay", "A,B", "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.run.metric, SelectionMetric::R2);
        assert!(args.run.no_custom_models);
        assert_eq!(parse_overlay_list(&args.run.overlay), vec!["A", "B"]);
    }

    #[test]
    fn unknown_metric_is_rejected() {
        assert!(Cli::try_parse_from(["dr", "fit", "-i", "d.csv", "--metric", "mae"]).is_err());
    }

    #[test]
    fn overlay_list_trims_and_dedups() {
        assert_eq!(parse_overlay_list(" A , B,,A ,C"), vec!["A", "B", "C"]);
        assert!(parse_overlay_list("").is_empty());
    }

    #[test]
    fn color_map_parses_entries() {
        let map = parse_color_map("Compound_A:#e74c3c; Compound_B : #3498db;");
        assert_eq!(map.len(), 2);
        assert_eq!(map["Compound_B"], "#3498db");
        assert_eq!(parse_color_map("ns:X:red")["ns"], "X:red");
        assert!(parse_color_map("").is_empty());
    }

    #[test]
    fn malformed_color_entries_are_skipped() {
        let map = parse_color_map("A=#fff;B:blue;:red;C:");
        assert_eq!(map.len(), 1);
        assert_eq!(map["B"], "blue");
    }
}
