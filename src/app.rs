//! Top-level application orchestration.
//!
//! `src/main.rs` only parses arguments and installs logging; this module is
//! the "real main" that:
//! - reads the input table (or generates the reference one)
//! - runs fitting + model selection via `pipeline`
//! - prints the report and warnings
//! - writes tables, the plot spec, and figures

use std::path::Path;
use std::time::Duration;

use crate::cli::{parse_color_map, parse_overlay_list, Cli, Command, ExampleArgs, FitArgs, PlotArgs, RunArgs};
use crate::data::{generate_reference_data, write_dataset, EXAMPLE_FILE, REFERENCE_COLORS};
use crate::domain::{AnalysisConfig, AnalysisWarning, ColumnMap, Dataset, FitOptions, PlotOptions};
use crate::error::AppError;
use crate::io::{load_dataset, write_plot_spec, write_tables, PlotSpecFile, PLOT_SPEC_FILE};
use crate::plot::{build_plot_spec, render_compound_plot, render_overlay, write_svgs, PlotSpec};

pub mod pipeline;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Entry point for the `dr` binary.
pub fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Example(args) => handle_example(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = config_from_args(&args.input, &args.run)?;
    let ingest = load_dataset(&config.input, &config.columns)?;
    if !ingest.row_errors.is_empty() {
        eprintln!(
            "Skipped {} of {} input rows (see log for details)",
            ingest.row_errors.len(),
            ingest.rows_read
        );
    }
    run_and_write(&ingest.dataset, &config)
}

fn handle_example(args: ExampleArgs) -> Result<(), AppError> {
    let mut run = args.run.clone();
    if run.overlay.trim().is_empty() {
        run.overlay = crate::data::REFERENCE_COMPOUNDS
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(",");
    }
    if run.colors.trim().is_empty() {
        run.colors = REFERENCE_COLORS.to_string();
    }

    ensure_output_dir(&run.output_dir)?;
    let input = run.output_dir.join(EXAMPLE_FILE);
    let config = config_from_args(&input, &run)?;

    let dataset = generate_reference_data(args.seed, args.noise)?;
    write_dataset(&input, &dataset)?;
    println!("Example data written to {}", input.display());

    // Generated data always uses the default column names.
    let config = AnalysisConfig {
        columns: ColumnMap::default(),
        ..config
    };
    run_and_write(&dataset, &config)
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let file = crate::io::read_plot_spec(&args.spec)?;
    let spec = &file.spec;

    match &args.compound {
        Some(name) => {
            let plot = spec
                .compound(name)
                .ok_or_else(|| AppError::input(format!("Compound '{name}' not found in plot spec")))?;
            println!("{}", render_compound_plot(spec, plot, args.width, args.height));
        }
        None => print_ascii(spec, args.width, args.height),
    }
    Ok(())
}

/// Analysis + every output artifact for one dataset.
fn run_and_write(dataset: &Dataset, config: &AnalysisConfig) -> Result<(), AppError> {
    let groups = dataset.groups();
    println!(
        "{}",
        crate::report::format_run_header(config, dataset.measurements.len(), groups.len())
    );

    let run = pipeline::run_analysis(dataset, config)?;
    let (spec, overlay_warnings) =
        build_plot_spec(&run.selections, &run.groups, &config.columns, &config.plot)
            .map_err(|e| AppError::internal(format!("Failed to build plot spec: {e}")))?;
    for w in &overlay_warnings {
        log::warn!("{w}");
    }
    let warnings: Vec<AnalysisWarning> = run.warnings.iter().chain(&overlay_warnings).cloned().collect();

    println!("{}", crate::report::format_model_diagnostics(&run.summary, &run.best));
    println!("{}", crate::report::format_best_models(&run.best));
    let warning_text = crate::report::format_warnings(&run.skipped, &warnings);
    if !warning_text.is_empty() {
        println!("{warning_text}");
    }

    ensure_output_dir(&config.output_dir)?;
    write_tables(&config.output_dir, &run.summary, &run.best)?;
    write_plot_spec(
        &config.output_dir.join(PLOT_SPEC_FILE),
        &PlotSpecFile::new(spec.clone(), config.selection_metric),
    )?;

    if config.write_svg {
        let timestamp = config
            .add_timestamp
            .then(|| chrono::Local::now().format(TIMESTAMP_FORMAT).to_string());
        let figures = write_svgs(&spec, &config.output_dir, timestamp.as_deref())?;
        println!("Wrote {} figure(s)", figures.len());
    }

    if config.ascii_plot {
        print_ascii(&spec, config.plot_width, config.plot_height);
    }

    println!("Results saved to {}", config.output_dir.display());
    Ok(())
}

fn print_ascii(spec: &PlotSpec, width: usize, height: usize) {
    for plot in &spec.compounds {
        println!("{}", render_compound_plot(spec, plot, width, height));
    }
    if let Some(overlay) = &spec.overlay {
        println!("{}", render_overlay(spec, overlay, width, height));
    }
}

fn ensure_output_dir(dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::internal(format!("Failed to create output directory '{}': {e}", dir.display())))
}

/// Map CLI flags into the immutable run configuration.
pub fn config_from_args(input: &Path, args: &RunArgs) -> Result<AnalysisConfig, AppError> {
    if args.max_iter == 0 {
        return Err(AppError::input("--max-iter must be > 0"));
    }
    let compound_colors = parse_color_map(&args.colors);

    Ok(AnalysisConfig {
        input: input.to_path_buf(),
        output_dir: args.output_dir.clone(),
        columns: ColumnMap {
            compound: args.compound_col.clone(),
            concentration: args.concentration_col.clone(),
            response: args.response_col.clone(),
        },
        selection_metric: args.metric,
        enable_custom_models: !args.no_custom_models,
        fit: FitOptions {
            max_iterations: args.max_iter,
            potency_starts: args.starts,
            time_budget: args.fit_timeout_ms.map(Duration::from_millis),
        },
        plot: PlotOptions {
            overlay_compounds: parse_overlay_list(&args.overlay),
            compound_colors,
            show_ic50_lines: !args.no_ic50_lines,
            show_dmax_lines: !args.no_dmax_lines,
            ..PlotOptions::default()
        },
        threads: args.threads,
        write_svg: !args.no_svg,
        add_timestamp: !args.no_timestamp,
        ascii_plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitFailure, Measurement, SelectionMetric};
    use clap::Parser;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["dr", "fit", "-i", "in.csv"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Fit(args) => args.run,
            _ => unreachable!(),
        }
    }

    #[test]
    fn defaults_map_to_config() {
        let config = config_from_args(Path::new("in.csv"), &run_args(&[])).unwrap();
        assert_eq!(config.selection_metric, SelectionMetric::Rmse);
        assert!(config.enable_custom_models);
        assert!(config.write_svg && config.add_timestamp && !config.ascii_plot);
        assert_eq!(config.columns, ColumnMap::default());
        assert_eq!(config.fit, FitOptions::default());
        assert_eq!(config.plot, PlotOptions::default());
    }

    #[test]
    fn flags_map_to_config() {
        let config = config_from_args(
            Path::new("in.csv"),
            &run_args(&[
                "--metric",
                "bic",
                "--no-custom-models",
                "--overlay",
                "B,A",
                "--colors",
                "A:#e74c3c",
                "--no-dmax-lines",
                "--fit-timeout-ms",
                "250",
                "--response-col",
                "Signal",
            ]),
        )
        .unwrap();
        assert_eq!(config.selection_metric, SelectionMetric::Bic);
        assert!(!config.enable_custom_models);
        assert_eq!(config.plot.overlay_compounds, vec!["B", "A"]);
        assert_eq!(config.plot.compound_colors["A"], "#e74c3c");
        assert!(config.plot.show_ic50_lines && !config.plot.show_dmax_lines);
        assert_eq!(config.fit.time_budget, Some(Duration::from_millis(250)));
        assert_eq!(config.columns.response, "Signal");
    }

    #[test]
    fn bad_options_are_input_errors() {
        let err = config_from_args(Path::new("in.csv"), &run_args(&["--max-iter", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn colorless_entries_do_not_abort_the_run() {
        let config = config_from_args(Path::new("in.csv"), &run_args(&["--colors", "nocolon;B:red"])).unwrap();
        assert_eq!(config.plot.compound_colors.len(), 1);
        assert_eq!(config.plot.compound_colors["B"], "red");
    }

    #[test]
    fn expired_fit_timeout_is_reported_per_fit() {
        let config = config_from_args(Path::new("in.csv"), &run_args(&["--fit-timeout-ms", "0"])).unwrap();
        assert_eq!(config.fit.time_budget, Some(Duration::ZERO));

        let measurements = [0.1, 1.0, 10.0, 100.0, 1000.0, 10000.0]
            .iter()
            .map(|&c| Measurement {
                compound: "A".to_string(),
                concentration: c,
                response: 1.0 / (1.0 + c / 10.0),
            })
            .collect();
        let dataset = Dataset::new(ColumnMap::default(), measurements);
        let run = pipeline::run_analysis(&dataset, &config).unwrap();

        assert!(!run.fits.is_empty());
        assert!(run
            .fits
            .iter()
            .all(|f| matches!(f.failure(), Some(FitFailure::TimeBudget { .. }))));
        assert!(run.best.rows.is_empty());
    }
}
