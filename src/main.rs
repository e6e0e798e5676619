use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = dose_curves::cli::Cli::parse();

    // Library code logs through `log`; the fmt subscriber picks those records up.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match dose_curves::app::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
