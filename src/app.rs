//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the log subscriber
//! - runs the fit pipeline
//! - prints reports and writes exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, GridArgs};
use crate::domain::RunConfig;
use crate::error::AppError;
use crate::report::RunCounts;

pub mod pipeline;

/// Entry point for the `sedfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Grid(args) => handle_grid(args),
    }
}

/// Log to stderr; `--log-level` wins over `RUST_LOG`, default `info`.
fn init_tracing(level: Option<&str>) -> Result<(), AppError> {
    let filter = match level {
        Some(level) => {
            EnvFilter::try_new(level).map_err(|e| AppError::new(2, format!("Invalid log level '{level}': {e}")))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // A subscriber may already be installed (e.g. when embedded).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let run = pipeline::run_fit(&args)?;

    let counts = RunCounts {
        models: run.grid.len(),
        observations: run.analysis.observations.len(),
        skipped_rows: run.observations.row_errors.len(),
        elapsed_seconds: run.elapsed_seconds,
    };
    println!("{}", crate::report::format_run_summary(&run.config, &counts));
    println!(
        "{}",
        crate::report::format_estimates(&run.analysis.observations, &run.quantities())
    );

    let issues = crate::report::format_issues(&run.analysis.observations);
    if !issues.is_empty() {
        println!("{issues}");
    }
    if let Some(mock) = &run.mock {
        println!("{}", crate::report::format_mock(mock));
    }

    pipeline::write_outputs(&run, &args.output)
}

fn handle_grid(args: GridArgs) -> Result<(), AppError> {
    let config = RunConfig::load(&args.config)?;
    let grid = crate::fit::expand_parameter_grid(&config.parameters)?;

    println!("{} parameter combinations", grid.len());
    let json = serde_json::to_string_pretty(&grid)
        .map_err(|e| AppError::new(4, format!("Failed to serialize grid: {e}")))?;
    println!("{json}");
    Ok(())
}
