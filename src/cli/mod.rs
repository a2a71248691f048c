//! Command-line parsing for the SED grid fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the statistics code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::PdfKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sedfit", version, about = "SED grid fitting: chi-square comparison, weighted estimates and PDFs")]
pub struct Cli {
    /// Log filter (overrides `RUST_LOG`), e.g. `info` or `sed_fit=debug`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every observation against the model grid and export the results.
    Fit(FitArgs),
    /// Print the expanded parameter grid of a run configuration.
    Grid(GridArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Run configuration (JSON).
    #[arg(short = 'c', long, value_name = "JSON")]
    pub config: PathBuf,

    /// Pre-computed model table (CSV).
    #[arg(short = 'm', long, value_name = "CSV")]
    pub models: PathBuf,

    /// Observation table (CSV).
    #[arg(short = 'o', long, value_name = "CSV")]
    pub observations: PathBuf,

    /// Output directory.
    #[arg(long, env = "SEDFIT_OUTPUT", default_value = "out")]
    pub output: PathBuf,

    /// Worker threads for the grid evaluation (overrides the config).
    #[arg(long, env = "SEDFIT_CORES")]
    pub cores: Option<usize>,

    /// PDF estimator (overrides the config).
    #[arg(long, value_enum)]
    pub pdf: Option<PdfKind>,

    /// Also analyse a mock catalogue built from the best fits.
    #[arg(long)]
    pub mock: bool,

    /// Random seed for the mock catalogue noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Debug, Parser, Clone)]
pub struct GridArgs {
    /// Run configuration (JSON).
    #[arg(short = 'c', long, value_name = "JSON")]
    pub config: PathBuf,
}
