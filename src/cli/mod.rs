//! Command-line parsing for the CDS panel pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Every numeric option is optional here: an unset flag
//! falls back to the environment and then to the built-in default (see
//! `config`).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{EstimatorKind, ImputationPolicy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cds", version, about = "CDS spread panel modelling: features, fits and validation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prepare a panel, engineer features and print the feature summary.
    Features(FeaturesArgs),
    /// Fit one estimator and print the model summary.
    Fit(FitArgs),
    /// Walk-forward validation of the configured estimator.
    Validate(FitArgs),
    /// Pooled OLS sensitivity to winsorization level and feature subset.
    Robustness(FitArgs),
    /// Run the whole pipeline on a seeded synthetic panel.
    Demo(DemoArgs),
}

/// Where the panel comes from plus the preparation/feature options.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Panel CSV (one row per entity and period).
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    /// Dated macro series CSV merged as of each row's date.
    #[arg(long = "macro", value_name = "CSV")]
    pub macro_csv: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct PipelineArgs {
    /// Tail share clipped on each side, in (0, 0.5).
    #[arg(long)]
    pub winsorize_level: Option<f64>,

    /// Trailing window (periods) of the rolling accounting features.
    #[arg(long)]
    pub rolling_window: Option<usize>,

    /// Treatment of required fields still missing after back-fill.
    #[arg(long, value_enum)]
    pub imputation: Option<ImputationPolicy>,

    /// Raw spread column; the model target is its natural log.
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the engineered table to CSV.
    #[arg(long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Also print the panel readiness assessment.
    #[arg(long)]
    pub readiness: bool,
}

/// Options shared by `fit`, `validate` and `robustness`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ModelArgs {
    #[arg(short = 'e', long, value_enum)]
    pub estimator: Option<EstimatorKind>,

    /// Comma-separated model features (default: every categorized feature
    /// with enough coverage).
    #[arg(short = 'f', long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Walk-forward training window (years).
    #[arg(long)]
    pub train_years: Option<u32>,

    /// Walk-forward test window (years).
    #[arg(long)]
    pub test_years: Option<u32>,

    /// Walk-forward step (years).
    #[arg(long)]
    pub step_years: Option<u32>,

    /// Keep the training window start fixed (expanding window).
    #[arg(long)]
    pub anchored: bool,

    /// Winsorization levels for the robustness sweep.
    #[arg(long, value_delimiter = ',')]
    pub robust_levels: Vec<f64>,

    /// Write the result (artifact or report) as JSON.
    #[arg(long, value_name = "JSON")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Number of synthetic entities.
    #[arg(short = 'n', long, default_value_t = 80)]
    pub entities: usize,

    /// Number of quarters per entity.
    #[arg(long, default_value_t = 32)]
    pub periods: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write the raw synthetic panel to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_raw: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_flags_parse() {
        let cli = Cli::try_parse_from([
            "cds",
            "fit",
            "-i",
            "panel.csv",
            "--estimator",
            "fama_macbeth",
            "--features",
            "roa,leverage",
            "--winsorize-level",
            "0.025",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.model.estimator, Some(EstimatorKind::FamaMacBeth));
        assert_eq!(args.model.features, vec!["roa", "leverage"]);
        assert_eq!(args.input.pipeline.winsorize_level, Some(0.025));
        assert!(args.input.macro_csv.is_none());
    }

    #[test]
    fn demo_has_defaults() {
        let cli = Cli::try_parse_from(["cds", "demo", "--seed", "7"]).unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!((args.entities, args.periods, args.seed), (80, 32, 7));
        assert!(args.model.features.is_empty());
    }
}
