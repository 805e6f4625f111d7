//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and resolves the configuration
//! - loads (or generates) the panel
//! - runs preparation, feature engineering and the requested stage
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{Command, DemoArgs, FeaturesArgs, FitArgs};
use crate::data::{SyntheticConfig, generate_panel};
use crate::error::AppError;
use crate::features::feature_summary;
use crate::io::{write_json, write_panel_csv};
use crate::report::{
    format_feature_summary, format_importance, format_model_summary, format_preparation, format_readiness,
    format_robustness, format_walk_forward, model_report,
};

pub mod pipeline;

use pipeline::FeatureRun;

/// Entry point for the `cds` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Features(args) => handle_features(args),
        Command::Fit(args) => handle_fit(args),
        Command::Validate(args) => handle_validate(args),
        Command::Robustness(args) => handle_robustness(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_features(args: FeaturesArgs) -> Result<(), AppError> {
    let config = pipeline::resolve_config(&args.input.pipeline, None)?;
    let (raw, macro_series) = pipeline::load_inputs(&args.input.input, args.input.macro_csv.as_deref())?;
    let run = pipeline::run_features(&raw, macro_series, &config)?;

    print_preparation(&run, args.readiness);
    print_feature_summary(&run);

    if let Some(path) = &args.output {
        write_panel_csv(path, &run.features.table)?;
        info!(path = %path.display(), "wrote feature table");
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = pipeline::resolve_config(&args.input.pipeline, Some(&args.model))?;
    let (raw, macro_series) = pipeline::load_inputs(&args.input.input, args.input.macro_csv.as_deref())?;
    let run = pipeline::run_features(&raw, macro_series, &config)?;
    let features = pipeline::model_features(&run, &args.model.features)?;

    let model = pipeline::run_fit(&run, &features, &config)?;
    println!("{}", format_model_summary(&model));
    println!("{}", format_importance(&model.feature_importance()));

    if let Some(path) = &args.model.json {
        write_json(path, &model)?;
    }
    Ok(())
}

fn handle_validate(args: FitArgs) -> Result<(), AppError> {
    let config = pipeline::resolve_config(&args.input.pipeline, Some(&args.model))?;
    let (raw, macro_series) = pipeline::load_inputs(&args.input.input, args.input.macro_csv.as_deref())?;
    let run = pipeline::run_features(&raw, macro_series, &config)?;
    let features = pipeline::model_features(&run, &args.model.features)?;

    let report = pipeline::run_walk_forward(&run, &features, &config)?;
    println!("{}", format_walk_forward(&report));

    if let Some(path) = &args.model.json {
        write_json(path, &report)?;
    }
    Ok(())
}

fn handle_robustness(args: FitArgs) -> Result<(), AppError> {
    let config = pipeline::resolve_config(&args.input.pipeline, Some(&args.model))?;
    let (raw, macro_series) = pipeline::load_inputs(&args.input.input, args.input.macro_csv.as_deref())?;
    let run = pipeline::run_features(&raw, macro_series, &config)?;
    let features = pipeline::model_features(&run, &args.model.features)?;

    let report = pipeline::run_robustness(&run, &features, &config)?;
    println!("{}", format_robustness(&report));

    if let Some(path) = &args.model.json {
        write_json(path, &report)?;
    }
    Ok(())
}

/// Whole pipeline on a synthetic panel: features, the configured estimator,
/// walk-forward validation and the robustness sweep.
fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = pipeline::resolve_config(&args.pipeline, Some(&args.model))?;
    let synthetic = generate_panel(&SyntheticConfig {
        entities: args.entities,
        periods: args.periods,
        seed: args.seed,
        ..SyntheticConfig::default()
    })?;
    if let Some(path) = &args.export_raw {
        write_panel_csv(path, &synthetic.panel)?;
    }

    let run = pipeline::run_features(&synthetic.panel, Some(synthetic.macro_series), &config)?;
    print_preparation(&run, true);
    print_feature_summary(&run);

    let features = pipeline::model_features(&run, &args.model.features)?;
    let model = pipeline::run_fit(&run, &features, &config)?;
    println!("{}", format_model_summary(&model));
    println!("{}", format_importance(&model.feature_importance()));

    // A short synthetic history may not fit a single window; report and go on.
    let walk_forward = match pipeline::run_walk_forward(&run, &features, &config) {
        Ok(report) => {
            println!("{}", format_walk_forward(&report));
            Some(report)
        }
        Err(err) => {
            println!("Walk-forward skipped: {err}\n");
            None
        }
    };

    let robustness = pipeline::run_robustness(&run, &features, &config)?;
    println!("{}", format_robustness(&robustness));

    if let Some(path) = &args.model.json {
        let out = serde_json::json!({
            "config": config,
            "synthetic": synthetic.config,
            "process": synthetic.process,
            "model": model_report(&model),
            "walk_forward": walk_forward,
            "robustness": robustness,
        });
        write_json(path, &out)?;
    }
    Ok(())
}

fn print_preparation(run: &FeatureRun, readiness: bool) {
    let prep = format_preparation(&run.prepared.report);
    if !prep.is_empty() {
        println!("{prep}");
    }
    if readiness {
        println!("{}", format_readiness(&run.readiness));
    }
}

fn print_feature_summary(run: &FeatureRun) {
    let stats = feature_summary(&run.features.table, run.engineer.rolling_window());
    println!("{}", format_feature_summary(&stats, &run.features.absent));
}
