//! Shared pipeline logic used by every command.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> prepare -> engineer -> fit / validate / robustness
//!
//! The command handlers in `app` can then focus on presentation.

use std::path::Path;

use tracing::{info, warn};

use crate::cli::{ModelArgs, PipelineArgs};
use crate::config::PipelineConfig;
use crate::domain::{ModelArtifact, Panel};
use crate::error::{AppError, FitError};
use crate::features::{FeatureEngineer, FeatureTable, MacroSeries, feature_summary};
use crate::fit::fit_model;
use crate::io::{load_macro_csv, load_panel_csv};
use crate::prepare::{PanelPreparer, PreparedPanel, ReadinessReport, assess_readiness};
use crate::validate::{RobustnessConfig, RobustnessReport, WalkForwardReport, default_subsets, robustness_sweep, walk_forward};

/// Features with more missing cells than this are left out of the default
/// model feature set.
pub const MAX_DEFAULT_MISSING_PCT: f64 = 50.0;

/// Everything up to (not including) model fitting.
#[derive(Debug, Clone)]
pub struct FeatureRun {
    pub prepared: PreparedPanel,
    pub readiness: ReadinessReport,
    pub engineer: FeatureEngineer,
    pub features: FeatureTable,
}

impl FeatureRun {
    /// Name of the model target (the log spread).
    pub fn target(&self) -> Result<&str, FitError> {
        self.features.target.as_deref().ok_or_else(|| FitError::MissingInput {
            column: "target spread column".to_string(),
        })
    }
}

/// Load the panel CSV (and the optional macro CSV).
pub fn load_inputs(input: &Path, macro_csv: Option<&Path>) -> Result<(Panel, Option<MacroSeries>), AppError> {
    let ingested = load_panel_csv(input)?;
    for err in ingested.row_errors.iter().take(10) {
        warn!(line = err.line, entity = ?err.entity, "{}", err.message);
    }
    let macro_series = macro_csv.map(load_macro_csv).transpose()?;
    Ok((ingested.panel, macro_series))
}

/// Layer CLI overrides on top of the environment configuration.
pub fn resolve_config(pipeline: &PipelineArgs, model: Option<&ModelArgs>) -> Result<PipelineConfig, AppError> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(v) = pipeline.winsorize_level {
        config.winsorize_level = v;
    }
    if let Some(v) = pipeline.rolling_window {
        config.rolling_window = v;
    }
    if let Some(v) = pipeline.imputation {
        config.imputation = v;
    }
    if let Some(v) = &pipeline.target {
        config.target_column = v.clone();
    }
    if let Some(m) = model {
        if let Some(v) = m.estimator {
            config.estimator = v;
        }
        if let Some(v) = m.train_years {
            config.train_years = v;
        }
        if let Some(v) = m.test_years {
            config.test_years = v;
        }
        if let Some(v) = m.step_years {
            config.step_years = v;
        }
        if m.anchored {
            config.anchored_walk_forward = true;
        }
        if !m.robust_levels.is_empty() {
            config.robust_winsorize_levels = m.robust_levels.clone();
        }
    }
    config.validate()?;
    Ok(config)
}

/// Prepare the raw panel and engineer the feature table.
pub fn run_features(
    raw: &Panel,
    macro_series: Option<MacroSeries>,
    config: &PipelineConfig,
) -> Result<FeatureRun, AppError> {
    let prepared = PanelPreparer::new(config.imputation).prepare(raw);
    let readiness = assess_readiness(&prepared.panel);
    if !readiness.ready {
        warn!(score = readiness.score, "panel does not meet the readiness thresholds");
    }

    let mut engineer = FeatureEngineer::new(config.winsorize_level)?.with_rolling_window(config.rolling_window)?;
    if let Some(series) = macro_series {
        engineer = engineer.with_macro_series(series);
    }
    let features = engineer.engineer(&prepared.panel, Some(&config.target_column));

    Ok(FeatureRun {
        prepared,
        readiness,
        engineer,
        features,
    })
}

/// Requested features, or every categorized feature with at most
/// `MAX_DEFAULT_MISSING_PCT` missing.
pub fn model_features(run: &FeatureRun, requested: &[String]) -> Result<Vec<String>, AppError> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }
    let chosen: Vec<String> = feature_summary(&run.features.table, run.engineer.rolling_window())
        .into_iter()
        .filter(|s| s.count > 0 && s.missing_pct <= MAX_DEFAULT_MISSING_PCT)
        .map(|s| s.feature)
        .collect();
    if chosen.is_empty() {
        return Err(AppError::new(3, "No engineered feature has enough coverage to fit a model."));
    }
    info!(features = ?chosen, "default model features");
    Ok(chosen)
}

pub fn run_fit(run: &FeatureRun, features: &[String], config: &PipelineConfig) -> Result<ModelArtifact, AppError> {
    let target = run.target()?;
    Ok(fit_model(config.estimator, &run.features.table, target, features)?)
}

pub fn run_walk_forward(
    run: &FeatureRun,
    features: &[String],
    config: &PipelineConfig,
) -> Result<WalkForwardReport, AppError> {
    let target = run.target()?;
    Ok(walk_forward(&run.features.table, target, features, &config.walk_forward_config())?)
}

pub fn run_robustness(
    run: &FeatureRun,
    features: &[String],
    config: &PipelineConfig,
) -> Result<RobustnessReport, AppError> {
    let sweep = RobustnessConfig {
        winsorize_levels: config.robust_winsorize_levels.clone(),
        subsets: default_subsets(features, config.rolling_window),
    };
    Ok(robustness_sweep(
        &run.engineer,
        &run.features,
        &config.target_column,
        features,
        &sweep,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticConfig, generate_panel};

    fn demo_run() -> FeatureRun {
        let synthetic = generate_panel(&SyntheticConfig {
            entities: 20,
            periods: 12,
            ..SyntheticConfig::default()
        })
        .unwrap();
        run_features(
            &synthetic.panel,
            Some(synthetic.macro_series),
            &PipelineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn default_features_skip_sparse_columns() {
        let run = demo_run();
        let features = model_features(&run, &[]).unwrap();
        assert!(features.contains(&"leverage".to_string()));
        assert!(features.contains(&"naive_dtd".to_string()));
        // daily-window market features are empty on a quarterly panel
        assert!(!features.contains(&"equity_volatility_100d".to_string()));
        assert_eq!(run.target().unwrap(), "log_cds_spread");
    }

    #[test]
    fn explicit_features_are_kept_verbatim() {
        let run = demo_run();
        let requested = vec!["roa".to_string(), "leverage".to_string()];
        assert_eq!(model_features(&run, &requested).unwrap(), requested);
    }
}
