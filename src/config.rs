//! Run configuration.
//!
//! Values come from (lowest to highest precedence) the defaults below, the
//! environment (optionally seeded from a `.env` file) and CLI flags.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EstimatorKind, ImputationPolicy};
use crate::error::FitError;
use crate::features::{DEFAULT_ROLLING_WINDOW, DEFAULT_WINSORIZE_LEVEL, check_level};
use crate::validate::{DEFAULT_ROBUST_LEVELS, WalkForwardConfig};

pub const ENV_WINSORIZE_LEVEL: &str = "CDS_WINSORIZE_LEVEL";
pub const ENV_ESTIMATOR: &str = "CDS_ESTIMATOR";
pub const ENV_ROLLING_WINDOW: &str = "CDS_ROLLING_WINDOW";
pub const ENV_TRAIN_YEARS: &str = "CDS_TRAIN_YEARS";
pub const ENV_TEST_YEARS: &str = "CDS_TEST_YEARS";
pub const ENV_IMPUTATION: &str = "CDS_IMPUTATION";
pub const ENV_TARGET: &str = "CDS_TARGET";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub winsorize_level: f64,
    pub estimator: EstimatorKind,
    pub rolling_window: usize,
    pub train_years: u32,
    pub test_years: u32,
    pub step_years: u32,
    pub anchored_walk_forward: bool,
    pub imputation: ImputationPolicy,
    /// Raw spread column; the model target is its log.
    pub target_column: String,
    pub robust_winsorize_levels: Vec<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            winsorize_level: DEFAULT_WINSORIZE_LEVEL,
            estimator: EstimatorKind::PanelFe,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            train_years: 3,
            test_years: 1,
            step_years: 1,
            anchored_walk_forward: false,
            imputation: ImputationPolicy::Missing,
            target_column: "cds_spread".to_string(),
            robust_winsorize_levels: DEFAULT_ROBUST_LEVELS.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by the process environment (after loading `.env`).
    pub fn from_env() -> Result<Self, FitError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Blank values are
    /// ignored; anything else must parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FitError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = get(ENV_WINSORIZE_LEVEL) {
            config.winsorize_level = parse_env(ENV_WINSORIZE_LEVEL, &v)?;
        }
        if let Some(v) = get(ENV_ESTIMATOR) {
            config.estimator = v.parse().map_err(|e: String| invalid(ENV_ESTIMATOR, &v, &e))?;
        }
        if let Some(v) = get(ENV_ROLLING_WINDOW) {
            config.rolling_window = parse_env(ENV_ROLLING_WINDOW, &v)?;
        }
        if let Some(v) = get(ENV_TRAIN_YEARS) {
            config.train_years = parse_env(ENV_TRAIN_YEARS, &v)?;
        }
        if let Some(v) = get(ENV_TEST_YEARS) {
            config.test_years = parse_env(ENV_TEST_YEARS, &v)?;
        }
        if let Some(v) = get(ENV_IMPUTATION) {
            config.imputation = v.parse().map_err(|e: String| invalid(ENV_IMPUTATION, &v, &e))?;
        }
        if let Some(v) = get(ENV_TARGET) {
            config.target_column = v;
        }

        debug!(?config, "configuration from environment");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FitError> {
        check_level(self.winsorize_level)?;
        for &level in &self.robust_winsorize_levels {
            check_level(level)?;
        }
        if self.rolling_window < 2 {
            return Err(FitError::InvalidConfig(format!(
                "rolling window must be at least 2, got {}",
                self.rolling_window
            )));
        }
        if self.target_column.is_empty() {
            return Err(FitError::InvalidConfig("target column must not be empty".to_string()));
        }
        self.walk_forward_config().validate()
    }

    pub fn walk_forward_config(&self) -> WalkForwardConfig {
        WalkForwardConfig {
            train_years: self.train_years,
            test_years: self.test_years,
            step_years: self.step_years,
            anchored: self.anchored_walk_forward,
            ..WalkForwardConfig::default()
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, FitError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(key, value, &e.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> FitError {
    FitError::InvalidConfig(format!("{key}='{value}': {reason}"))
}
