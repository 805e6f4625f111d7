//! Shared run-level enums.
//!
//! These are kept small and serializable so they can appear both in
//! configuration (environment / CLI) and in exported reports.

use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which estimator to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Entity fixed effects, standard errors clustered by entity.
    #[value(name = "panel_fe", alias = "panel-fe")]
    PanelFe,
    /// Pooled OLS with HC3 standard errors.
    #[value(name = "pooled_ols", alias = "pooled-ols")]
    PooledOls,
    /// Time-series average of per-period cross-sectional OLS slopes.
    #[value(name = "fama_macbeth", alias = "fama-macbeth")]
    FamaMacBeth,
}

impl EstimatorKind {
    pub const ALL: [EstimatorKind; 3] = [
        EstimatorKind::PanelFe,
        EstimatorKind::PooledOls,
        EstimatorKind::FamaMacBeth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EstimatorKind::PanelFe => "panel_fe",
            EstimatorKind::PooledOls => "pooled_ols",
            EstimatorKind::FamaMacBeth => "fama_macbeth",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            EstimatorKind::PanelFe => "Panel fixed effects (entity)",
            EstimatorKind::PooledOls => "Pooled OLS (HC3)",
            EstimatorKind::FamaMacBeth => "Fama-MacBeth",
        }
    }
}

impl FromStr for EstimatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "panel_fe" => Ok(EstimatorKind::PanelFe),
            "pooled_ols" => Ok(EstimatorKind::PooledOls),
            "fama_macbeth" => Ok(EstimatorKind::FamaMacBeth),
            other => Err(format!(
                "unknown estimator '{other}' (expected panel_fe, pooled_ols or fama_macbeth)"
            )),
        }
    }
}

impl std::fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the panel preparer does with fields that stay undefined after
/// structural back-fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImputationPolicy {
    /// Leave them missing; estimators drop incomplete rows.
    Missing,
    /// Substitute the documented neutral defaults and flag the rows.
    Defaults,
}

impl FromStr for ImputationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "missing" | "none" => Ok(ImputationPolicy::Missing),
            "defaults" | "default" => Ok(ImputationPolicy::Defaults),
            other => Err(format!("unknown imputation policy '{other}' (expected missing or defaults)")),
        }
    }
}

/// Named groups of engineered features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Accounting,
    Market,
    Macroeconomic,
    Interactions,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 4] = [
        FeatureCategory::Accounting,
        FeatureCategory::Market,
        FeatureCategory::Macroeconomic,
        FeatureCategory::Interactions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureCategory::Accounting => "accounting",
            FeatureCategory::Market => "market",
            FeatureCategory::Macroeconomic => "macroeconomic",
            FeatureCategory::Interactions => "interactions",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimator_parses_both_spellings() {
        assert_eq!("panel_fe".parse::<EstimatorKind>().unwrap(), EstimatorKind::PanelFe);
        assert_eq!("Fama-MacBeth".parse::<EstimatorKind>().unwrap(), EstimatorKind::FamaMacBeth);
        assert!("ridge".parse::<EstimatorKind>().is_err());
    }

    #[test]
    fn estimator_serializes_snake_case() {
        let json = serde_json::to_string(&EstimatorKind::PooledOls).unwrap();
        assert_eq!(json, "\"pooled_ols\"");
    }
}
