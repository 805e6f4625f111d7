//! Sensitivity of the pooled model to winsorization level and feature subset.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{FeatureCategory, ModelArtifact};
use crate::error::FitError;
use crate::features::{FeatureEngineer, FeatureTable, category_features, check_level};
use crate::fit::fit_pooled_ols;

pub const DEFAULT_ROBUST_LEVELS: [f64; 3] = [0.005, 0.01, 0.025];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSubset {
    pub name: String,
    pub features: Vec<String>,
}

/// `accounting_only`, `market_only` and `full` restricted to `features`.
pub fn default_subsets(features: &[String], rolling_window: usize) -> Vec<FeatureSubset> {
    let within = |category: FeatureCategory| -> Vec<String> {
        let members = category_features(category, rolling_window);
        features.iter().filter(|f| members.contains(f)).cloned().collect()
    };
    vec![
        FeatureSubset {
            name: "accounting_only".to_string(),
            features: within(FeatureCategory::Accounting),
        },
        FeatureSubset {
            name: "market_only".to_string(),
            features: within(FeatureCategory::Market),
        },
        FeatureSubset {
            name: "full".to_string(),
            features: features.to_vec(),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessConfig {
    pub winsorize_levels: Vec<f64>,
    pub subsets: Vec<FeatureSubset>,
}

/// One configuration. Every requested configuration gets an entry; a failed
/// fit carries `error` and no fit statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessEntry {
    pub label: String,
    pub winsorize_level: f64,
    pub features: Vec<String>,
    pub n_obs: Option<usize>,
    pub r_squared: Option<f64>,
    pub aic: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessReport {
    pub target: String,
    pub winsorization: Vec<RobustnessEntry>,
    pub subsets: Vec<RobustnessEntry>,
}

/// Refit pooled OLS once per winsorization level (re-winsorizing the
/// pre-winsorization features) and once per feature subset (at the
/// engineer's own level).
pub fn robustness_sweep(
    engineer: &FeatureEngineer,
    features: &FeatureTable,
    raw_target: &str,
    model_features: &[String],
    config: &RobustnessConfig,
) -> Result<RobustnessReport, FitError> {
    let target = features.target.clone().ok_or_else(|| FitError::MissingInput {
        column: raw_target.to_string(),
    })?;

    let winsorization: Vec<RobustnessEntry> = config
        .winsorize_levels
        .par_iter()
        .map(|&level| {
            let label = format!("winsorize_{:.1}%", level * 100.0);
            if let Err(err) = check_level(level) {
                return entry(label, level, model_features, Err(err));
            }
            let (table, log_target) = engineer.finish(&features.unwinsorized, level, Some(raw_target));
            let result = match log_target {
                Some(t) => fit_pooled_ols(&table, &t, model_features),
                None => Err(FitError::MissingInput {
                    column: raw_target.to_string(),
                }),
            };
            entry(label, level, model_features, result)
        })
        .collect();

    let level = engineer.winsorize_level();
    let subsets: Vec<RobustnessEntry> = config
        .subsets
        .par_iter()
        .map(|subset| {
            let result = if subset.features.is_empty() {
                Err(FitError::InvalidConfig(format!("subset '{}' has no features", subset.name)))
            } else {
                fit_pooled_ols(&features.table, &target, &subset.features)
            };
            entry(subset.name.clone(), level, &subset.features, result)
        })
        .collect();

    for e in winsorization.iter().chain(&subsets) {
        if let Some(err) = &e.error {
            warn!(config = %e.label, error = %err, "robustness configuration failed");
        }
    }
    info!(
        levels = winsorization.len(),
        subsets = subsets.len(),
        "robustness sweep finished"
    );

    Ok(RobustnessReport {
        target,
        winsorization,
        subsets,
    })
}

fn entry(
    label: String,
    level: f64,
    features: &[String],
    result: Result<ModelArtifact, FitError>,
) -> RobustnessEntry {
    match result {
        Ok(model) => RobustnessEntry {
            label,
            winsorize_level: level,
            features: features.to_vec(),
            n_obs: Some(model.stats.n_obs),
            r_squared: Some(model.stats.r_squared),
            aic: model.stats.aic,
            error: None,
        },
        Err(err) => RobustnessEntry {
            label,
            winsorize_level: level,
            features: features.to_vec(),
            n_obs: None,
            r_squared: None,
            aic: None,
            error: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;
    use crate::fit::test_data::names;

    fn engineered() -> (FeatureEngineer, FeatureTable) {
        let entities: Vec<String> = (0..10).map(|i| format!("E{i}")).collect();
        let refs: Vec<&str> = entities.iter().map(String::as_str).collect();
        let mut p = quarterly_panel(&refs, 8);
        let n = p.len();
        let assets: Vec<Option<f64>> = (0..n).map(|i| Some(100.0 + (i * 13 % 17) as f64)).collect();
        let income: Vec<Option<f64>> = (0..n).map(|i| Some((i * 7 % 11) as f64 - 3.0)).collect();
        let debt: Vec<Option<f64>> = (0..n).map(|i| Some(20.0 + (i * 5 % 19) as f64)).collect();
        let spread: Vec<Option<f64>> = (0..n)
            .map(|i| {
                let roa = income[i].unwrap() / assets[i].unwrap() * 100.0;
                let lev = debt[i].unwrap() / assets[i].unwrap();
                Some((4.0 - 0.05 * roa + 2.0 * lev + (i % 3) as f64 * 0.01).exp())
            })
            .collect();
        p.insert_numeric("total_assets", assets).unwrap();
        p.insert_numeric("net_income", income).unwrap();
        p.insert_numeric("total_debt", debt).unwrap();
        p.insert_numeric("cds_spread", spread).unwrap();

        let engineer = FeatureEngineer::new(0.01).unwrap();
        let table = engineer.engineer(&p, Some("cds_spread"));
        (engineer, table)
    }

    #[test]
    fn every_requested_configuration_is_reported() {
        let (engineer, table) = engineered();
        let features = names(&["roa", "leverage"]);
        let config = RobustnessConfig {
            winsorize_levels: vec![0.005, 0.01, 0.025, 0.7],
            subsets: default_subsets(&features, 4),
        };
        let report = robustness_sweep(&engineer, &table, "cds_spread", &features, &config).unwrap();

        assert_eq!(report.winsorization.len(), 4);
        assert!(report.winsorization[..3].iter().all(|e| e.r_squared.is_some()));
        assert!(report.winsorization[3].error.is_some());

        let labels: Vec<_> = report.subsets.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["accounting_only", "market_only", "full"]);
        assert!(report.subsets[0].r_squared.is_some());
        // neither requested feature is a market feature
        assert!(report.subsets[1].r_squared.is_none());
        assert!(report.subsets[1].error.is_some());
    }

    #[test]
    fn missing_target_is_an_error() {
        let (engineer, mut table) = engineered();
        table.target = None;
        let config = RobustnessConfig {
            winsorize_levels: vec![0.01],
            subsets: Vec::new(),
        };
        assert!(robustness_sweep(&engineer, &table, "cds_spread", &names(&["roa"]), &config).is_err());
    }
}
