//! Fitted-model artifacts.
//!
//! A `ModelArtifact` is produced by exactly one estimator call and is never
//! mutated afterwards. It is serializable so an outer layer can ship it as JSON;
//! the per-row residual vectors are kept in memory only.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EstimatorKind, Panel};

/// Significance marker convention shared by every estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    /// p < 0.01
    OnePercent,
    /// p < 0.05
    FivePercent,
    /// p < 0.10
    TenPercent,
    NotSignificant,
}

impl Significance {
    pub fn from_p_value(p: Option<f64>) -> Self {
        match p {
            Some(p) if p < 0.01 => Significance::OnePercent,
            Some(p) if p < 0.05 => Significance::FivePercent,
            Some(p) if p < 0.10 => Significance::TenPercent,
            _ => Significance::NotSignificant,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Significance::OnePercent => "***",
            Significance::FivePercent => "**",
            Significance::TenPercent => "*",
            Significance::NotSignificant => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: Option<f64>,
    pub t_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub significance: Significance,
}

/// Covariance estimator behind the reported standard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceKind {
    Hc3,
    ClusteredEntity,
    FamaMacBeth,
}

/// A requested feature that was excluded from the regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedColumn {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStats {
    pub n_obs: usize,
    /// Estimated parameters, including intercept or entity effects.
    pub n_params: usize,
    pub df_resid: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mean_residual: f64,
    pub log_likelihood: Option<f64>,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
}

/// Statistic + p-value for a residual test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestStatistic {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: f64,
}

/// Residual-based diagnostics. Each entry is `None` when it could not be
/// computed (or the estimator has no pooled residuals).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResidualDiagnostics {
    pub durbin_watson: Option<f64>,
    pub breusch_pagan: Option<TestStatistic>,
    pub jarque_bera: Option<TestStatistic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodFit {
    pub time: NaiveDate,
    pub n_obs: usize,
    pub r_squared: f64,
    /// Intercept first, then one slope per feature (same order as the artifact).
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamaMacBethDetail {
    pub periods_used: usize,
    pub periods_skipped: usize,
    /// Degrees of freedom of the coefficient t-tests (periods used − 1).
    pub t_dof: f64,
    pub periods: Vec<PeriodFit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub estimator: EstimatorKind,
    pub target: String,
    /// Features requested by the caller, before any were dropped.
    pub requested_features: Vec<String>,
    pub intercept: Option<Coefficient>,
    /// Slope coefficients for the features that stayed in the model.
    pub coefficients: Vec<Coefficient>,
    pub dropped: Vec<DroppedColumn>,
    pub covariance: CovarianceKind,
    pub stats: FitStats,
    pub diagnostics: ResidualDiagnostics,
    /// Estimated entity intercepts (panel fixed effects only).
    pub entity_effects: Option<BTreeMap<String, f64>>,
    pub fama_macbeth: Option<FamaMacBethDetail>,

    /// Row indices (into the fitted table) of the regression sample.
    #[serde(skip)]
    pub sample_rows: Vec<usize>,
    #[serde(skip)]
    pub residuals: Vec<f64>,
    #[serde(skip)]
    pub fitted: Vec<f64>,
}

/// One row of the feature-importance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRow {
    pub feature: String,
    pub coefficient: f64,
    pub std_error: Option<f64>,
    pub t_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub significance: Significance,
}

/// Out-of-sample (or in-sample) accuracy of a prediction vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub n_obs: usize,
    pub r_squared: f64,
    pub adj_r_squared: Option<f64>,
    pub rmse: f64,
    pub mae: f64,
    pub mean_residual: f64,
}

impl From<&Coefficient> for ImportanceRow {
    fn from(c: &Coefficient) -> Self {
        Self {
            feature: c.name.clone(),
            coefficient: c.estimate,
            std_error: c.std_error,
            t_statistic: c.t_statistic,
            p_value: c.p_value,
            significance: c.significance,
        }
    }
}

impl ModelArtifact {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Names of the features that carry a coefficient.
    pub fn kept_features(&self) -> Vec<String> {
        self.coefficients.iter().map(|c| c.name.clone()).collect()
    }

    /// Slopes sorted by p-value (missing p-values last); the intercept and
    /// entity effects are not part of the table.
    pub fn feature_importance(&self) -> Vec<ImportanceRow> {
        let mut rows: Vec<ImportanceRow> = self.coefficients.iter().map(ImportanceRow::from).collect();
        rows.sort_by(|a, b| match (a.p_value, b.p_value) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        rows
    }

    /// Predict the target for every row of `panel`.
    ///
    /// A row is missing when any kept feature is missing, or (fixed effects)
    /// when its entity was not in the estimation sample.
    pub fn predict(&self, panel: &Panel) -> Vec<Option<f64>> {
        let columns: Option<Vec<&[Option<f64>]>> = self
            .coefficients
            .iter()
            .map(|c| panel.numeric(&c.name))
            .collect();
        let Some(columns) = columns else {
            return vec![None; panel.len()];
        };

        let base = self.intercept.as_ref().map(|c| c.estimate).unwrap_or(0.0);
        (0..panel.len())
            .map(|i| {
                let mut y = match &self.entity_effects {
                    Some(effects) => *effects.get(&panel.entities()[i])?,
                    None => base,
                };
                for (coef, col) in self.coefficients.iter().zip(&columns) {
                    y += coef.estimate * col[i]?;
                }
                y.is_finite().then_some(y)
            })
            .collect()
    }
}
