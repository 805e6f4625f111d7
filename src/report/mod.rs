//! Reporting: structured model summaries and formatted terminal output.

pub mod format;

pub use format::*;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Coefficient, CovarianceKind, DroppedColumn, EstimatorKind, FitStats, ImportanceRow, ModelArtifact,
    ResidualDiagnostics,
};
use crate::math::mean;

/// Serializable summary of one fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub estimator: EstimatorKind,
    pub display_name: String,
    pub target: String,
    pub covariance: CovarianceKind,
    pub stats: FitStats,
    pub intercept: Option<Coefficient>,
    pub importance: Vec<ImportanceRow>,
    pub dropped: Vec<DroppedColumn>,
    pub diagnostics: ResidualDiagnostics,
    pub entity_effects: Option<usize>,
    pub periods_used: Option<usize>,
    pub periods_skipped: Option<usize>,
    pub t_dof: Option<f64>,
    pub mean_period_r_squared: Option<f64>,
}

pub fn model_report(model: &ModelArtifact) -> ModelReport {
    let fm = model.fama_macbeth.as_ref();
    let period_r2: Vec<f64> = fm
        .map(|d| d.periods.iter().map(|p| p.r_squared).collect())
        .unwrap_or_default();
    ModelReport {
        estimator: model.estimator,
        display_name: model.estimator.display_name().to_string(),
        target: model.target.clone(),
        covariance: model.covariance,
        stats: model.stats.clone(),
        intercept: model.intercept.clone(),
        importance: model.feature_importance(),
        dropped: model.dropped.clone(),
        diagnostics: model.diagnostics.clone(),
        entity_effects: model.entity_effects.as_ref().map(|e| e.len()),
        periods_used: fm.map(|d| d.periods_used),
        periods_skipped: fm.map(|d| d.periods_skipped),
        t_dof: fm.map(|d| d.t_dof),
        mean_period_r_squared: mean(&period_r2),
    }
}
