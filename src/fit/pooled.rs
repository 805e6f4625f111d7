//! Pooled OLS with HC3 standard errors.

use tracing::{info, warn};

use crate::domain::{CovarianceKind, DroppedColumn, EstimatorKind, ModelArtifact, Panel};
use crate::error::FitError;
use crate::fit::{Reference, RegressionSample, centered_tss, coefficient, fit_stats, require_obs};
use crate::math::{COLLINEARITY_TOL, hc3_covariance, independent_columns, ols, standard_errors};
use crate::validate::residual_diagnostics;

pub const COLLINEAR_REASON: &str = "linear combination of earlier columns";

pub fn fit_pooled_ols(panel: &Panel, target: &str, features: &[String]) -> Result<ModelArtifact, FitError> {
    let sample = RegressionSample::extract(panel, target, features)?;
    fit_pooled_sample(&sample)
}

pub fn fit_pooled_sample(sample: &RegressionSample) -> Result<ModelArtifact, FitError> {
    let n = sample.len();
    require_obs("pooled OLS", n, sample.features.len())?;

    let design = sample.design_with_intercept();
    let keep = independent_columns(&design, COLLINEARITY_TOL);
    if keep.first() != Some(&0) {
        return Err(FitError::SingularFit {
            context: "pooled OLS intercept column".to_string(),
        });
    }

    let dropped: Vec<DroppedColumn> = sample
        .features
        .iter()
        .enumerate()
        .filter(|(j, _)| !keep.contains(&(j + 1)))
        .map(|(_, name)| {
            warn!(feature = %name, "dropping collinear column from pooled OLS");
            DroppedColumn {
                name: name.clone(),
                reason: COLLINEAR_REASON.to_string(),
            }
        })
        .collect();

    let x = design.select_columns(&keep);
    let sol = ols(&x, &sample.y).ok_or_else(|| FitError::SingularFit {
        context: "pooled OLS normal equations".to_string(),
    })?;

    let se = standard_errors(&hc3_covariance(&x, &sol));
    let mut coefs = keep.iter().zip(sol.beta.iter()).zip(&se).map(|((&j, &b), se)| {
        let name = if j == 0 { "const" } else { sample.features[j - 1].as_str() };
        coefficient(name, b, *se, Reference::Normal)
    });
    let intercept = coefs.next();
    let coefficients: Vec<_> = coefs.collect();

    let stats = fit_stats(&sample.y, &sol.fitted, centered_tss(&sample.y), keep.len(), true);
    let (groups, _) = sample.entity_ids();
    let diagnostics = residual_diagnostics(&x, &sol.residuals, &groups);

    info!(
        n_obs = n,
        features = coefficients.len(),
        dropped = dropped.len(),
        r_squared = stats.r_squared,
        "fitted pooled OLS"
    );

    Ok(ModelArtifact {
        estimator: EstimatorKind::PooledOls,
        target: sample.target.clone(),
        requested_features: sample.features.clone(),
        intercept,
        coefficients,
        dropped,
        covariance: CovarianceKind::Hc3,
        stats,
        diagnostics,
        entity_effects: None,
        fama_macbeth: None,
        sample_rows: sample.rows.clone(),
        residuals: sol.residuals.iter().copied().collect(),
        fitted: sol.fitted.iter().copied().collect(),
    })
}
