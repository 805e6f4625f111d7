//! Entity fixed effects via the within transform, with entity-clustered
//! standard errors.
//!
//! Each entity's mean is subtracted from the target and every feature; OLS on
//! the demeaned data (no intercept) gives the slopes. Entity effects are
//! recovered as `α_i = ȳ_i − x̄_i β`. A feature that is constant within every
//! entity demeans to zero and is dropped as absorbed by the effects.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use tracing::{info, warn};

use crate::domain::{CovarianceKind, DroppedColumn, EstimatorKind, ModelArtifact, Panel};
use crate::error::FitError;
use crate::fit::{COLLINEAR_REASON, Reference, RegressionSample, coefficient, fit_stats, require_obs, with_intercept};
use crate::math::{COLLINEARITY_TOL, cluster_covariance, independent_columns, ols, standard_errors};
use crate::validate::residual_diagnostics;

pub const ABSORBED_REASON: &str = "constant within every entity (absorbed by entity effects)";

pub fn fit_panel_fe(panel: &Panel, target: &str, features: &[String]) -> Result<ModelArtifact, FitError> {
    let sample = RegressionSample::extract(panel, target, features)?;
    let n = sample.len();
    let k = features.len();
    require_obs("panel fixed effects", n, k)?;

    let (groups, names) = sample.entity_ids();
    let g = names.len();

    let y_within = demean(&sample.y, &groups, g);
    let x_within = if k == 0 {
        DMatrix::zeros(n, 0)
    } else {
        let columns: Vec<DVector<f64>> = (0..k)
            .map(|j| demean(&sample.x.column(j).clone_owned(), &groups, g))
            .collect();
        DMatrix::from_columns(&columns)
    };

    let mut dropped = Vec::new();
    let mut candidates = Vec::new();
    for j in 0..k {
        let raw_norm = sample.x.column(j).norm();
        let within_norm = x_within.column(j).norm();
        if within_norm <= COLLINEARITY_TOL * raw_norm.max(1.0) {
            warn!(feature = %sample.features[j], "dropping feature absorbed by entity effects");
            dropped.push(DroppedColumn {
                name: sample.features[j].clone(),
                reason: ABSORBED_REASON.to_string(),
            });
        } else {
            candidates.push(j);
        }
    }

    let screened = independent_columns(&x_within.select_columns(&candidates), COLLINEARITY_TOL);
    let keep: Vec<usize> = screened.iter().map(|&c| candidates[c]).collect();
    for &j in &candidates {
        if !keep.contains(&j) {
            warn!(feature = %sample.features[j], "dropping collinear column from panel FE");
            dropped.push(DroppedColumn {
                name: sample.features[j].clone(),
                reason: COLLINEAR_REASON.to_string(),
            });
        }
    }
    if keep.is_empty() {
        return Err(FitError::SingularFit {
            context: "panel fixed effects: no feature varies within entities".to_string(),
        });
    }

    let n_params = g + keep.len();
    if n <= n_params {
        return Err(FitError::InsufficientData {
            context: "panel fixed effects (entity effects + slopes)".to_string(),
            needed: n_params + 1,
            available: n,
        });
    }

    let xw = x_within.select_columns(&keep);
    let sol = ols(&xw, &y_within).ok_or_else(|| FitError::SingularFit {
        context: "panel fixed effects normal equations".to_string(),
    })?;

    let cov = cluster_covariance(&xw, &sol, &groups, keep.len()).ok_or_else(|| FitError::InsufficientData {
        context: "entity-clustered covariance (clusters)".to_string(),
        needed: 2,
        available: g,
    })?;
    let se = standard_errors(&cov);
    let coefficients: Vec<_> = keep
        .iter()
        .zip(sol.beta.iter())
        .zip(&se)
        .map(|((&j, &b), se)| coefficient(&sample.features[j], b, *se, Reference::Normal))
        .collect();

    let x_kept = sample.x.select_columns(&keep);
    let slope_part = &x_kept * &sol.beta;
    let mut effect = vec![0.0; g];
    let mut count = vec![0usize; g];
    for i in 0..n {
        effect[groups[i]] += sample.y[i] - slope_part[i];
        count[groups[i]] += 1;
    }
    for (e, c) in effect.iter_mut().zip(&count) {
        *e /= *c as f64;
    }
    let fitted = DVector::from_iterator(n, (0..n).map(|i| effect[groups[i]] + slope_part[i]));
    let entity_effects: BTreeMap<String, f64> = names.into_iter().zip(effect).collect();

    // Within R²: fit of the demeaned regression.
    let tss_within = y_within.norm_squared();
    let mut stats = fit_stats(&sample.y, &fitted, tss_within, n_params, true);
    stats.df_resid = (n - n_params) as f64;

    let diagnostics = residual_diagnostics(&with_intercept(&x_kept), &sol.residuals, &groups);

    info!(
        n_obs = n,
        entities = g,
        features = coefficients.len(),
        dropped = dropped.len(),
        within_r_squared = stats.r_squared,
        "fitted panel fixed effects"
    );

    Ok(ModelArtifact {
        estimator: EstimatorKind::PanelFe,
        target: sample.target.clone(),
        requested_features: sample.features.clone(),
        intercept: None,
        coefficients,
        dropped,
        covariance: CovarianceKind::ClusteredEntity,
        stats,
        diagnostics,
        entity_effects: Some(entity_effects),
        fama_macbeth: None,
        sample_rows: sample.rows.clone(),
        residuals: (0..n).map(|i| sample.y[i] - fitted[i]).collect(),
        fitted: fitted.iter().copied().collect(),
    })
}

fn demean(v: &DVector<f64>, groups: &[usize], g: usize) -> DVector<f64> {
    let mut sum = vec![0.0; g];
    let mut count = vec![0usize; g];
    for (i, &grp) in groups.iter().enumerate() {
        sum[grp] += v[i];
        count[grp] += 1;
    }
    DVector::from_iterator(
        v.len(),
        groups.iter().enumerate().map(|(i, &grp)| v[i] - sum[grp] / count[grp] as f64),
    )
}
