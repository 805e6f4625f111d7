//! Fama–MacBeth two-pass regression.
//!
//! For each period with enough observations, fit a cross-sectional OLS with
//! intercept. The estimate of each coefficient is the mean of its per-period
//! values; its standard error is their sample standard deviation over
//! `√T`, tested against Student-t with `T − 1` degrees of freedom.

use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{
    CovarianceKind, EstimatorKind, FamaMacBethDetail, ModelArtifact, Panel, PeriodFit,
    ResidualDiagnostics,
};
use crate::error::FitError;
use crate::fit::{Reference, RegressionSample, centered_tss, coefficient, fit_stats, require_obs, with_intercept};
use crate::math::{COLLINEARITY_TOL, independent_columns, mean, ols, std_dev};

/// Absolute floor on observations in one cross-section.
pub const MIN_PERIOD_OBS: usize = 10;

/// Cross-sections needed to form a standard error.
pub const MIN_PERIODS: usize = 2;

pub fn fit_fama_macbeth(panel: &Panel, target: &str, features: &[String]) -> Result<ModelArtifact, FitError> {
    let sample = RegressionSample::extract(panel, target, features)?;
    let n = sample.len();
    let k = features.len();
    require_obs("Fama-MacBeth", n, k)?;

    let min_obs = (k + 1).max(MIN_PERIOD_OBS);
    let periods: Vec<_> = sample.periods().into_iter().collect();
    let total_periods = periods.len();

    let fits: Vec<PeriodFit> = periods
        .par_iter()
        .filter_map(|(time, positions)| {
            if positions.len() < min_obs {
                debug!(%time, n_obs = positions.len(), min_obs, "skipping thin cross-section");
                return None;
            }
            let x = with_intercept(&sample.x.select_rows(positions));
            if independent_columns(&x, COLLINEARITY_TOL).len() < x.ncols() {
                debug!(%time, "skipping rank-deficient cross-section");
                return None;
            }
            let y = DVector::from_iterator(positions.len(), positions.iter().map(|&p| sample.y[p]));
            let Some(sol) = ols(&x, &y) else {
                debug!(%time, "skipping failed cross-section fit");
                return None;
            };
            let tss = centered_tss(&y);
            Some(PeriodFit {
                time: *time,
                n_obs: positions.len(),
                r_squared: if tss > 0.0 { 1.0 - sol.ssr / tss } else { 0.0 },
                coefficients: sol.beta.iter().copied().collect(),
            })
        })
        .collect();

    let t = fits.len();
    if t < MIN_PERIODS {
        return Err(FitError::InsufficientData {
            context: format!("Fama-MacBeth cross-sections with at least {min_obs} observations"),
            needed: MIN_PERIODS,
            available: t,
        });
    }
    let t_dof = (t - 1) as f64;

    let names: Vec<&str> = std::iter::once("const")
        .chain(sample.features.iter().map(String::as_str))
        .collect();
    let mut coefs = names.iter().enumerate().map(|(j, name)| {
        let series: Vec<f64> = fits.iter().map(|f| f.coefficients[j]).collect();
        let avg = mean(&series).unwrap_or(f64::NAN);
        let se = std_dev(&series, 1).map(|sd| sd / (t as f64).sqrt());
        coefficient(name, avg, se, Reference::StudentT(t_dof))
    });
    let intercept = coefs.next();
    let coefficients: Vec<_> = coefs.collect();

    let beta = DVector::from_iterator(
        k + 1,
        intercept
            .iter()
            .chain(&coefficients)
            .map(|c| c.estimate),
    );
    let fitted = sample.design_with_intercept() * beta;
    let mut stats = fit_stats(&sample.y, &fitted, centered_tss(&sample.y), k + 1, false);
    stats.df_resid = t_dof;

    info!(
        n_obs = n,
        periods_used = t,
        periods_skipped = total_periods - t,
        "fitted Fama-MacBeth"
    );

    Ok(ModelArtifact {
        estimator: EstimatorKind::FamaMacBeth,
        target: sample.target.clone(),
        requested_features: sample.features.clone(),
        intercept,
        coefficients,
        dropped: Vec::new(),
        covariance: CovarianceKind::FamaMacBeth,
        stats,
        diagnostics: ResidualDiagnostics::default(),
        entity_effects: None,
        fama_macbeth: Some(FamaMacBethDetail {
            periods_used: t,
            periods_skipped: total_periods - t,
            t_dof,
            periods: fits,
        }),
        sample_rows: sample.rows.clone(),
        residuals: (0..n).map(|i| sample.y[i] - fitted[i]).collect(),
        fitted: fitted.iter().copied().collect(),
    })
}
