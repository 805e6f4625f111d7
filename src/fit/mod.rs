//! Model Fitter.
//!
//! Three estimators share one entry signature (panel, target column, feature
//! columns) and one output shape ([`ModelArtifact`]):
//!
//! - `pooled_ols`: OLS with intercept, HC3 standard errors
//! - `panel_fe`: entity fixed effects (within transform), entity-clustered SEs
//! - `fama_macbeth`: averaged per-period cross-sectional slopes
//!
//! Rows with a missing target or feature are left out of the regression
//! sample; the input table is never modified.

pub mod fama_macbeth;
pub mod panel_fe;
pub mod pooled;
pub mod sample;

pub use fama_macbeth::*;
pub use panel_fe::*;
pub use pooled::*;
pub use sample::*;

use nalgebra::DVector;

use crate::domain::{Coefficient, EstimatorKind, FitStats, ModelArtifact, Panel, Significance};
use crate::error::FitError;
use crate::math::{
    adjusted_r_squared, gaussian_log_likelihood, information_criteria, normal_two_sided_p,
    student_t_two_sided_p,
};

/// Fit `kind` on `panel`.
pub fn fit_model(
    kind: EstimatorKind,
    panel: &Panel,
    target: &str,
    features: &[String],
) -> Result<ModelArtifact, FitError> {
    match kind {
        EstimatorKind::PooledOls => fit_pooled_ols(panel, target, features),
        EstimatorKind::PanelFe => fit_panel_fe(panel, target, features),
        EstimatorKind::FamaMacBeth => fit_fama_macbeth(panel, target, features),
    }
}

/// Reference distribution for coefficient t-tests.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reference {
    Normal,
    StudentT(f64),
}

pub(crate) fn coefficient(name: &str, estimate: f64, std_error: Option<f64>, reference: Reference) -> Coefficient {
    let t_statistic = std_error.filter(|se| *se > 0.0).map(|se| estimate / se);
    let p_value = t_statistic.and_then(|t| match reference {
        Reference::Normal => normal_two_sided_p(t),
        Reference::StudentT(dof) => student_t_two_sided_p(t, dof),
    });
    Coefficient {
        name: name.to_string(),
        estimate,
        std_error,
        t_statistic,
        p_value,
        significance: Significance::from_p_value(p_value),
    }
}

/// Goodness of fit for `y` against `fitted`.
///
/// `tss` is passed in so the within estimator can report within R².
/// `n_params` counts every estimated parameter.
pub(crate) fn fit_stats(
    y: &DVector<f64>,
    fitted: &DVector<f64>,
    tss: f64,
    n_params: usize,
    with_likelihood: bool,
) -> FitStats {
    let n = y.len();
    let residuals = y - fitted;
    let ssr = residuals.norm_squared();
    let r_squared = if tss > 0.0 { 1.0 - ssr / tss } else { 0.0 };
    let nf = n.max(1) as f64;

    let llf = with_likelihood
        .then(|| gaussian_log_likelihood(ssr, n))
        .flatten();
    let (aic, bic) = match llf {
        Some(llf) => {
            let (aic, bic) = information_criteria(llf, n, n_params);
            (Some(aic), Some(bic))
        }
        None => (None, None),
    };

    FitStats {
        n_obs: n,
        n_params,
        df_resid: n as f64 - n_params as f64,
        r_squared,
        adj_r_squared: adjusted_r_squared(r_squared, n, n_params).unwrap_or(r_squared),
        rmse: (ssr / nf).sqrt(),
        mae: residuals.iter().map(|r| r.abs()).sum::<f64>() / nf,
        mean_residual: residuals.sum() / nf,
        log_likelihood: llf,
        aic,
        bic,
    }
}

/// Centered total sum of squares.
pub(crate) fn centered_tss(y: &DVector<f64>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let m = y.mean();
    y.iter().map(|v| (v - m) * (v - m)).sum()
}

pub(crate) fn require_obs(context: &str, n: usize, k: usize) -> Result<(), FitError> {
    if n < k + 2 {
        return Err(FitError::InsufficientData {
            context: context.to_string(),
            needed: k + 2,
            available: n,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_data {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    use crate::domain::Panel;
    use crate::domain::panel::test_support::quarterly_panel;

    /// `y = 1 + 2·x1 − 0.5·x2 + entity effect + noise` on `entities × periods`.
    pub fn linear_panel(entities: usize, periods: usize, effects: bool, seed: u64) -> Panel {
        let names: Vec<String> = (0..entities).map(|i| format!("E{i:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut p = quarterly_panel(&refs, periods);

        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 0.1).unwrap();
        let unit = Normal::new(0.0, 1.0).unwrap();

        let mut x1 = Vec::new();
        let mut x2 = Vec::new();
        let mut y = Vec::new();
        for e in 0..entities {
            let alpha = if effects { e as f64 * 0.3 } else { 0.0 };
            for _ in 0..periods {
                let a: f64 = unit.sample(&mut rng);
                let b: f64 = unit.sample(&mut rng);
                x1.push(Some(a));
                x2.push(Some(b));
                y.push(Some(1.0 + alpha + 2.0 * a - 0.5 * b + noise.sample(&mut rng)));
            }
        }
        p.insert_numeric("x1", x1).unwrap();
        p.insert_numeric("x2", x2).unwrap();
        p.insert_numeric("y", y).unwrap();
        p
    }

    pub fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_data::*;
    use super::*;

    #[test]
    fn dispatch_reports_estimator_kind() {
        let p = linear_panel(12, 8, false, 7);
        for kind in EstimatorKind::ALL {
            let a = fit_model(kind, &p, "y", &names(&["x1", "x2"])).unwrap();
            assert_eq!(a.estimator, kind);
            let slope = a.coefficient("x1").unwrap().estimate;
            assert!((slope - 2.0).abs() < 0.05, "{kind}: {slope}");
        }
    }

    #[test]
    fn t_statistic_needs_positive_se() {
        let c = coefficient("x", 1.0, Some(0.0), Reference::Normal);
        assert_eq!(c.t_statistic, None);
        assert_eq!(c.significance.marker(), "");
    }
}
