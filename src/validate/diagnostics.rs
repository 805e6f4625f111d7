//! Residual diagnostics: Durbin–Watson, Breusch–Pagan (Koenker), Jarque–Bera.
//!
//! Each test is computed independently; one that cannot be computed is left
//! out of the result and never fails the fit it belongs to.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{ResidualDiagnostics, TestStatistic};
use crate::fit::centered_tss;
use crate::math::{chi_squared_sf, ols};

/// Run every test. `design` is the regression design including its constant
/// column; `groups[i]` is the entity of residual `i` (residuals ordered by
/// entity, then time).
pub fn residual_diagnostics(design: &DMatrix<f64>, residuals: &DVector<f64>, groups: &[usize]) -> ResidualDiagnostics {
    let out = ResidualDiagnostics {
        durbin_watson: durbin_watson(residuals.as_slice(), groups),
        breusch_pagan: breusch_pagan(design, residuals),
        jarque_bera: jarque_bera(residuals.as_slice()),
    };
    if out.durbin_watson.is_none() {
        debug!("Durbin-Watson not computable; omitted");
    }
    if out.breusch_pagan.is_none() {
        debug!("Breusch-Pagan not computable; omitted");
    }
    if out.jarque_bera.is_none() {
        debug!("Jarque-Bera not computable; omitted");
    }
    out
}

/// `Σ (e_t − e_{t−1})² / Σ e_t²`, differencing only within an entity's own
/// time series.
pub fn durbin_watson(residuals: &[f64], groups: &[usize]) -> Option<f64> {
    if residuals.len() != groups.len() || residuals.len() < 2 {
        return None;
    }
    let denom: f64 = residuals.iter().map(|e| e * e).sum();
    if !(denom > 0.0) {
        return None;
    }

    let mut pairs = 0usize;
    let mut numer = 0.0;
    for i in 1..residuals.len() {
        if groups[i] == groups[i - 1] {
            let d = residuals[i] - residuals[i - 1];
            numer += d * d;
            pairs += 1;
        }
    }
    if pairs == 0 {
        return None;
    }
    let dw = numer / denom;
    dw.is_finite().then_some(dw)
}

/// Koenker's studentized Breusch–Pagan test: `n·R²` of the squared residuals
/// regressed on the design, against χ² with (columns − 1) degrees of freedom.
pub fn breusch_pagan(design: &DMatrix<f64>, residuals: &DVector<f64>) -> Option<TestStatistic> {
    let n = residuals.len();
    let dof = design.ncols().checked_sub(1)?;
    if dof == 0 || design.nrows() != n || n <= design.ncols() {
        return None;
    }

    let e2 = residuals.map(|e| e * e);
    let aux = ols(design, &e2)?;
    let tss = centered_tss(&e2);
    if !(tss > 0.0) {
        return None;
    }
    let r2 = 1.0 - aux.ssr / tss;
    let statistic = n as f64 * r2;
    let p_value = chi_squared_sf(statistic, dof as f64)?;
    Some(TestStatistic {
        statistic,
        p_value,
        dof: dof as f64,
    })
}

/// `n/6 · (S² + (K − 3)²/4)` against χ²(2).
pub fn jarque_bera(residuals: &[f64]) -> Option<TestStatistic> {
    let n = residuals.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let m = residuals.iter().sum::<f64>() / nf;
    let moment = |p: i32| residuals.iter().map(|e| (e - m).powi(p)).sum::<f64>() / nf;
    let m2 = moment(2);
    if !(m2 > 0.0) {
        return None;
    }
    let skew = moment(3) / m2.powf(1.5);
    let kurt = moment(4) / (m2 * m2);
    let statistic = nf / 6.0 * (skew * skew + (kurt - 3.0).powi(2) / 4.0);
    let p_value = chi_squared_sf(statistic, 2.0)?;
    Some(TestStatistic {
        statistic,
        p_value,
        dof: 2.0,
    })
}
