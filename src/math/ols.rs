//! Ordinary least squares and its covariance estimators.
//!
//! Every estimator in this crate reduces to solving
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! on a dense design matrix with a handful of columns. The pieces here are:
//!
//! - rank screening (`independent_columns`) so collinear columns are dropped
//!   explicitly instead of producing an ill-conditioned solution
//! - the solve itself (SVD, with `(XᵀX)⁻¹` from a Cholesky factorization)
//! - HC3 and cluster-robust sandwich covariances

use nalgebra::{DMatrix, DVector};

/// Relative residual-norm threshold below which a column is treated as a
/// linear combination of the columns before it.
pub const COLLINEARITY_TOL: f64 = 1e-8;

/// Solve a least squares problem using SVD.
///
/// Pooled, fixed-effects and per-period Fama–MacBeth designs reach this only
/// after `independent_columns` has screened them, so the looser tolerances
/// matter only for nearly collinear columns that passed the 1e-8 screen
/// (e.g. a rolling mean and its source over short histories).
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Indices of a maximal set of linearly independent columns, scanning left to
/// right (earlier columns win).
///
/// Uses modified Gram–Schmidt with one re-orthogonalization pass. A column is
/// kept when the norm of its component orthogonal to the kept columns exceeds
/// `tol` times its own norm. All-zero columns are never kept.
pub fn independent_columns(x: &DMatrix<f64>, tol: f64) -> Vec<usize> {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut keep = Vec::new();

    for j in 0..x.ncols() {
        let mut v = x.column(j).clone_owned();
        let norm0 = v.norm();
        if !(norm0.is_finite() && norm0 > 0.0) {
            continue;
        }
        for _ in 0..2 {
            for q in &basis {
                let proj = q.dot(&v);
                v.axpy(-proj, q, 1.0);
            }
        }
        let norm = v.norm();
        if norm > tol * norm0 {
            basis.push(v / norm);
            keep.push(j);
        }
    }

    keep
}

/// Least-squares solution plus the quantities every covariance estimator needs.
#[derive(Debug, Clone)]
pub struct OlsSolution {
    pub beta: DVector<f64>,
    pub xtx_inv: DMatrix<f64>,
    pub fitted: DVector<f64>,
    pub residuals: DVector<f64>,
    pub ssr: f64,
}

/// Fit `y = Xβ + e`. `X` must have full column rank (screen it with
/// `independent_columns` first); returns `None` when it does not.
pub fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<OlsSolution> {
    if x.nrows() != y.len() || x.nrows() < x.ncols() || x.ncols() == 0 {
        return None;
    }

    let xtx = x.tr_mul(x);
    let xtx_inv = xtx.cholesky()?.inverse();
    if xtx_inv.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let beta = solve_least_squares(x, y)?;
    let fitted = x * &beta;
    let residuals = y - &fitted;
    let ssr = residuals.norm_squared();
    if !ssr.is_finite() {
        return None;
    }

    Some(OlsSolution {
        beta,
        xtx_inv,
        fitted,
        residuals,
        ssr,
    })
}

/// MacKinnon–White HC3 covariance:
/// `(XᵀX)⁻¹ Σ x_i x_iᵀ e_i² / (1 - h_ii)² (XᵀX)⁻¹`.
///
/// Rows with leverage `h_ii ≈ 1` have (numerically) zero residual and are left
/// out of the meat matrix.
pub fn hc3_covariance(x: &DMatrix<f64>, sol: &OlsSolution) -> DMatrix<f64> {
    let k = x.ncols();
    let mut meat = DMatrix::<f64>::zeros(k, k);

    for i in 0..x.nrows() {
        let xi = x.row(i).transpose();
        let h = (xi.transpose() * &sol.xtx_inv * &xi)[(0, 0)];
        let denom = 1.0 - h;
        if denom <= 1e-10 {
            continue;
        }
        let e = sol.residuals[i];
        let w = (e * e) / (denom * denom);
        meat += &xi * xi.transpose() * w;
    }

    &sol.xtx_inv * meat * &sol.xtx_inv
}

/// One-way cluster-robust covariance with the small-sample factor
/// `G/(G-1) · (n-1)/(n-k)`.
///
/// `clusters[i]` is the cluster id of row `i` (dense ids `0..G`). Returns
/// `None` with fewer than two clusters.
pub fn cluster_covariance(
    x: &DMatrix<f64>,
    sol: &OlsSolution,
    clusters: &[usize],
    n_params: usize,
) -> Option<DMatrix<f64>> {
    let n = x.nrows();
    let k = x.ncols();
    let g = clusters.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    if g < 2 || clusters.len() != n || n <= n_params {
        return None;
    }

    let mut scores = vec![DVector::<f64>::zeros(k); g];
    for i in 0..n {
        let xi = x.row(i).transpose();
        scores[clusters[i]].axpy(sol.residuals[i], &xi, 1.0);
    }

    let mut meat = DMatrix::<f64>::zeros(k, k);
    for s in &scores {
        meat += s * s.transpose();
    }

    let g_f = g as f64;
    let factor = (g_f / (g_f - 1.0)) * ((n as f64 - 1.0) / (n as f64 - n_params as f64));
    Some(&sol.xtx_inv * meat * &sol.xtx_inv * factor)
}

/// Standard errors from a covariance matrix (missing for non-positive or
/// non-finite variances).
pub fn standard_errors(cov: &DMatrix<f64>) -> Vec<Option<f64>> {
    (0..cov.nrows())
        .map(|i| {
            let v = cov[(i, i)];
            (v.is_finite() && v >= 0.0).then(|| v.sqrt())
        })
        .collect()
}
