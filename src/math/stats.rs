//! Summary statistics and reference-distribution tail probabilities.
//!
//! Missing values are always excluded explicitly: callers pass the present
//! values only (see `present`), never NaN placeholders.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

use crate::domain::PerformanceMetrics;

/// The present values of a column.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let n = values.len();
    if n <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (n - ddof) as f64).sqrt())
}

/// Two-sided p-value of `z` under N(0, 1).
pub fn normal_two_sided_p(z: f64) -> Option<f64> {
    if !z.is_finite() {
        return None;
    }
    let dist = Normal::new(0.0, 1.0).ok()?;
    Some((2.0 * dist.sf(z.abs())).clamp(0.0, 1.0))
}

/// Two-sided p-value of `t` under Student-t with `dof` degrees of freedom.
pub fn student_t_two_sided_p(t: f64, dof: f64) -> Option<f64> {
    if !(t.is_finite() && dof > 0.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, dof).ok()?;
    Some((2.0 * dist.sf(t.abs())).clamp(0.0, 1.0))
}

/// Upper-tail probability of `x` under χ²(`dof`).
pub fn chi_squared_sf(x: f64, dof: f64) -> Option<f64> {
    if !(x.is_finite() && dof > 0.0) {
        return None;
    }
    let dist = ChiSquared::new(dof).ok()?;
    Some(dist.sf(x.max(0.0)).clamp(0.0, 1.0))
}

/// Gaussian log-likelihood of an OLS fit with residual sum of squares `ssr`.
pub fn gaussian_log_likelihood(ssr: f64, n: usize) -> Option<f64> {
    if n == 0 || !(ssr > 0.0 && ssr.is_finite()) {
        return None;
    }
    let n = n as f64;
    Some(-0.5 * n * ((2.0 * std::f64::consts::PI).ln() + (ssr / n).ln() + 1.0))
}

/// `(AIC, BIC)` from a log-likelihood and parameter count.
pub fn information_criteria(llf: f64, n: usize, k: usize) -> (f64, f64) {
    let k = k as f64;
    (-2.0 * llf + 2.0 * k, -2.0 * llf + k * (n as f64).ln())
}

/// `1 - (1 - R²)(n - 1)/(n - k)` where `k` counts every estimated parameter.
pub fn adjusted_r_squared(r2: f64, n: usize, k: usize) -> Option<f64> {
    if n <= k {
        return None;
    }
    let adj = 1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - k as f64);
    adj.is_finite().then_some(adj)
}

/// Accuracy of `predicted` against `actual`, skipping pairs where either is
/// missing. `n_params` (when known) enables adjusted R².
pub fn performance_metrics(
    actual: &[Option<f64>],
    predicted: &[Option<f64>],
    n_params: Option<usize>,
) -> Option<PerformanceMetrics> {
    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .zip(predicted)
        .filter_map(|(a, p)| Some(((*a)?, (*p)?)))
        .collect();
    let n = pairs.len();
    if n == 0 {
        return None;
    }

    let y_mean = pairs.iter().map(|(a, _)| a).sum::<f64>() / n as f64;
    let mut ssr = 0.0;
    let mut tss = 0.0;
    let mut abs = 0.0;
    let mut resid_sum = 0.0;
    for (a, p) in &pairs {
        let r = a - p;
        ssr += r * r;
        abs += r.abs();
        resid_sum += r;
        tss += (a - y_mean) * (a - y_mean);
    }

    let r_squared = if tss > 0.0 { 1.0 - ssr / tss } else { 0.0 };
    Some(PerformanceMetrics {
        n_obs: n,
        r_squared,
        adj_r_squared: n_params.and_then(|k| adjusted_r_squared(r_squared, n, k)),
        rmse: (ssr / n as f64).sqrt(),
        mae: abs / n as f64,
        mean_residual: resid_sum / n as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_dev_uses_ddof() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((std_dev(&v, 1).unwrap() - 1.2909944487358056).abs() < 1e-12);
        assert!((std_dev(&v, 0).unwrap() - 1.118033988749895).abs() < 1e-12);
        assert!(std_dev(&[1.0], 1).is_none());
    }

    #[test]
    fn tail_probabilities_match_tables() {
        assert!((normal_two_sided_p(1.959964).unwrap() - 0.05).abs() < 1e-5);
        // t(10) two-sided 5% critical value is 2.228
        assert!((student_t_two_sided_p(2.228139, 10.0).unwrap() - 0.05).abs() < 1e-5);
        // χ²(2) upper 5% critical value is 5.991
        assert!((chi_squared_sf(5.991465, 2.0).unwrap() - 0.05).abs() < 1e-5);
    }

    #[test]
    fn performance_metrics_skip_missing_pairs() {
        let actual = [Some(1.0), Some(2.0), None, Some(3.0)];
        let predicted = [Some(1.0), Some(2.0), Some(9.0), None];
        let m = performance_metrics(&actual, &predicted, None).unwrap();
        assert_eq!(m.n_obs, 2);
        assert!((m.r_squared - 1.0).abs() < 1e-12);
        assert_eq!(m.rmse, 0.0);
    }
}
