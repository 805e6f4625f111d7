//! Naive distance-to-default (Bharath & Shumway).
//!
//! Given equity value `E`, debt value `F`, annualized equity volatility `σE`
//! (decimal) and prior-year stock return `r`, with horizon `T = 1`:
//!
//! ```text
//! naive_σv  = E/(E+F) · σE + F/(E+F) · (0.05 + 0.25·σE)
//! naive_dtd = [ln((E+F)/F) + r − 0.5·naive_σv²·T] / (naive_σv·√T)
//! ```
//!
//! Both outputs are missing when any input is missing or non-finite, when
//! `E ≤ 0` or `F ≤ 0`, or when `naive_σv` is not strictly positive. Extreme but
//! finite values are returned as-is; winsorization handles them downstream.

use serde::{Deserialize, Serialize};

/// Default horizon in years.
pub const DTD_HORIZON_YEARS: f64 = 1.0;

/// Inputs for one firm-period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DtdInputs {
    pub equity_value: f64,
    pub debt_value: f64,
    pub equity_volatility: f64,
    pub stock_return: f64,
}

/// Outputs for one firm-period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaiveDtd {
    pub sigma_v: f64,
    pub dtd: f64,
}

/// Naive firm volatility `naive_σv`.
pub fn naive_sigma_v(equity_value: f64, debt_value: f64, equity_volatility: f64) -> Option<f64> {
    if !(equity_value.is_finite() && debt_value.is_finite() && equity_volatility.is_finite()) {
        return None;
    }
    if equity_value <= 0.0 || debt_value <= 0.0 {
        return None;
    }
    let v = equity_value + debt_value;
    let sigma_d = 0.05 + 0.25 * equity_volatility;
    let sigma_v = (equity_value / v) * equity_volatility + (debt_value / v) * sigma_d;
    sigma_v.is_finite().then_some(sigma_v)
}

/// Naive distance-to-default with an explicit horizon.
pub fn naive_distance_to_default_with_horizon(inputs: &DtdInputs, horizon: f64) -> Option<NaiveDtd> {
    if !(horizon.is_finite() && horizon > 0.0 && inputs.stock_return.is_finite()) {
        return None;
    }
    let sigma_v = naive_sigma_v(inputs.equity_value, inputs.debt_value, inputs.equity_volatility)?;
    if sigma_v <= 0.0 {
        return None;
    }

    let e = inputs.equity_value;
    let f = inputs.debt_value;
    let numer = ((e + f) / f).ln() + inputs.stock_return - 0.5 * sigma_v * sigma_v * horizon;
    let dtd = numer / (sigma_v * horizon.sqrt());

    dtd.is_finite().then_some(NaiveDtd { sigma_v, dtd })
}

/// Naive distance-to-default over a one-year horizon.
pub fn naive_distance_to_default(inputs: &DtdInputs) -> Option<NaiveDtd> {
    naive_distance_to_default_with_horizon(inputs, DTD_HORIZON_YEARS)
}

/// Row-wise helper for optional inputs.
pub fn naive_dtd_opt(
    equity_value: Option<f64>,
    debt_value: Option<f64>,
    equity_volatility: Option<f64>,
    stock_return: Option<f64>,
) -> Option<NaiveDtd> {
    naive_distance_to_default(&DtdInputs {
        equity_value: equity_value?,
        debt_value: debt_value?,
        equity_volatility: equity_volatility?,
        stock_return: stock_return?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_firm_matches_published_example() {
        let out = naive_distance_to_default(&DtdInputs {
            equity_value: 1_000_000.0,
            debt_value: 300_000.0,
            equity_volatility: 0.30,
            stock_return: 0.08,
        })
        .unwrap();
        assert!((out.sigma_v - 0.2596).abs() < 5e-4, "sigma_v={}", out.sigma_v);
        // [ln(1.3e6/3e5) + 0.08 − 0.5·σv²] / σv = 1.51264 / 0.25962
        assert!((out.dtd - 5.8265).abs() < 1e-3, "dtd={}", out.dtd);
    }

    #[test]
    fn non_positive_firm_values_are_missing() {
        assert!(naive_dtd_opt(Some(0.0), Some(1.0), Some(0.2), Some(0.0)).is_none());
        assert!(naive_dtd_opt(Some(1.0), Some(-5.0), Some(0.2), Some(0.0)).is_none());
        assert!(naive_dtd_opt(Some(1.0), Some(1.0), None, Some(0.0)).is_none());
    }

    #[test]
    fn longer_horizon_scales_denominator() {
        let inputs = DtdInputs {
            equity_value: 2.0,
            debt_value: 1.0,
            equity_volatility: 0.4,
            stock_return: 0.0,
        };
        let one = naive_distance_to_default_with_horizon(&inputs, 1.0).unwrap();
        let four = naive_distance_to_default_with_horizon(&inputs, 4.0).unwrap();
        assert_eq!(one.sigma_v, four.sigma_v);
        assert!(four.dtd < one.dtd);
    }
}
