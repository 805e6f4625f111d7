//! Market risk measures: trailing equity return / volatility and the naive
//! distance-to-default.

use crate::domain::{NumericColumn, Panel};
use crate::features::grouped::{RollingStat, pct_change_by_entity, rolling_by_entity};
use crate::features::{AbsentFeature, require};
use crate::models::naive_dtd_opt;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const MARKET_WINDOW: usize = 100;
pub const MARKET_MIN_PERIODS: usize = 50;

/// Inputs of the naive distance-to-default, in formula order.
pub const DTD_INPUTS: [&str; 4] = ["equity_value", "debt_value", "equity_volatility", "stock_return"];

/// Add `daily_return`, `equity_return_100d`, `equity_volatility_100d`,
/// `naive_sigma_v` and `naive_dtd`.
pub fn add_market_features(panel: &Panel, absent: &mut Vec<AbsentFeature>) -> Panel {
    let mut out = panel.clone();

    if let Some(cols) = require(panel, "equity_return_100d", &["close_price"], absent) {
        let daily = pct_change_by_entity(panel, cols[0]);
        let ret = scaled(
            rolling_by_entity(panel, &daily, MARKET_WINDOW, MARKET_MIN_PERIODS, RollingStat::Mean),
            TRADING_DAYS_PER_YEAR * 100.0,
        );
        let vol = scaled(
            rolling_by_entity(panel, &daily, MARKET_WINDOW, MARKET_MIN_PERIODS, RollingStat::Std),
            TRADING_DAYS_PER_YEAR.sqrt() * 100.0,
        );
        out.insert_derived("daily_return", daily);
        out.insert_derived("equity_return_100d", ret);
        out.insert_derived("equity_volatility_100d", vol);
    } else if !panel.has_numeric("equity_volatility_100d") {
        absent.push(AbsentFeature {
            feature: "equity_volatility_100d".to_string(),
            missing_columns: vec!["close_price".to_string()],
        });
    }

    if let Some(cols) = require(panel, "naive_dtd", &DTD_INPUTS, absent) {
        let (sigma_v, dtd): (NumericColumn, NumericColumn) = (0..panel.len())
            .map(|i| match naive_dtd_opt(cols[0][i], cols[1][i], cols[2][i], cols[3][i]) {
                Some(d) => (Some(d.sigma_v), Some(d.dtd)),
                None => (None, None),
            })
            .unzip();
        out.insert_derived("naive_sigma_v", sigma_v);
        out.insert_derived("naive_dtd", dtd);
    }

    out
}

fn scaled(values: NumericColumn, factor: f64) -> NumericColumn {
    values.into_iter().map(|v| v.map(|x| x * factor)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Panel;
    use crate::domain::panel::test_support::date;
    use chrono::Days;

    fn daily_prices(n: usize) -> Panel {
        let start = date(2023, 1, 2);
        let time: Vec<_> = (0..n).map(|d| start + Days::new(d as u64)).collect();
        let mut p = Panel::new(vec!["A".to_string(); n], time).unwrap();
        // alternating +1% / -1% moves
        let mut price = 100.0;
        let mut closes = Vec::new();
        for d in 0..n {
            if d > 0 {
                price *= if d % 2 == 0 { 0.99 } else { 1.01 };
            }
            closes.push(Some(price));
        }
        p.insert_numeric("close_price", closes).unwrap();
        p
    }

    #[test]
    fn trailing_measures_need_fifty_returns() {
        let out = add_market_features(&daily_prices(60), &mut Vec::new());
        let ret = out.numeric("equity_return_100d").unwrap();
        let vol = out.numeric("equity_volatility_100d").unwrap();
        // row 49 has 49 returns, row 50 has 50
        assert_eq!(ret[49], None);
        assert!(ret[50].is_some());
        let v = vol[59].unwrap();
        // daily std ≈ 1% → ≈ 15.9% annualized
        assert!((v - 0.01 * 252f64.sqrt() * 100.0).abs() < 0.2, "vol={v}");
    }

    #[test]
    fn dtd_needs_all_inputs() {
        let mut p = daily_prices(2);
        p.insert_numeric("equity_value", vec![Some(1_000_000.0), Some(-1.0)]).unwrap();
        p.insert_numeric("debt_value", vec![Some(300_000.0), Some(1.0)]).unwrap();
        p.insert_numeric("equity_volatility", vec![Some(0.3), Some(0.3)]).unwrap();
        p.insert_numeric("stock_return", vec![Some(0.08), Some(0.0)]).unwrap();
        let out = add_market_features(&p, &mut Vec::new());
        let dtd = out.numeric("naive_dtd").unwrap();
        assert!((dtd[0].unwrap() - 5.8265).abs() < 1e-3);
        assert_eq!(dtd[1], None);
    }

    #[test]
    fn missing_market_inputs_are_reported_absent() {
        let p = Panel::new(vec!["A".to_string()], vec![date(2024, 1, 1)]).unwrap();
        let mut absent = Vec::new();
        let out = add_market_features(&p, &mut absent);
        assert!(!out.has_numeric("naive_dtd"));
        let names: Vec<_> = absent.iter().map(|a| a.feature.as_str()).collect();
        assert_eq!(names, vec!["equity_return_100d", "equity_volatility_100d", "naive_dtd"]);
    }
}
