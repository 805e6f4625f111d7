//! Accounting ratios and their trailing means.

use tracing::debug;

use crate::domain::{NumericColumn, Panel, safe_div};
use crate::features::grouped::{RollingStat, pct_change_by_entity, rolling_by_entity};
use crate::features::{AbsentFeature, require};

/// Columns that get a `{name}_rolling_{window}q` trailing mean.
pub const ROLLING_SOURCES: [&str; 4] = ["roa", "revenue_growth", "net_income", "total_revenue"];

/// Observed periods needed inside the window before a rolling mean is defined.
pub const ROLLING_MIN_PERIODS: usize = 2;

pub fn rolling_name(column: &str, window: usize) -> String {
    format!("{column}_rolling_{window}q")
}

/// Add `roa`, `revenue_growth`, `leverage`, `retained_earnings_ratio` and
/// `net_income_growth_normalized`.
///
/// Ratios over `total_assets` are missing wherever assets are missing or not
/// strictly positive. Where the inputs are present but a row's numerator is
/// missing, a value already in the table (supplied or back-filled) is kept.
pub fn add_accounting_features(panel: &Panel, absent: &mut Vec<AbsentFeature>) -> Panel {
    let mut out = panel.clone();

    if let Some(cols) = require(panel, "roa", &["net_income", "total_assets"], absent) {
        let roa = over_assets(cols[0], cols[1], 100.0, panel.numeric("roa"));
        out.insert_derived("roa", roa);
    }

    if let Some(cols) = require(panel, "revenue_growth", &["total_revenue"], absent) {
        let growth = pct_change_by_entity(panel, cols[0]);
        let existing = panel.numeric("revenue_growth");
        let values = growth
            .iter()
            .enumerate()
            .map(|(i, g)| g.map(|g| g * 100.0).or_else(|| existing.and_then(|e| e[i])))
            .collect();
        out.insert_derived("revenue_growth", values);
    }

    if let Some(cols) = require(panel, "leverage", &["total_debt", "total_assets"], absent) {
        let leverage = over_assets(cols[0], cols[1], 1.0, panel.numeric("leverage"));
        out.insert_derived("leverage", leverage);
    }

    if let Some(cols) = require(
        panel,
        "retained_earnings_ratio",
        &["retained_earnings", "total_assets"],
        absent,
    ) {
        out.insert_derived("retained_earnings_ratio", over_assets(cols[0], cols[1], 1.0, None));
    }

    if let Some(cols) = require(
        panel,
        "net_income_growth_normalized",
        &["net_income", "total_assets"],
        absent,
    ) {
        let growth = pct_change_by_entity(panel, cols[0]);
        out.insert_derived(
            "net_income_growth_normalized",
            over_assets(&growth, cols[1], 1.0, None),
        );
    }

    out
}

/// Add the trailing means of [`ROLLING_SOURCES`] over `window` periods.
pub fn add_rolling_features(panel: &Panel, window: usize, absent: &mut Vec<AbsentFeature>) -> Panel {
    let mut out = panel.clone();
    for source in ROLLING_SOURCES {
        let name = rolling_name(source, window);
        let Some(cols) = require(panel, &name, &[source], absent) else {
            continue;
        };
        let values = rolling_by_entity(panel, cols[0], window, ROLLING_MIN_PERIODS, RollingStat::Mean);
        debug!(feature = %name, defined = values.iter().flatten().count(), "rolling mean");
        out.insert_derived(name, values);
    }
    out
}

fn over_assets(
    numerator: &[Option<f64>],
    assets: &[Option<f64>],
    scale: f64,
    existing: Option<&[Option<f64>]>,
) -> NumericColumn {
    numerator
        .iter()
        .zip(assets)
        .enumerate()
        .map(|(i, (num, ta))| {
            let ta = ta.filter(|a| *a > 0.0)?;
            safe_div(*num, Some(ta))
                .map(|v| v * scale)
                .or_else(|| existing.and_then(|e| e[i]))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;

    fn fundamentals() -> Panel {
        let mut p = quarterly_panel(&["A", "B"], 3);
        p.insert_numeric("net_income", vec![Some(10.0), Some(12.0), Some(6.0), Some(5.0), None, Some(5.0)])
            .unwrap();
        p.insert_numeric("total_assets", vec![Some(100.0), Some(0.0), Some(120.0), None, Some(50.0), Some(50.0)])
            .unwrap();
        p.insert_numeric("total_debt", vec![Some(30.0), Some(30.0), Some(60.0), Some(10.0), Some(10.0), Some(10.0)])
            .unwrap();
        p.insert_numeric("total_revenue", vec![Some(200.0), Some(220.0), Some(198.0), Some(0.0), Some(10.0), Some(12.0)])
            .unwrap();
        p
    }

    #[test]
    fn ratios_follow_formulas() {
        let mut absent = Vec::new();
        let out = add_accounting_features(&fundamentals(), &mut absent);

        let roa = out.numeric("roa").unwrap();
        assert_eq!(roa[0], Some(10.0));
        assert_eq!(roa[2], Some(5.0));

        let growth = out.numeric("revenue_growth").unwrap();
        assert_eq!(growth[0], None);
        assert!((growth[1].unwrap() - 10.0).abs() < 1e-9);
        assert!((growth[2].unwrap() + 10.0).abs() < 1e-9);
        // previous revenue of zero
        assert_eq!(growth[4], None);

        let leverage = out.numeric("leverage").unwrap();
        assert_eq!(leverage[2], Some(0.5));

        // net income 10 -> 12 is +20%, then / 0 assets
        let nig = out.numeric("net_income_growth_normalized").unwrap();
        assert_eq!(nig[1], None);
        assert!((nig[2].unwrap() - (-0.5 / 120.0)).abs() < 1e-12);

        // retained earnings were never supplied
        assert!(!out.has_numeric("retained_earnings_ratio"));
        assert_eq!(absent.len(), 1);
        assert_eq!(absent[0].feature, "retained_earnings_ratio");
    }

    #[test]
    fn zero_or_missing_assets_give_missing_ratios() {
        let out = add_accounting_features(&fundamentals(), &mut Vec::new());
        for row in [1, 3] {
            assert_eq!(out.numeric("roa").unwrap()[row], None);
            assert_eq!(out.numeric("leverage").unwrap()[row], None);
        }
    }

    #[test]
    fn supplied_roa_survives_missing_numerator() {
        let p = fundamentals().with_numeric("roa", vec![None, None, None, None, Some(7.0), None]).unwrap();
        let out = add_accounting_features(&p, &mut Vec::new());
        assert_eq!(out.numeric("roa").unwrap()[4], Some(7.0));
    }

    #[test]
    fn rolling_columns_are_named_by_window() {
        let p = add_accounting_features(&fundamentals(), &mut Vec::new());
        let out = add_rolling_features(&p, 4, &mut Vec::new());
        let roll = out.numeric("roa_rolling_4q").unwrap();
        assert_eq!(roll[0], None);
        // [10, missing]
        assert_eq!(roll[1], None);
        assert_eq!(roll[2], Some(7.5));
        assert!(out.has_numeric("total_revenue_rolling_4q"));
    }

    proptest! {
        #[test]
        fn ratios_over_assets_are_missing_without_positive_assets(
            assets in prop::collection::vec(prop::option::of(prop_oneof![Just(0.0f64), -1e3f64..1e3]), 1..40),
            income in -1e3f64..1e3,
        ) {
            let mut p = quarterly_panel(&["A"], assets.len());
            p.insert_numeric("total_assets", assets.clone()).unwrap();
            p.insert_numeric("net_income", vec![Some(income); assets.len()]).unwrap();
            p.insert_numeric("total_debt", vec![Some(income.abs()); assets.len()]).unwrap();

            let out = add_accounting_features(&p, &mut Vec::new());
            let roa = out.numeric("roa").unwrap();
            let leverage = out.numeric("leverage").unwrap();
            for (i, a) in assets.iter().enumerate() {
                if !a.is_some_and(|a| a > 0.0) {
                    prop_assert!(roa[i].is_none());
                    prop_assert!(leverage[i].is_none());
                } else {
                    prop_assert!(roa[i].is_some_and(f64::is_finite));
                }
            }
        }
    }
}
