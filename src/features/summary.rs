//! Named feature categories and per-feature descriptive statistics.

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureCategory, Panel};
use crate::features::accounting::rolling_name;
use crate::math::{mean, std_dev};

/// Feature names belonging to `category`, for a given rolling window.
pub fn category_features(category: FeatureCategory, rolling_window: usize) -> Vec<String> {
    match category {
        FeatureCategory::Accounting => vec![
            "roa".to_string(),
            rolling_name("roa", rolling_window),
            "revenue_growth".to_string(),
            rolling_name("revenue_growth", rolling_window),
            "leverage".to_string(),
            "retained_earnings_ratio".to_string(),
            "net_income_growth_normalized".to_string(),
        ],
        FeatureCategory::Market => [
            "equity_return_100d",
            "equity_volatility_100d",
            "index_return",
            "naive_dtd",
            "naive_sigma_v",
        ]
        .map(String::from)
        .to_vec(),
        FeatureCategory::Macroeconomic => ["risk_free_rate", "credit_rating_numeric"].map(String::from).to_vec(),
        FeatureCategory::Interactions => [
            "roa_leverage_interaction",
            "growth_volatility_interaction",
            "log_market_cap",
        ]
        .map(String::from)
        .to_vec(),
    }
}

/// Every categorized feature, category order then list order.
pub fn all_features(rolling_window: usize) -> Vec<String> {
    FeatureCategory::ALL
        .iter()
        .flat_map(|c| category_features(*c, rolling_window))
        .collect()
}

/// Categorized features that exist as columns in `panel`.
pub fn available_features(panel: &Panel, rolling_window: usize) -> Vec<String> {
    all_features(rolling_window)
        .into_iter()
        .filter(|f| panel.has_numeric(f))
        .collect()
}

/// Available features of the given categories.
pub fn available_in(panel: &Panel, categories: &[FeatureCategory], rolling_window: usize) -> Vec<String> {
    categories
        .iter()
        .flat_map(|c| category_features(*c, rolling_window))
        .filter(|f| panel.has_numeric(f))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub feature: String,
    pub category: FeatureCategory,
    pub count: usize,
    pub missing_pct: f64,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Descriptive statistics for every available categorized feature.
pub fn feature_summary(panel: &Panel, rolling_window: usize) -> Vec<FeatureStats> {
    let mut out = Vec::new();
    for category in FeatureCategory::ALL {
        for feature in category_features(category, rolling_window) {
            let Some(col) = panel.numeric(&feature) else {
                continue;
            };
            let values: Vec<f64> = col.iter().flatten().copied().collect();
            let missing_pct = if col.is_empty() {
                0.0
            } else {
                100.0 * (col.len() - values.len()) as f64 / col.len() as f64
            };
            out.push(FeatureStats {
                category,
                count: values.len(),
                missing_pct,
                mean: mean(&values),
                std: std_dev(&values, 1),
                min: values.iter().copied().reduce(f64::min),
                max: values.iter().copied().reduce(f64::max),
                feature,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;

    #[test]
    fn rolling_names_follow_window() {
        let acct = category_features(FeatureCategory::Accounting, 8);
        assert!(acct.contains(&"roa_rolling_8q".to_string()));
        assert_eq!(all_features(4).len(), 17);
    }

    #[test]
    fn summary_skips_absent_features() {
        let mut p = quarterly_panel(&["A"], 4);
        p.insert_numeric("roa", vec![Some(1.0), Some(3.0), None, None]).unwrap();
        let summary = feature_summary(&p, 4);
        assert_eq!(summary.len(), 1);
        let s = &summary[0];
        assert_eq!(s.count, 2);
        assert_eq!(s.missing_pct, 50.0);
        assert_eq!(s.mean, Some(2.0));
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.max, Some(3.0));
    }
}
