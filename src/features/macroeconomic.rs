//! Credit-rating scale and as-of merge of external macro series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{NumericColumn, Panel};
use crate::features::AbsentFeature;

/// S&P-style rating alphabet mapped onto `[0, 1]` (AAA = 0, D = 1).
pub const RATING_SCALE: [(&str, f64); 22] = [
    ("AAA", 0.000),
    ("AA+", 0.056),
    ("AA", 0.111),
    ("AA-", 0.167),
    ("A+", 0.222),
    ("A", 0.278),
    ("A-", 0.333),
    ("BBB+", 0.389),
    ("BBB", 0.444),
    ("BBB-", 0.500),
    ("BB+", 0.556),
    ("BB", 0.611),
    ("BB-", 0.667),
    ("B+", 0.722),
    ("B", 0.778),
    ("B-", 0.833),
    ("CCC+", 0.889),
    ("CCC", 0.944),
    ("CCC-", 0.956),
    ("CC", 0.972),
    ("C", 0.989),
    ("D", 1.000),
];

/// Exact lookup (after trimming and upper-casing). Unknown grades are missing.
pub fn rating_to_numeric(rating: &str) -> Option<f64> {
    let key = rating.trim().to_ascii_uppercase();
    RATING_SCALE
        .iter()
        .find(|(grade, _)| *grade == key)
        .map(|(_, v)| *v)
}

/// Dated macro observations (e.g. `risk_free_rate`, `index_return`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroSeries {
    dates: Vec<NaiveDate>,
    columns: Vec<(String, NumericColumn)>,
}

impl MacroSeries {
    /// Build a series; rows are sorted by date. Later duplicates of a date
    /// replace earlier ones.
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<(String, NumericColumn)>) -> Option<Self> {
        if columns.iter().any(|(_, c)| c.len() != dates.len()) {
            return None;
        }

        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);
        let mut keep: Vec<usize> = Vec::with_capacity(order.len());
        for i in order {
            match keep.last_mut() {
                Some(last) if dates[*last] == dates[i] => *last = i,
                _ => keep.push(i),
            }
        }

        Some(Self {
            dates: keep.iter().map(|&i| dates[i]).collect(),
            columns: columns
                .into_iter()
                .map(|(name, col)| {
                    let col = keep.iter().map(|&i| col[i].filter(|v| v.is_finite())).collect();
                    (name, col)
                })
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Index of the latest observation dated on or before `t`.
    fn as_of(&self, t: NaiveDate) -> Option<usize> {
        let n = self.dates.partition_point(|d| *d <= t);
        n.checked_sub(1)
    }
}

/// Add `credit_rating_numeric` (from the `credit_rating` text column) and,
/// when a macro series is given, its columns merged as of each row's date.
pub fn add_macro_features(
    panel: &Panel,
    macro_series: Option<&MacroSeries>,
    absent: &mut Vec<AbsentFeature>,
) -> Panel {
    let mut out = panel.clone();

    match panel.text("credit_rating") {
        Some(ratings) => {
            let values: NumericColumn = ratings
                .iter()
                .map(|r| r.as_deref().and_then(rating_to_numeric))
                .collect();
            let unknown = ratings
                .iter()
                .zip(&values)
                .filter(|(r, v)| r.is_some() && v.is_none())
                .count();
            if unknown > 0 {
                warn!(rows = unknown, "unrecognised credit ratings left missing");
            }
            out.insert_derived("credit_rating_numeric", values);
        }
        None if !panel.has_numeric("credit_rating_numeric") => {
            warn!(feature = "credit_rating_numeric", missing = "credit_rating", "feature absent");
            absent.push(AbsentFeature {
                feature: "credit_rating_numeric".to_string(),
                missing_columns: vec!["credit_rating".to_string()],
            });
        }
        None => {}
    }

    if let Some(series) = macro_series {
        let idx: Vec<Option<usize>> = panel.times().iter().map(|t| series.as_of(*t)).collect();
        for (name, col) in &series.columns {
            if panel.has_numeric(name) {
                warn!(column = %name, "macro column already in panel; keeping panel values");
                continue;
            }
            let merged = idx.iter().map(|i| i.and_then(|i| col[i])).collect();
            out.insert_derived(name.clone(), merged);
        }
        info!(columns = series.columns.len(), observations = series.len(), "merged macro series");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::{date, quarterly_panel};

    #[test]
    fn rating_scale_is_monotone_and_bounded() {
        assert_eq!(rating_to_numeric("AAA"), Some(0.0));
        assert_eq!(rating_to_numeric(" bbb- "), Some(0.5));
        assert_eq!(rating_to_numeric("D"), Some(1.0));
        assert_eq!(rating_to_numeric("NR"), None);
        assert!(RATING_SCALE.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn unknown_ratings_stay_missing() {
        let mut p = quarterly_panel(&["A"], 3);
        p.insert_text("credit_rating", vec![Some("A".into()), Some("Baa2".into()), None])
            .unwrap();
        let out = add_macro_features(&p, None, &mut Vec::new());
        assert_eq!(out.numeric("credit_rating_numeric").unwrap(), &[Some(0.278), None, None]);
    }

    #[test]
    fn as_of_merge_never_looks_ahead() {
        // panel dates: 2020-03-31, 2020-06-30, 2020-09-30
        let p = quarterly_panel(&["A"], 3);
        let series = MacroSeries::new(
            vec![date(2020, 4, 1), date(2020, 3, 31), date(2020, 9, 30)],
            vec![("risk_free_rate".to_string(), vec![Some(2.0), Some(1.0), Some(3.0)])],
        )
        .unwrap();
        let out = add_macro_features(&p, Some(&series), &mut Vec::new());
        assert_eq!(
            out.numeric("risk_free_rate").unwrap(),
            &[Some(1.0), Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn rows_before_first_macro_date_are_missing() {
        let p = quarterly_panel(&["A"], 2);
        let series =
            MacroSeries::new(vec![date(2020, 5, 1)], vec![("index_return".to_string(), vec![Some(0.1)])])
                .unwrap();
        let out = add_macro_features(&p, Some(&series), &mut Vec::new());
        assert_eq!(out.numeric("index_return").unwrap(), &[None, Some(0.1)]);
    }
}
