//! Per-entity sequential operations (percent change, trailing windows).
//!
//! All functions walk each entity's rows in time order, so the result for a row
//! only ever depends on that entity's earlier rows.

use crate::domain::{NumericColumn, Panel, finite};
use crate::math::{mean, std_dev};

/// Statistic computed over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingStat {
    Mean,
    /// Sample standard deviation (ddof = 1).
    Std,
}

/// `x_t / x_{t-1} − 1` between consecutive rows of each entity.
///
/// Missing for the first row of an entity, when either value is missing, or
/// when the previous value is zero.
pub fn pct_change_by_entity(panel: &Panel, values: &[Option<f64>]) -> NumericColumn {
    let mut out = vec![None; panel.len()];
    for rows in panel.entity_groups().values() {
        for pair in rows.windows(2) {
            out[pair[1]] = pct_change(values[pair[0]], values[pair[1]]);
        }
    }
    out
}

pub fn pct_change(prev: Option<f64>, cur: Option<f64>) -> Option<f64> {
    let (p, c) = (prev?, cur?);
    if p == 0.0 {
        return None;
    }
    finite(c / p - 1.0)
}

/// Trailing-window statistic per entity. The window ends at (and includes) the
/// current row; at least `min_periods` present values are required.
pub fn rolling_by_entity(
    panel: &Panel,
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
    stat: RollingStat,
) -> NumericColumn {
    let mut out = vec![None; panel.len()];
    if window == 0 {
        return out;
    }

    for rows in panel.entity_groups().values() {
        for (pos, &row) in rows.iter().enumerate() {
            let start = (pos + 1).saturating_sub(window);
            let present: Vec<f64> = rows[start..=pos].iter().filter_map(|&r| values[r]).collect();
            if present.len() < min_periods.max(1) {
                continue;
            }
            out[row] = match stat {
                RollingStat::Mean => mean(&present),
                RollingStat::Std => std_dev(&present, 1),
            }
            .and_then(finite);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;

    #[test]
    fn pct_change_restarts_per_entity() {
        let p = quarterly_panel(&["A", "B"], 3);
        let v = vec![Some(100.0), Some(110.0), Some(0.0), Some(50.0), Some(25.0), Some(25.0)];
        let out = pct_change_by_entity(&p, &v);
        assert_eq!(out[0], None);
        assert!((out[1].unwrap() - 0.1).abs() < 1e-12);
        assert!((out[2].unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(out[3], None);
        assert!((out[4].unwrap() + 0.5).abs() < 1e-12);
        assert_eq!(out[5], Some(0.0));
    }

    #[test]
    fn pct_change_from_zero_is_missing() {
        assert_eq!(pct_change(Some(0.0), Some(5.0)), None);
        assert_eq!(pct_change(None, Some(5.0)), None);
    }

    #[test]
    fn rolling_mean_needs_min_periods() {
        let p = quarterly_panel(&["A"], 6);
        let v = vec![Some(1.0), Some(2.0), None, Some(4.0), Some(5.0), Some(6.0)];
        let out = rolling_by_entity(&p, &v, 4, 2, RollingStat::Mean);
        assert_eq!(out[0], None);
        assert_eq!(out[1], Some(1.5));
        assert_eq!(out[2], Some(1.5));
        assert!((out[3].unwrap() - 7.0 / 3.0).abs() < 1e-12);
        // window [2, None, 4, 5]
        assert!((out[4].unwrap() - 11.0 / 3.0).abs() < 1e-12);
        // window [None, 4, 5, 6]
        assert_eq!(out[5], Some(5.0));
    }
}
