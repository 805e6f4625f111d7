//! Complete-case regression samples.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};

use crate::domain::Panel;
use crate::error::FitError;

/// Rows of a panel where the target and every feature are present, ordered by
/// `(entity, time)`.
#[derive(Debug, Clone)]
pub struct RegressionSample {
    pub target: String,
    pub features: Vec<String>,
    /// Panel row index of each sample row.
    pub rows: Vec<usize>,
    pub entities: Vec<String>,
    pub times: Vec<NaiveDate>,
    pub y: DVector<f64>,
    /// Feature values only (no intercept column).
    pub x: DMatrix<f64>,
}

impl RegressionSample {
    pub fn extract(panel: &Panel, target: &str, features: &[String]) -> Result<Self, FitError> {
        let mut seen = HashSet::new();
        if let Some(dup) = features.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(FitError::InvalidConfig(format!("feature '{dup}' listed twice")));
        }
        if features.iter().any(|f| f == target) {
            return Err(FitError::InvalidConfig(format!("target '{target}' also listed as a feature")));
        }

        let y_col = panel
            .numeric(target)
            .ok_or_else(|| FitError::MissingInput { column: target.to_string() })?;
        let x_cols = features
            .iter()
            .map(|f| {
                panel
                    .numeric(f)
                    .ok_or_else(|| FitError::MissingInput { column: f.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows: Vec<usize> = panel
            .entity_time_order()
            .into_iter()
            .filter(|&i| y_col[i].is_some() && x_cols.iter().all(|c| c[i].is_some()))
            .collect();

        let n = rows.len();
        let k = features.len();
        let y = DVector::from_iterator(n, rows.iter().map(|&i| y_col[i].unwrap_or(f64::NAN)));
        let x = DMatrix::from_fn(n, k, |r, c| x_cols[c][rows[r]].unwrap_or(f64::NAN));

        Ok(Self {
            target: target.to_string(),
            features: features.to_vec(),
            entities: rows.iter().map(|&i| panel.entities()[i].clone()).collect(),
            times: rows.iter().map(|&i| panel.times()[i]).collect(),
            rows,
            y,
            x,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `[1, X]`.
    pub fn design_with_intercept(&self) -> DMatrix<f64> {
        with_intercept(&self.x)
    }

    /// Dense entity ids (sorted entity order) for each row, plus the names.
    pub fn entity_ids(&self) -> (Vec<usize>, Vec<String>) {
        let names: Vec<String> = self
            .entities
            .iter()
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        let ids = self.entities.iter().map(|e| index[e.as_str()]).collect();
        (ids, names)
    }

    /// Sample positions grouped by period.
    pub fn periods(&self) -> BTreeMap<NaiveDate, Vec<usize>> {
        let mut groups: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (pos, t) in self.times.iter().enumerate() {
            groups.entry(*t).or_default().push(pos);
        }
        groups
    }
}

pub fn with_intercept(x: &DMatrix<f64>) -> DMatrix<f64> {
    x.clone().insert_column(0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;

    #[test]
    fn drops_incomplete_rows_and_orders_by_entity() {
        let mut p = quarterly_panel(&["B", "A"], 2);
        p.insert_numeric("y", vec![Some(1.0), Some(2.0), Some(3.0), None]).unwrap();
        p.insert_numeric("x", vec![Some(1.0), None, Some(5.0), Some(6.0)]).unwrap();
        let s = RegressionSample::extract(&p, "y", &["x".to_string()]).unwrap();
        assert_eq!(s.rows, vec![2, 0]);
        assert_eq!(s.entities, vec!["A", "B"]);
        assert_eq!(s.x[(0, 0)], 5.0);
        assert_eq!(s.design_with_intercept().ncols(), 2);
        assert_eq!(s.entity_ids().0, vec![0, 1]);
    }

    #[test]
    fn missing_columns_are_reported() {
        let p = quarterly_panel(&["A"], 2);
        let err = RegressionSample::extract(&p, "y", &[]).unwrap_err();
        assert_eq!(err, FitError::MissingInput { column: "y".to_string() });
    }

    #[test]
    fn duplicate_feature_names_are_rejected() {
        let mut p = quarterly_panel(&["A"], 2);
        p.insert_numeric("y", vec![Some(1.0); 2]).unwrap();
        p.insert_numeric("x", vec![Some(1.0); 2]).unwrap();
        let err = RegressionSample::extract(&p, "y", &["x".to_string(), "x".to_string()]).unwrap_err();
        assert!(matches!(err, FitError::InvalidConfig(_)));
    }
}
