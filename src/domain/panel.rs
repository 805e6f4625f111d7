//! Column-oriented panel table.
//!
//! A `Panel` is a set of rows uniquely keyed by `(entity, time)` with named
//! columns of three kinds:
//!
//! - numeric columns (`Option<f64>`, `None` = missing)
//! - text columns (`Option<String>`)
//! - imputation flags (`bool`, one flag column per imputed field)
//!
//! Every transform in the pipeline takes `&Panel` and returns a new `Panel`;
//! nothing mutates a table it received as a parameter.
//!
//! Numeric columns never hold non-finite values: `insert_numeric` maps
//! `NaN`/`±∞` to `None` so the "finite or missing" invariant is enforced at the
//! single point where data enters a table.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PanelError;

pub type NumericColumn = Vec<Option<f64>>;
pub type TextColumn = Vec<Option<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    entity: Vec<String>,
    time: Vec<NaiveDate>,
    numeric: BTreeMap<String, NumericColumn>,
    text: BTreeMap<String, TextColumn>,
    imputed: BTreeMap<String, Vec<bool>>,
}

impl Panel {
    /// Create a panel from its key columns.
    pub fn new(entity: Vec<String>, time: Vec<NaiveDate>) -> Result<Self, PanelError> {
        if entity.len() != time.len() {
            return Err(PanelError::LengthMismatch {
                column: "time".to_string(),
                expected: entity.len(),
                actual: time.len(),
            });
        }

        let mut seen = HashSet::with_capacity(entity.len());
        for (e, t) in entity.iter().zip(&time) {
            if !seen.insert((e.as_str(), *t)) {
                return Err(PanelError::DuplicateKey {
                    entity: e.clone(),
                    time: *t,
                });
            }
        }

        Ok(Self {
            entity,
            time,
            numeric: BTreeMap::new(),
            text: BTreeMap::new(),
            imputed: BTreeMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity.is_empty()
    }

    pub fn entities(&self) -> &[String] {
        &self.entity
    }

    pub fn times(&self) -> &[NaiveDate] {
        &self.time
    }

    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        self.numeric.get(name).map(Vec::as_slice)
    }

    pub fn text(&self, name: &str) -> Option<&[Option<String>]> {
        self.text.get(name).map(Vec::as_slice)
    }

    pub fn imputed(&self, name: &str) -> Option<&[bool]> {
        self.imputed.get(name).map(Vec::as_slice)
    }

    pub fn has_numeric(&self, name: &str) -> bool {
        self.numeric.contains_key(name)
    }

    pub fn has_text(&self, name: &str) -> bool {
        self.text.contains_key(name)
    }

    pub fn numeric_names(&self) -> Vec<String> {
        self.numeric.keys().cloned().collect()
    }

    pub fn text_names(&self) -> Vec<String> {
        self.text.keys().cloned().collect()
    }

    pub fn imputed_names(&self) -> Vec<String> {
        self.imputed.keys().cloned().collect()
    }

    /// Insert (or replace) a numeric column. Non-finite values become missing.
    pub fn insert_numeric(
        &mut self,
        name: impl Into<String>,
        values: NumericColumn,
    ) -> Result<(), PanelError> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        self.numeric.insert(name, values);
        Ok(())
    }

    pub fn insert_text(&mut self, name: impl Into<String>, values: TextColumn) -> Result<(), PanelError> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        self.text.insert(name, values);
        Ok(())
    }

    pub fn insert_imputed(&mut self, name: impl Into<String>, flags: Vec<bool>) -> Result<(), PanelError> {
        let name = name.into();
        self.check_len(&name, flags.len())?;
        self.imputed.insert(name, flags);
        Ok(())
    }

    /// Insert a column computed row-by-row from this panel.
    ///
    /// Derived columns are built from `0..len()`, so the length check cannot
    /// fail; a short column is padded with missing values rather than refused.
    pub fn insert_derived(&mut self, name: impl Into<String>, mut values: NumericColumn) {
        debug_assert_eq!(values.len(), self.len());
        values.resize(self.len(), None);
        for v in values.iter_mut() {
            *v = v.filter(|x| x.is_finite());
        }
        self.numeric.insert(name.into(), values);
    }

    /// Copy of this panel with one numeric column added or replaced.
    pub fn with_numeric(&self, name: impl Into<String>, values: NumericColumn) -> Result<Panel, PanelError> {
        let mut out = self.clone();
        out.insert_numeric(name, values)?;
        Ok(out)
    }

    pub fn remove_numeric(&mut self, name: &str) -> Option<NumericColumn> {
        self.numeric.remove(name)
    }

    /// Rename a numeric or text column. Returns `false` if `from` does not exist
    /// or `to` is already taken.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.numeric.contains_key(to) || self.text.contains_key(to) {
            return false;
        }
        if let Some(col) = self.numeric.remove(from) {
            self.numeric.insert(to.to_string(), col);
            return true;
        }
        if let Some(col) = self.text.remove(from) {
            self.text.insert(to.to_string(), col);
            return true;
        }
        false
    }

    /// Row indices grouped by entity (entities in sorted order), each group
    /// ordered by time ascending.
    pub fn entity_groups(&self) -> BTreeMap<&str, Vec<usize>> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, e) in self.entity.iter().enumerate() {
            groups.entry(e.as_str()).or_default().push(idx);
        }
        for rows in groups.values_mut() {
            rows.sort_by_key(|&i| self.time[i]);
        }
        groups
    }

    /// Row indices grouped by time period (periods in ascending order).
    pub fn time_groups(&self) -> BTreeMap<NaiveDate, Vec<usize>> {
        let mut groups: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (idx, t) in self.time.iter().enumerate() {
            groups.entry(*t).or_default().push(idx);
        }
        groups
    }

    /// All row indices ordered by `(entity, time)`.
    pub fn entity_time_order(&self) -> Vec<usize> {
        self.entity_groups().into_values().flatten().collect()
    }

    /// New panel holding only `rows` (in the given order).
    pub fn select_rows(&self, rows: &[usize]) -> Panel {
        let pick_num = |col: &NumericColumn| rows.iter().map(|&i| col[i]).collect::<NumericColumn>();
        Panel {
            entity: rows.iter().map(|&i| self.entity[i].clone()).collect(),
            time: rows.iter().map(|&i| self.time[i]).collect(),
            numeric: self
                .numeric
                .iter()
                .map(|(k, v)| (k.clone(), pick_num(v)))
                .collect(),
            text: self
                .text
                .iter()
                .map(|(k, v)| (k.clone(), rows.iter().map(|&i| v[i].clone()).collect()))
                .collect(),
            imputed: self
                .imputed
                .iter()
                .map(|(k, v)| (k.clone(), rows.iter().map(|&i| v[i]).collect()))
                .collect(),
        }
    }

    pub fn distinct_entities(&self) -> usize {
        self.entity.iter().collect::<HashSet<_>>().len()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.time.iter().min()?;
        let max = self.time.iter().max()?;
        Some((*min, *max))
    }

    fn check_len(&self, name: &str, actual: usize) -> Result<(), PanelError> {
        if actual != self.len() {
            return Err(PanelError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                actual,
            });
        }
        Ok(())
    }
}

/// Keep a value only if it is finite.
pub fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// Guarded division: missing when either side is missing, the denominator is
/// zero, or the result is not finite.
pub fn safe_div(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    let (n, d) = (num?, den?);
    if d == 0.0 {
        return None;
    }
    finite(n / d)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Panel with `entities × periods` quarterly rows starting 2020-03-31.
    pub fn quarterly_panel(entities: &[&str], periods: usize) -> Panel {
        let mut ent = Vec::new();
        let mut time = Vec::new();
        for e in entities {
            for q in 0..periods {
                ent.push(e.to_string());
                time.push(quarter_end(q));
            }
        }
        Panel::new(ent, time).unwrap()
    }

    pub fn quarter_end(q: usize) -> NaiveDate {
        let year = 2020 + (q / 4) as i32;
        match q % 4 {
            0 => date(year, 3, 31),
            1 => date(year, 6, 30),
            2 => date(year, 9, 30),
            _ => date(year, 12, 31),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = Panel::new(
            vec!["A".into(), "A".into()],
            vec![date(2024, 1, 1), date(2024, 1, 1)],
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::DuplicateKey { .. }));
    }

    #[test]
    fn non_finite_values_become_missing() {
        let mut p = quarterly_panel(&["A"], 3);
        p.insert_numeric("x", vec![Some(1.0), Some(f64::INFINITY), Some(f64::NAN)])
            .unwrap();
        assert_eq!(p.numeric("x").unwrap(), &[Some(1.0), None, None]);
    }

    #[test]
    fn entity_groups_are_time_ordered() {
        let p = Panel::new(
            vec!["B".into(), "A".into(), "B".into(), "A".into()],
            vec![date(2024, 6, 30), date(2024, 3, 31), date(2024, 3, 31), date(2023, 12, 31)],
        )
        .unwrap();
        let groups = p.entity_groups();
        assert_eq!(groups["A"], vec![3, 1]);
        assert_eq!(groups["B"], vec![2, 0]);
        assert_eq!(p.entity_time_order(), vec![3, 1, 2, 0]);
    }

    #[test]
    fn with_numeric_leaves_source_untouched() {
        let p = quarterly_panel(&["A"], 2);
        let q = p.with_numeric("x", vec![Some(1.0), None]).unwrap();
        assert!(!p.has_numeric("x"));
        assert!(q.has_numeric("x"));
    }

    #[test]
    fn safe_div_guards_zero_and_missing() {
        assert_eq!(safe_div(Some(1.0), Some(0.0)), None);
        assert_eq!(safe_div(None, Some(2.0)), None);
        assert_eq!(safe_div(Some(1.0), Some(4.0)), Some(0.25));
    }
}
