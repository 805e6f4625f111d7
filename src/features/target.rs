//! Log transform of the spread target.

use crate::domain::{NumericColumn, Panel, finite};

/// Name of the working (log) target derived from `raw`.
pub fn log_target_name(raw: &str) -> String {
    format!("log_{raw}")
}

/// `ln(x)` for strictly positive values; zero, negative and missing spreads
/// become missing.
pub fn transform_target(values: &[Option<f64>]) -> NumericColumn {
    values
        .iter()
        .map(|v| v.filter(|x| *x > 0.0).and_then(|x| finite(x.ln())))
        .collect()
}

/// Add `log_{raw}` next to `raw`. Returns the new column name, or `None` when
/// `raw` is not in the panel.
pub fn add_log_target(panel: &mut Panel, raw: &str) -> Option<String> {
    let values = transform_target(panel.numeric(raw)?);
    let name = log_target_name(raw);
    panel.insert_derived(name.clone(), values);
    Some(name)
}
