//! Two-sided winsorization at empirical quantiles.
//!
//! Bounds are order statistics taken inward from each tail of the sorted
//! present values:
//!
//! ```text
//! lower = x[floor((n-1)·p)]
//! upper = x[(n-1) - floor((n-1)·p)]
//! ```
//!
//! Clipping at order statistics leaves both bound values in the column, so a
//! second pass at the same level finds the same bounds and changes nothing.

use tracing::debug;

use crate::domain::{NumericColumn, Panel};

/// `(lower, upper)` clipping bounds of the present values, or `None` when the
/// column has no present values.
pub fn winsor_bounds(values: &[Option<f64>], level: f64) -> Option<(f64, f64)> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let last = sorted.len() - 1;
    let k = ((last as f64) * level.clamp(0.0, 0.5)).floor() as usize;
    let k = k.min(last / 2);
    Some((sorted[k], sorted[last - k]))
}

pub fn winsorize_column(values: &[Option<f64>], level: f64) -> NumericColumn {
    match winsor_bounds(values, level) {
        Some((lo, hi)) => values.iter().map(|v| v.map(|x| x.clamp(lo, hi))).collect(),
        None => values.to_vec(),
    }
}

/// Winsorize every numeric column of `panel` except those in `exclude`, each
/// over the whole table.
pub fn winsorize_panel(panel: &Panel, level: f64, exclude: &[&str]) -> Panel {
    let mut out = panel.clone();
    for name in panel.numeric_names() {
        if exclude.contains(&name.as_str()) {
            continue;
        }
        if let Some(col) = panel.numeric(&name) {
            out.insert_derived(name.clone(), winsorize_column(col, level));
        }
    }
    debug!(level, columns = panel.numeric_names().len(), "winsorized panel");
    out
}
