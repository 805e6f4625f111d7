//! Feature Engineer.
//!
//! Pure transforms that extend a prepared panel with derived columns, in this
//! order:
//!
//! 1. accounting ratios
//! 2. market measures (trailing return / volatility, naive distance-to-default)
//! 3. credit rating scale and macro series
//! 4. rolling means
//! 5. interactions
//! 6. winsorization of every numeric column
//! 7. log of the spread target
//!
//! A feature whose input columns are missing is left out of the table (and
//! logged); it never aborts the run.

pub mod accounting;
pub mod grouped;
pub mod interaction;
pub mod macroeconomic;
pub mod market;
pub mod summary;
pub mod target;
pub mod winsorize;

pub use accounting::*;
pub use grouped::*;
pub use interaction::*;
pub use macroeconomic::*;
pub use market::*;
pub use summary::*;
pub use target::*;
pub use winsorize::*;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::Panel;
use crate::error::FitError;

pub const DEFAULT_WINSORIZE_LEVEL: f64 = 0.01;
pub const DEFAULT_ROLLING_WINDOW: usize = 4;

/// A feature that could not be built because input columns were missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsentFeature {
    pub feature: String,
    pub missing_columns: Vec<String>,
}

/// Output of [`FeatureEngineer::engineer`].
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Winsorized features plus the log target.
    pub table: Panel,
    /// All derived columns before winsorization (used to re-winsorize at
    /// other levels).
    pub unwinsorized: Panel,
    pub absent: Vec<AbsentFeature>,
    /// Name of the log target column, when the raw target was present.
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    winsorize_level: f64,
    rolling_window: usize,
    macro_series: Option<MacroSeries>,
}

impl FeatureEngineer {
    pub fn new(winsorize_level: f64) -> Result<Self, FitError> {
        check_level(winsorize_level)?;
        Ok(Self {
            winsorize_level,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            macro_series: None,
        })
    }

    pub fn with_rolling_window(mut self, window: usize) -> Result<Self, FitError> {
        if window < 2 {
            return Err(FitError::InvalidConfig(format!(
                "rolling window must be at least 2 periods, got {window}"
            )));
        }
        self.rolling_window = window;
        Ok(self)
    }

    pub fn with_macro_series(mut self, series: MacroSeries) -> Self {
        self.macro_series = Some(series);
        self
    }

    pub fn winsorize_level(&self) -> f64 {
        self.winsorize_level
    }

    pub fn rolling_window(&self) -> usize {
        self.rolling_window
    }

    /// Steps 1–5: every derived column, not yet winsorized.
    pub fn derive(&self, panel: &Panel) -> (Panel, Vec<AbsentFeature>) {
        let mut absent = Vec::new();
        let table = add_accounting_features(panel, &mut absent);
        let table = add_market_features(&table, &mut absent);
        let table = add_macro_features(&table, self.macro_series.as_ref(), &mut absent);
        let table = add_rolling_features(&table, self.rolling_window, &mut absent);
        let table = add_interaction_features(&table);
        (table, absent)
    }

    /// Steps 6–7 at an explicit level: winsorize, then add the log target.
    pub fn finish(&self, derived: &Panel, level: f64, target: Option<&str>) -> (Panel, Option<String>) {
        let mut table = winsorize_panel(derived, level, &[]);
        let target = target.and_then(|raw| {
            let name = add_log_target(&mut table, raw);
            if name.is_none() {
                warn!(target = raw, "target column not in panel; no log target");
            }
            name
        });
        (table, target)
    }

    /// Full feature pipeline. `target` names the raw spread column.
    pub fn engineer(&self, panel: &Panel, target: Option<&str>) -> FeatureTable {
        info!(rows = panel.len(), entities = panel.distinct_entities(), "engineering features");
        let (unwinsorized, absent) = self.derive(panel);
        let (table, target) = self.finish(&unwinsorized, self.winsorize_level, target);
        info!(
            columns = table.numeric_names().len(),
            available = available_features(&table, self.rolling_window).len(),
            absent = absent.len(),
            "feature table ready"
        );
        FeatureTable {
            table,
            unwinsorized,
            absent,
            target,
        }
    }
}

pub(crate) fn check_level(level: f64) -> Result<(), FitError> {
    if !(level > 0.0 && level < 0.5) {
        return Err(FitError::InvalidConfig(format!(
            "winsorize level must be in (0, 0.5), got {level}"
        )));
    }
    Ok(())
}

/// Input columns of `feature`, or `None` (recording the feature as absent)
/// when any of them is missing. A feature column already present in the panel
/// is kept as supplied and not reported.
pub(crate) fn require<'a>(
    panel: &'a Panel,
    feature: &str,
    columns: &[&str],
    absent: &mut Vec<AbsentFeature>,
) -> Option<Vec<&'a [Option<f64>]>> {
    let found: Vec<&[Option<f64>]> = columns.iter().filter_map(|c| panel.numeric(c)).collect();
    if found.len() == columns.len() {
        return Some(found);
    }

    let missing: Vec<String> = columns
        .iter()
        .filter(|c| !panel.has_numeric(c))
        .map(|c| c.to_string())
        .collect();
    if panel.has_numeric(feature) {
        tracing::debug!(feature, ?missing, "inputs missing; keeping supplied column");
    } else {
        warn!(feature, ?missing, "feature absent: required input columns missing");
        absent.push(AbsentFeature {
            feature: feature.to_string(),
            missing_columns: missing,
        });
    }
    None
}
