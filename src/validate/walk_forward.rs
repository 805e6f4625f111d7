//! Chronological walk-forward validation of pooled OLS.
//!
//! Windows are laid out in calendar years from the first date of the
//! complete-case sample:
//!
//! ```text
//! train: [start + i·step, start + i·step + train)      (rolling)
//!        [start,          start + i·step + train)      (anchored)
//! test:  [train_end,      train_end + test)
//! ```
//!
//! Windowing stops once the test window would end after the last date.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{Panel, PerformanceMetrics};
use crate::error::FitError;
use crate::fit::{RegressionSample, fit_pooled_ols};
use crate::math::{mean, performance_metrics, std_dev};

pub const MIN_TRAIN_ROWS: usize = 100;
pub const MIN_TEST_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub train_years: u32,
    pub test_years: u32,
    pub step_years: u32,
    /// Keep the train window's start fixed at the first date.
    pub anchored: bool,
    pub min_train_rows: usize,
    pub min_test_rows: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_years: 3,
            test_years: 1,
            step_years: 1,
            anchored: false,
            min_train_rows: MIN_TRAIN_ROWS,
            min_test_rows: MIN_TEST_ROWS,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.train_years == 0 || self.test_years == 0 || self.step_years == 0 {
            return Err(FitError::InvalidConfig(format!(
                "walk-forward years must be positive (train {}, test {}, step {})",
                self.train_years, self.test_years, self.step_years
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    pub bounds: WindowBounds,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedWindow {
    pub bounds: WindowBounds,
    pub train_rows: usize,
    pub test_rows: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub config: WalkForwardConfig,
    pub windows: Vec<WalkForwardWindow>,
    pub skipped: Vec<SkippedWindow>,
    pub mean_r_squared: Option<f64>,
    /// Population standard deviation of the window R² values.
    pub std_r_squared: Option<f64>,
    pub mean_rmse: Option<f64>,
}

pub fn walk_forward(
    panel: &Panel,
    target: &str,
    features: &[String],
    config: &WalkForwardConfig,
) -> Result<WalkForwardReport, FitError> {
    config.validate()?;
    let sample = RegressionSample::extract(panel, target, features)?;
    let (Some(first), Some(last)) = (sample.times.iter().min().copied(), sample.times.iter().max().copied()) else {
        return Err(FitError::InsufficientData {
            context: "walk-forward validation".to_string(),
            needed: config.min_train_rows + config.min_test_rows,
            available: 0,
        });
    };

    let mut windows = Vec::new();
    let mut skipped = Vec::new();

    for i in 0u32.. {
        let Some(bounds) = window_bounds(first, i, config) else {
            break;
        };
        if bounds.test_end > last {
            break;
        }

        let select = |from: NaiveDate, to: NaiveDate| -> Vec<usize> {
            sample
                .times
                .iter()
                .zip(&sample.rows)
                .filter(|(t, _)| **t >= from && **t < to)
                .map(|(_, row)| *row)
                .collect()
        };
        let train = select(bounds.train_start, bounds.train_end);
        let test = select(bounds.test_start, bounds.test_end);

        let skip = |reason: String| SkippedWindow {
            bounds: bounds.clone(),
            train_rows: train.len(),
            test_rows: test.len(),
            reason,
        };
        if train.len() < config.min_train_rows || test.len() < config.min_test_rows {
            debug!(window = i, train = train.len(), test = test.len(), "skipping thin window");
            skipped.push(skip(format!(
                "needs {} train / {} test rows",
                config.min_train_rows, config.min_test_rows
            )));
            continue;
        }

        let model = match fit_pooled_ols(&panel.select_rows(&train), target, features) {
            Ok(model) => model,
            Err(err) => {
                debug!(window = i, error = %err, "skipping window after failed fit");
                skipped.push(skip(err.to_string()));
                continue;
            }
        };

        let test_panel = panel.select_rows(&test);
        let predicted = model.predict(&test_panel);
        let actual = test_panel.numeric(target).unwrap_or_default();
        match performance_metrics(actual, &predicted, Some(model.stats.n_params)) {
            Some(metrics) => windows.push(WalkForwardWindow {
                bounds: bounds.clone(),
                train_rows: train.len(),
                test_rows: test.len(),
                metrics,
            }),
            None => skipped.push(skip("no scorable test rows".to_string())),
        }
    }

    let r2: Vec<f64> = windows.iter().map(|w| w.metrics.r_squared).filter(|v| v.is_finite()).collect();
    let rmse: Vec<f64> = windows.iter().map(|w| w.metrics.rmse).filter(|v| v.is_finite()).collect();
    let report = WalkForwardReport {
        config: config.clone(),
        mean_r_squared: mean(&r2),
        std_r_squared: std_dev(&r2, 0),
        mean_rmse: mean(&rmse),
        windows,
        skipped,
    };

    info!(
        windows = report.windows.len(),
        skipped = report.skipped.len(),
        mean_r_squared = ?report.mean_r_squared,
        "walk-forward validation finished"
    );
    Ok(report)
}

fn window_bounds(first: NaiveDate, i: u32, config: &WalkForwardConfig) -> Option<WindowBounds> {
    let offset = first.checked_add_months(Months::new(12 * i * config.step_years))?;
    let train_start = if config.anchored { first } else { offset };
    let train_end = offset.checked_add_months(Months::new(12 * config.train_years))?;
    let test_end = train_end.checked_add_months(Months::new(12 * config.test_years))?;
    Some(WindowBounds {
        train_start,
        train_end,
        test_start: train_end,
        test_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::date;
    use crate::fit::test_data::{linear_panel, names};

    #[test]
    fn rolling_windows_advance_by_step() {
        let config = WalkForwardConfig::default();
        let w0 = window_bounds(date(2020, 3, 31), 0, &config).unwrap();
        let w2 = window_bounds(date(2020, 3, 31), 2, &config).unwrap();
        assert_eq!(w0.train_end, date(2023, 3, 31));
        assert_eq!(w0.test_end, date(2024, 3, 31));
        assert_eq!(w2.train_start, date(2022, 3, 31));

        let anchored = WalkForwardConfig { anchored: true, ..config };
        assert_eq!(window_bounds(date(2020, 3, 31), 2, &anchored).unwrap().train_start, date(2020, 3, 31));
    }

    #[test]
    fn scores_every_full_window() {
        // 40 entities × 24 quarters: 2020Q1 .. 2025Q4
        let p = linear_panel(40, 24, false, 31);
        let report = walk_forward(&p, "y", &names(&["x1", "x2"]), &WalkForwardConfig::default()).unwrap();
        // test windows end 2024-03-31, 2025-03-31 (2026-03-31 is past the data)
        assert_eq!(report.windows.len(), 2);
        assert!(report.skipped.is_empty());
        for w in &report.windows {
            assert_eq!(w.train_rows, 480);
            assert_eq!(w.test_rows, 160);
            assert!(w.metrics.r_squared > 0.99);
        }
        assert!(report.std_r_squared.unwrap() < 0.01);
    }

    #[test]
    fn thin_windows_are_skipped() {
        let p = linear_panel(3, 24, false, 32);
        let report = walk_forward(&p, "y", &names(&["x1"]), &WalkForwardConfig::default()).unwrap();
        assert!(report.windows.is_empty());
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.mean_r_squared, None);
    }

    #[test]
    fn zero_years_are_rejected() {
        let p = linear_panel(3, 4, false, 33);
        let config = WalkForwardConfig { test_years: 0, ..Default::default() };
        assert!(matches!(
            walk_forward(&p, "y", &names(&["x1"]), &config),
            Err(FitError::InvalidConfig(_))
        ));
    }
}
