//! Is a panel large and complete enough for panel regressions?

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Panel;

pub const MIN_ENTITIES: usize = 50;
pub const MIN_OBSERVATIONS: usize = 1000;
pub const MIN_COVERAGE_PCT: f64 = 70.0;
pub const MIN_OBS_PER_ENTITY: f64 = 4.0;
/// Score (percent of checks passed) at which a panel counts as ready.
pub const READY_SCORE: f64 = 75.0;

pub const KEY_VARIABLES: [&str; 4] = ["roa", "leverage", "current_ratio", "total_assets"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub entities: usize,
    pub observations: usize,
    pub observations_per_entity: f64,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Percent of rows with an observed (not imputed) value, per key variable.
    pub coverage: BTreeMap<String, f64>,
    pub checks: Vec<ReadinessCheck>,
    pub score: f64,
    pub ready: bool,
}

pub fn assess_readiness(panel: &Panel) -> ReadinessReport {
    let entities = panel.distinct_entities();
    let observations = panel.len();
    let per_entity = if entities == 0 {
        0.0
    } else {
        observations as f64 / entities as f64
    };

    let coverage: BTreeMap<String, f64> = KEY_VARIABLES
        .iter()
        .map(|v| (v.to_string(), coverage_pct(panel, v)))
        .collect();

    let mut checks = vec![
        ReadinessCheck {
            name: "entities".to_string(),
            passed: entities >= MIN_ENTITIES,
            detail: format!("{entities} entities (need {MIN_ENTITIES})"),
        },
        ReadinessCheck {
            name: "observations".to_string(),
            passed: observations >= MIN_OBSERVATIONS,
            detail: format!("{observations} observations (need {MIN_OBSERVATIONS})"),
        },
    ];
    let weakest = coverage
        .iter()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, v)| (k.clone(), *v));
    checks.push(ReadinessCheck {
        name: "coverage".to_string(),
        passed: coverage.values().all(|c| *c >= MIN_COVERAGE_PCT),
        detail: match weakest {
            Some((var, pct)) => format!("lowest coverage {var} {pct:.1}% (need {MIN_COVERAGE_PCT}%)"),
            None => "no key variables".to_string(),
        },
    });
    checks.push(ReadinessCheck {
        name: "history".to_string(),
        passed: per_entity >= MIN_OBS_PER_ENTITY,
        detail: format!("{per_entity:.1} observations per entity (need {MIN_OBS_PER_ENTITY})"),
    });

    let passed = checks.iter().filter(|c| c.passed).count();
    let score = 100.0 * passed as f64 / checks.len() as f64;

    ReadinessReport {
        entities,
        observations,
        observations_per_entity: per_entity,
        date_range: panel.date_range(),
        coverage,
        checks,
        score,
        ready: score >= READY_SCORE,
    }
}

fn coverage_pct(panel: &Panel, column: &str) -> f64 {
    let Some(values) = panel.numeric(column) else {
        return 0.0;
    };
    if values.is_empty() {
        return 0.0;
    }
    let imputed = panel.imputed(column);
    let observed = values
        .iter()
        .enumerate()
        .filter(|(i, v)| v.is_some() && !imputed.is_some_and(|f| f[*i]))
        .count();
    100.0 * observed as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;

    #[test]
    fn small_panel_is_not_ready() {
        let mut p = quarterly_panel(&["A", "B"], 4);
        for v in KEY_VARIABLES {
            p.insert_numeric(v, vec![Some(1.0); 8]).unwrap();
        }
        let r = assess_readiness(&p);
        assert_eq!(r.entities, 2);
        assert_eq!(r.observations_per_entity, 4.0);
        // coverage and history pass, size checks fail
        assert_eq!(r.score, 50.0);
        assert!(!r.ready);
    }

    #[test]
    fn imputed_cells_do_not_count_as_coverage() {
        let mut p = quarterly_panel(&["A"], 4);
        p.insert_numeric("roa", vec![Some(0.0); 4]).unwrap();
        p.insert_imputed("roa", vec![true, true, false, false]).unwrap();
        let r = assess_readiness(&p);
        assert_eq!(r.coverage["roa"], 50.0);
        assert_eq!(r.coverage["leverage"], 0.0);
    }

    #[test]
    fn large_complete_panel_is_ready() {
        let names: Vec<String> = (0..50).map(|i| format!("E{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut p = quarterly_panel(&refs, 20);
        for v in KEY_VARIABLES {
            p.insert_numeric(v, vec![Some(1.0); p.len()]).unwrap();
        }
        let r = assess_readiness(&p);
        assert_eq!(r.observations, 1000);
        assert_eq!(r.score, 100.0);
        assert!(r.ready);
    }
}
