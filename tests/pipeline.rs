use cds_panel::data::{SPREAD_PROCESS, SyntheticConfig, generate_panel};
use cds_panel::domain::{EstimatorKind, Panel};
use cds_panel::features::{FeatureEngineer, FeatureTable};
use cds_panel::fit::{COLLINEAR_REASON, fit_fama_macbeth, fit_model, fit_panel_fe, fit_pooled_ols};
use cds_panel::io::{load_panel_csv, write_panel_csv};
use cds_panel::prepare::PanelPreparer;
use cds_panel::validate::{
    DEFAULT_ROBUST_LEVELS, RobustnessConfig, WalkForwardConfig, default_subsets, robustness_sweep, walk_forward,
};

const TARGET: &str = "log_cds_spread";

fn raw_panel() -> Panel {
    generate_panel(&SyntheticConfig {
        entities: 60,
        periods: 32,
        seed: 11,
        ..SyntheticConfig::default()
    })
    .unwrap()
    .panel
}

fn engineered(level: f64) -> (FeatureEngineer, FeatureTable) {
    let prepared = PanelPreparer::default().prepare(&raw_panel());
    let engineer = FeatureEngineer::new(level).unwrap();
    let table = engineer.engineer(&prepared.panel, Some("cds_spread"));
    (engineer, table)
}

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn truth_features() -> Vec<String> {
    names(&["leverage", "roa", "credit_rating_numeric", "equity_volatility"])
}

#[test]
fn fixed_effects_recover_the_spread_process() {
    let (_, features) = engineered(0.001);
    assert_eq!(features.target.as_deref(), Some(TARGET));

    let model = fit_panel_fe(&features.table, TARGET, &truth_features()).unwrap();
    let p = SPREAD_PROCESS;
    let lev = model.coefficient("leverage").unwrap();
    assert!((lev.estimate - p.leverage).abs() < 0.3, "leverage={}", lev.estimate);
    let roa = model.coefficient("roa").unwrap();
    assert!((roa.estimate - p.roa).abs() < 0.02, "roa={}", roa.estimate);
    let vol = model.coefficient("equity_volatility").unwrap();
    assert!((vol.estimate - p.equity_volatility).abs() < 0.3, "vol={}", vol.estimate);
    assert!(lev.p_value.unwrap() < 0.01);
    assert_eq!(model.entity_effects.as_ref().unwrap().len(), 60);
}

#[test]
fn fama_macbeth_uses_period_count_for_inference() {
    let (_, features) = engineered(0.001);
    let model = fit_fama_macbeth(&features.table, TARGET, &truth_features()).unwrap();
    let detail = model.fama_macbeth.as_ref().unwrap();
    assert_eq!(detail.periods_used + detail.periods_skipped, 32);
    assert_eq!(detail.t_dof, (detail.periods_used - 1) as f64);
    assert!(model.stats.aic.is_none());

    let lev = model.coefficient("leverage").unwrap();
    assert!((lev.estimate - SPREAD_PROCESS.leverage).abs() < 0.75, "leverage={}", lev.estimate);
}

#[test]
fn pooled_fit_drops_a_duplicated_feature() {
    let (_, features) = engineered(0.01);
    let leverage = features.table.numeric("leverage").unwrap().to_vec();
    let table = features.table.with_numeric("leverage_copy", leverage).unwrap();

    let model = fit_pooled_ols(&table, TARGET, &names(&["leverage", "roa", "leverage_copy"])).unwrap();
    assert_eq!(model.kept_features(), names(&["leverage", "roa"]));
    assert_eq!(model.dropped.len(), 1);
    assert_eq!(model.dropped[0].name, "leverage_copy");
    assert_eq!(model.dropped[0].reason, COLLINEAR_REASON);
    assert!(model.stats.aic.is_some());
}

#[test]
fn every_estimator_predicts_in_sample() {
    let (_, features) = engineered(0.01);
    for kind in EstimatorKind::ALL {
        let model = fit_model(kind, &features.table, TARGET, &truth_features()).unwrap();
        let predicted = model.predict(&features.table);
        assert_eq!(predicted.len(), features.table.len());
        assert!(predicted.iter().flatten().count() > features.table.len() / 2, "{kind}");
    }
}

#[test]
fn walk_forward_rolls_over_calendar_years() {
    let (_, features) = engineered(0.01);
    let report = walk_forward(&features.table, TARGET, &truth_features(), &WalkForwardConfig::default()).unwrap();

    assert!(report.windows.len() >= 3, "windows={}", report.windows.len());
    for pair in report.windows.windows(2) {
        assert!(pair[0].bounds.train_start < pair[1].bounds.train_start);
    }
    assert!(report.mean_r_squared.unwrap() > 0.3);
    assert!(report.std_r_squared.unwrap() >= 0.0);
}

#[test]
fn robustness_reports_every_configuration() {
    let (engineer, features) = engineered(0.01);
    let model_features = names(&["leverage", "roa", "naive_dtd", "credit_rating_numeric", "log_market_cap"]);
    let config = RobustnessConfig {
        winsorize_levels: DEFAULT_ROBUST_LEVELS.to_vec(),
        subsets: default_subsets(&model_features, engineer.rolling_window()),
    };

    let report = robustness_sweep(&engineer, &features, "cds_spread", &model_features, &config).unwrap();
    assert_eq!(report.winsorization.len(), DEFAULT_ROBUST_LEVELS.len());
    assert_eq!(report.subsets.len(), config.subsets.len());
    for entry in report.winsorization.iter().chain(&report.subsets) {
        assert!(entry.r_squared.is_some() || entry.error.is_some(), "{}", entry.label);
    }
    assert!(report.winsorization.iter().all(|e| e.r_squared.is_some()));
}

#[test]
fn csv_export_round_trips_through_ingest() {
    let raw = raw_panel();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panel.csv");

    write_panel_csv(&path, &raw).unwrap();
    let loaded = load_panel_csv(&path).unwrap();

    assert!(loaded.row_errors.is_empty());
    assert_eq!(loaded.rows_used, raw.len());
    assert_eq!(loaded.panel, raw);
}
