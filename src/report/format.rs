//! Formatted terminal output.
//!
//! We keep formatting code in one place so the fitting code stays free of
//! presentation details and output changes are localized.

use crate::domain::{
    CovarianceKind, EstimatorKind, ImportanceRow, ModelArtifact, ResidualDiagnostics, TestStatistic,
};
use crate::features::{AbsentFeature, FeatureStats};
use crate::prepare::{PreparationReport, ReadinessReport};
use crate::report::model_report;
use crate::validate::{RobustnessEntry, RobustnessReport, WalkForwardReport};

/// Full summary of one fitted model: fit statistics, coefficients, dropped
/// columns and residual diagnostics.
pub fn format_model_summary(model: &ModelArtifact) -> String {
    let report = model_report(model);
    let s = &report.stats;
    let mut out = String::new();

    out.push_str(&format!("=== {} ===\n", report.display_name));
    out.push_str(&format!("Target: {}\n", report.target));
    out.push_str(&format!(
        "Sample: n={} | params={} | df_resid={:.0}\n",
        s.n_obs, s.n_params, s.df_resid
    ));
    let r2_label = match model.estimator {
        EstimatorKind::PanelFe => "R² (within)",
        _ => "R²",
    };
    out.push_str(&format!(
        "{r2_label}={:.4} | adj R²={:.4} | RMSE={:.4} | MAE={:.4}\n",
        s.r_squared, s.adj_r_squared, s.rmse, s.mae
    ));
    if let (Some(aic), Some(bic)) = (s.aic, s.bic) {
        out.push_str(&format!("AIC={aic:.2} | BIC={bic:.2}\n"));
    }
    out.push_str(&format!("Std. errors: {}\n", covariance_label(report.covariance)));
    if let (Some(used), Some(skipped), Some(dof)) = (report.periods_used, report.periods_skipped, report.t_dof) {
        out.push_str(&format!(
            "Periods: used={used} skipped={skipped} | t dof={dof:.0}"
        ));
        if let Some(r2) = report.mean_period_r_squared {
            out.push_str(&format!(" | mean cross-sectional R²={r2:.4}"));
        }
        out.push('\n');
    }
    if let Some(n) = report.entity_effects {
        out.push_str(&format!("Entity effects: {n}\n"));
    }

    out.push_str("\nCoefficients:\n");
    let rows: Vec<ImportanceRow> = report
        .intercept
        .iter()
        .chain(&model.coefficients)
        .map(ImportanceRow::from)
        .collect();
    out.push_str(&coefficient_table(&rows));

    if !report.dropped.is_empty() {
        out.push_str("\nDropped:\n");
        for d in &report.dropped {
            out.push_str(&format!("- {}: {}\n", d.name, d.reason));
        }
    }

    if model.estimator != EstimatorKind::FamaMacBeth {
        out.push('\n');
        out.push_str(&format_diagnostics(&report.diagnostics));
    }
    out.push_str("\nSignificance: *** p<0.01, ** p<0.05, * p<0.10\n");

    out
}

/// Slopes ranked by p-value.
pub fn format_importance(rows: &[ImportanceRow]) -> String {
    let mut out = String::from("Feature importance (by p-value):\n");
    out.push_str(&coefficient_table(rows));
    out
}

pub fn format_diagnostics(diag: &ResidualDiagnostics) -> String {
    let mut out = String::from("Residual diagnostics:\n");
    match diag.durbin_watson {
        Some(dw) => out.push_str(&format!("- Durbin-Watson: {dw:.4}\n")),
        None => out.push_str("- Durbin-Watson: n/a\n"),
    }
    out.push_str(&format!("- Breusch-Pagan: {}\n", fmt_test(diag.breusch_pagan)));
    out.push_str(&format!("- Jarque-Bera : {}\n", fmt_test(diag.jarque_bera)));
    out
}

pub fn format_walk_forward(report: &WalkForwardReport) -> String {
    let mut out = String::new();
    let c = &report.config;
    out.push_str(&format!(
        "Walk-forward ({} train {}y / test {}y, step {}y):\n",
        if c.anchored { "anchored" } else { "rolling" },
        c.train_years,
        c.test_years,
        c.step_years
    ));

    push_line(
        &mut out,
        format!(
            "{:<10} {:<10} {:<10} {:>7} {:>7} {:>9} {:>9}",
            "train_from", "test_from", "test_to", "n_train", "n_test", "R²", "RMSE"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<10} {:-<10} {:-<10} {:-<7} {:-<7} {:-<9} {:-<9}",
            "", "", "", "", "", "", ""
        ),
    );
    for w in &report.windows {
        push_line(
            &mut out,
            format!(
                "{:<10} {:<10} {:<10} {:>7} {:>7} {:>9.4} {:>9.4}",
                w.bounds.train_start,
                w.bounds.test_start,
                w.bounds.test_end,
                w.train_rows,
                w.test_rows,
                w.metrics.r_squared,
                w.metrics.rmse
            ),
        );
    }
    for s in &report.skipped {
        out.push_str(&format!(
            "  (skipped {} .. {}) {}\n",
            s.bounds.train_start, s.bounds.test_end, s.reason
        ));
    }
    out.push_str(&format!(
        "Mean R²={} | std R²={} | mean RMSE={}\n",
        fmt_opt(report.mean_r_squared, 4),
        fmt_opt(report.std_r_squared, 4),
        fmt_opt(report.mean_rmse, 4)
    ));
    out
}

pub fn format_robustness(report: &RobustnessReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Robustness (pooled OLS, target {}):\n", report.target));
    out.push_str("Winsorization levels:\n");
    out.push_str(&robustness_table(&report.winsorization));
    out.push_str("\nFeature subsets:\n");
    out.push_str(&robustness_table(&report.subsets));
    out
}

pub fn format_feature_summary(stats: &[FeatureStats], absent: &[AbsentFeature]) -> String {
    let mut out = String::from("Feature summary:\n");
    push_line(
        &mut out,
        format!(
            "{:<32} {:<13} {:>6} {:>8} {:>11} {:>11} {:>11} {:>11}",
            "feature", "category", "count", "missing%", "mean", "std", "min", "max"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<32} {:-<13} {:-<6} {:-<8} {:-<11} {:-<11} {:-<11} {:-<11}",
            "", "", "", "", "", "", "", ""
        ),
    );
    for s in stats {
        push_line(
            &mut out,
            format!(
                "{:<32} {:<13} {:>6} {:>8.1} {:>11} {:>11} {:>11} {:>11}",
                truncate(&s.feature, 32),
                s.category.as_str(),
                s.count,
                s.missing_pct,
                fmt_opt(s.mean, 4),
                fmt_opt(s.std, 4),
                fmt_opt(s.min, 4),
                fmt_opt(s.max, 4)
            ),
        );
    }
    if !absent.is_empty() {
        out.push_str("\nAbsent features:\n");
        for a in absent {
            out.push_str(&format!("- {} (missing: {})\n", a.feature, a.missing_columns.join(", ")));
        }
    }
    out
}

pub fn format_readiness(report: &ReadinessReport) -> String {
    let mut out = String::from("Panel readiness:\n");
    out.push_str(&format!(
        "Entities={} | observations={} | per entity={:.1}\n",
        report.entities, report.observations, report.observations_per_entity
    ));
    if let Some((from, to)) = report.date_range {
        out.push_str(&format!("Dates: {from} .. {to}\n"));
    }
    for (var, pct) in &report.coverage {
        out.push_str(&format!("- coverage {var:<14} {pct:>6.1}%\n"));
    }
    for c in &report.checks {
        let mark = if c.passed { "ok  " } else { "FAIL" };
        out.push_str(&format!("[{mark}] {:<12} {}\n", c.name, c.detail));
    }
    out.push_str(&format!(
        "Score={:.0} | ready={}\n",
        report.score,
        if report.ready { "yes" } else { "no" }
    ));
    out
}

pub fn format_preparation(report: &PreparationReport) -> String {
    let mut out = String::new();
    for (from, to) in &report.renamed {
        out.push_str(&format!("renamed {from} -> {to}\n"));
    }
    for (field, n) in &report.backfilled {
        out.push_str(&format!("back-filled {field}: {n} rows\n"));
    }
    for (field, n) in &report.imputed {
        out.push_str(&format!("imputed {field}: {n} rows (flagged)\n"));
    }
    if !report.created.is_empty() {
        out.push_str(&format!("not derivable: {}\n", report.created.join(", ")));
    }
    out
}

fn coefficient_table(rows: &[ImportanceRow]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<32} {:>12} {:>11} {:>9} {:>9} {:<3}",
            "feature", "coef", "std_err", "t", "p", ""
        ),
    );
    push_line(
        &mut out,
        format!("{:-<32} {:-<12} {:-<11} {:-<9} {:-<9} {:-<3}", "", "", "", "", "", ""),
    );
    for r in rows {
        push_line(
            &mut out,
            format!(
                "{:<32} {:>12.6} {:>11} {:>9} {:>9} {:<3}",
                truncate(&r.feature, 32),
                r.coefficient,
                fmt_opt(r.std_error, 6),
                fmt_opt(r.t_statistic, 3),
                fmt_opt(r.p_value, 4),
                r.significance.marker()
            ),
        );
    }
    out
}

fn robustness_table(entries: &[RobustnessEntry]) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!("{:<20} {:>8} {:>6} {:>9} {:>12}", "config", "features", "n", "R²", "AIC"),
    );
    push_line(
        &mut out,
        format!("{:-<20} {:-<8} {:-<6} {:-<9} {:-<12}", "", "", "", "", ""),
    );
    for e in entries {
        let mut line = format!(
            "{:<20} {:>8} {:>6} {:>9} {:>12}",
            truncate(&e.label, 20),
            e.features.len(),
            e.n_obs.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
            fmt_opt(e.r_squared, 4),
            fmt_opt(e.aic, 2)
        );
        if let Some(err) = &e.error {
            line.push_str(&format!("  ({err})"));
        }
        push_line(&mut out, line);
    }
    out
}

fn covariance_label(kind: CovarianceKind) -> &'static str {
    match kind {
        CovarianceKind::Hc3 => "HC3 heteroscedasticity-robust",
        CovarianceKind::ClusteredEntity => "clustered by entity",
        CovarianceKind::FamaMacBeth => "Fama-MacBeth (time-series of period estimates)",
    }
}

fn fmt_test(t: Option<TestStatistic>) -> String {
    match t {
        Some(t) => format!("stat={:.4} p={:.4} (dof={:.0})", t.statistic, t.p_value, t.dof),
        None => "n/a".to_string(),
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "-".to_string(),
    }
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::test_data::{linear_panel, names};
    use crate::fit::{fit_fama_macbeth, fit_pooled_ols};

    #[test]
    fn model_summary_lists_coefficients_and_markers() {
        let p = linear_panel(10, 6, false, 41);
        let model = fit_pooled_ols(&p, "y", &names(&["x1", "x2"])).unwrap();
        let text = format_model_summary(&model);
        assert!(text.starts_with("=== Pooled OLS (HC3) ==="));
        assert!(text.contains("const"));
        assert!(text.contains("x1"));
        assert!(text.contains("***"));
        assert!(text.contains("Durbin-Watson"));
    }

    #[test]
    fn fama_macbeth_summary_shows_periods_not_diagnostics() {
        let p = linear_panel(12, 4, false, 42);
        let model = fit_fama_macbeth(&p, "y", &names(&["x1"])).unwrap();
        let text = format_model_summary(&model);
        assert!(text.contains("Periods: used=4 skipped=0 | t dof=3"));
        assert!(!text.contains("Durbin-Watson"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }

    #[test]
    fn lines_have_no_trailing_spaces() {
        let rows = vec![ImportanceRow {
            feature: "roa".to_string(),
            coefficient: 1.0,
            std_error: None,
            t_statistic: None,
            p_value: None,
            significance: crate::domain::Significance::NotSignificant,
        }];
        let text = format_importance(&rows);
        assert!(text.lines().all(|l| l == l.trim_end()));
    }
}
