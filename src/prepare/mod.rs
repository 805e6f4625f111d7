//! Panel Preparer.
//!
//! Turns a raw observation table into the canonical schema:
//!
//! - field aliases are renamed to canonical names
//! - structurally derivable fields are back-filled cell by cell wherever the
//!   authoritative value is missing
//! - every downstream field exists as a column afterwards; what is still
//!   undefined is either left missing or replaced by a neutral default and
//!   flagged, depending on the [`ImputationPolicy`]

pub mod readiness;

pub use readiness::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{ImputationPolicy, NumericColumn, Panel, safe_div};
use crate::features::pct_change_by_entity;

/// Header spellings accepted for the entity key.
pub const ENTITY_ALIASES: [&str; 4] = ["entity", "symbol", "ticker", "company_id"];

/// Header spellings accepted for the time key.
pub const TIME_ALIASES: [&str; 7] = [
    "time",
    "date",
    "period",
    "period_end",
    "report_date",
    "datetime",
    "timestamp",
];

/// `(alias, canonical)` field names.
pub const FIELD_ALIASES: [(&str, &str); 12] = [
    ("revenue", "total_revenue"),
    ("revenues", "total_revenue"),
    ("sales", "total_revenue"),
    ("assets", "total_assets"),
    ("liabilities", "total_liabilities"),
    ("debt", "total_debt"),
    ("stockholders_equity", "equity"),
    ("shareholders_equity", "equity"),
    ("price", "close_price"),
    ("close", "close_price"),
    ("spread", "cds_spread"),
    ("rating", "credit_rating"),
];

/// Raw numeric inputs of the canonical schema.
pub const RAW_NUMERIC_FIELDS: [&str; 17] = [
    "total_revenue",
    "net_income",
    "total_assets",
    "total_liabilities",
    "equity",
    "total_debt",
    "retained_earnings",
    "current_assets",
    "current_liabilities",
    "free_cash_flow",
    "close_price",
    "equity_value",
    "debt_value",
    "equity_volatility",
    "stock_return",
    "market_cap",
    "cds_spread",
];

/// Classification and rating fields, kept as text.
pub const TEXT_FIELDS: [&str; 7] = [
    "sector",
    "industry",
    "region",
    "credit_rating",
    "rating",
    "company",
    "name",
];

/// Fields every downstream stage can rely on being present as columns.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "leverage",
    "current_ratio",
    "roa",
    "revenue_growth",
    "equity_value",
    "debt_value",
];

/// Neutral values used by [`ImputationPolicy::Defaults`].
pub const IMPUTATION_DEFAULTS: [(&str, f64); 4] = [
    ("leverage", 0.3),
    ("current_ratio", 1.2),
    ("revenue_growth", 3.0),
    ("roa", 0.0),
];

/// First header matching one of `aliases` (headers are expected normalized).
pub fn find_alias<'a>(headers: &'a [String], aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .find_map(|a| headers.iter().find(|h| h.as_str() == *a))
        .map(String::as_str)
}

/// What the preparer changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparationReport {
    /// `(from, to)` column renames.
    pub renamed: Vec<(String, String)>,
    /// Cells filled from other fields, per field.
    pub backfilled: BTreeMap<String, usize>,
    /// Cells set to a neutral default, per field.
    pub imputed: BTreeMap<String, usize>,
    /// Required fields created as columns because nothing could derive them.
    pub created: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PreparedPanel {
    pub panel: Panel,
    pub report: PreparationReport,
}

#[derive(Debug, Clone, Copy)]
pub struct PanelPreparer {
    policy: ImputationPolicy,
}

impl Default for PanelPreparer {
    fn default() -> Self {
        Self::new(ImputationPolicy::Missing)
    }
}

impl PanelPreparer {
    pub fn new(policy: ImputationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ImputationPolicy {
        self.policy
    }

    pub fn prepare(&self, raw: &Panel) -> PreparedPanel {
        let mut panel = raw.clone();
        let mut report = PreparationReport::default();

        for (alias, canonical) in FIELD_ALIASES {
            if panel.rename_column(alias, canonical) {
                debug!(from = alias, to = canonical, "renamed column");
                report.renamed.push((alias.to_string(), canonical.to_string()));
            }
        }

        backfill(&mut panel, &mut report);

        for field in REQUIRED_FIELDS {
            if !panel.has_numeric(field) {
                panel.insert_derived(field, vec![None; panel.len()]);
                report.created.push(field.to_string());
            }
        }

        if self.policy == ImputationPolicy::Defaults {
            impute_defaults(&mut panel, &mut report);
        }

        info!(
            rows = panel.len(),
            backfilled = report.backfilled.values().sum::<usize>(),
            imputed = report.imputed.values().sum::<usize>(),
            policy = ?self.policy,
            "prepared panel"
        );
        PreparedPanel { panel, report }
    }
}

fn backfill(panel: &mut Panel, report: &mut PreparationReport) {
    let source = panel.clone();
    let col = |name: &str| source.numeric(name);
    let n = source.len();
    let assets: Option<Vec<Option<f64>>> =
        col("total_assets").map(|ta| ta.iter().map(|a| a.filter(|a| *a > 0.0)).collect());

    // leverage: total_debt / total_assets, else total_liabilities / total_assets
    if let Some(ta) = &assets {
        let derived: NumericColumn = (0..n)
            .map(|i| {
                let debt = col("total_debt").and_then(|d| d[i]);
                let liab = col("total_liabilities").and_then(|l| l[i]);
                safe_div(debt, ta[i]).or_else(|| safe_div(liab, ta[i]))
            })
            .collect();
        fill(panel, report, "leverage", derived);

        if let Some(ni) = col("net_income") {
            let derived = (0..n).map(|i| safe_div(ni[i], ta[i]).map(|r| r * 100.0)).collect();
            fill(panel, report, "roa", derived);
        }
    }

    if let (Some(ca), Some(cl)) = (col("current_assets"), col("current_liabilities")) {
        let derived = ca.iter().zip(cl).map(|(a, l)| safe_div(*a, *l)).collect();
        fill(panel, report, "current_ratio", derived);
    }

    if let Some(rev) = col("total_revenue") {
        let derived = pct_change_by_entity(&source, rev)
            .into_iter()
            .map(|g| g.map(|g| g * 100.0))
            .collect();
        fill(panel, report, "revenue_growth", derived);
    }

    // equity_value: equity, else total_assets - total_liabilities
    if col("equity").is_some() || (col("total_assets").is_some() && col("total_liabilities").is_some()) {
        let derived = (0..n)
            .map(|i| {
                col("equity").and_then(|e| e[i]).or_else(|| {
                    let ta = col("total_assets").and_then(|a| a[i])?;
                    let tl = col("total_liabilities").and_then(|l| l[i])?;
                    Some(ta - tl)
                })
            })
            .collect();
        fill(panel, report, "equity_value", derived);
    }

    // debt_value: total_debt, else total_liabilities
    if col("total_debt").is_some() || col("total_liabilities").is_some() {
        let derived = (0..n)
            .map(|i| {
                col("total_debt")
                    .and_then(|d| d[i])
                    .or_else(|| col("total_liabilities").and_then(|l| l[i]))
            })
            .collect();
        fill(panel, report, "debt_value", derived);
    }
}

/// Fill the missing cells of `field` from `derived`, creating the column when
/// it does not exist yet.
fn fill(panel: &mut Panel, report: &mut PreparationReport, field: &str, derived: NumericColumn) {
    let existing = panel.numeric(field).map(<[_]>::to_vec);
    let mut filled = 0;
    let values: NumericColumn = match existing {
        Some(current) => current
            .into_iter()
            .zip(derived)
            .map(|(cur, d)| {
                if cur.is_none() && d.is_some() {
                    filled += 1;
                }
                cur.or(d)
            })
            .collect(),
        None => {
            filled = derived.iter().flatten().count();
            derived
        }
    };
    if filled > 0 {
        *report.backfilled.entry(field.to_string()).or_default() += filled;
    }
    panel.insert_derived(field, values);
}

fn impute_defaults(panel: &mut Panel, report: &mut PreparationReport) {
    for (field, default) in IMPUTATION_DEFAULTS {
        let Some(current) = panel.numeric(field) else {
            continue;
        };
        let flags: Vec<bool> = current.iter().map(Option::is_none).collect();
        let values: NumericColumn = current.iter().map(|v| v.or(Some(default))).collect();
        let count = flags.iter().filter(|f| **f).count();
        if count > 0 {
            report.imputed.insert(field.to_string(), count);
        }
        panel.insert_derived(field, values);
        if panel.insert_imputed(field, flags).is_err() {
            debug!(field, "imputed flag length mismatch");
        }
    }
}
