//! CSV ingest and normalization.
//!
//! This module turns an entity×time CSV export into a [`Panel`]:
//!
//! - headers are normalized (trim, BOM strip, lowercase, spaces/dashes → `_`)
//! - the entity and time keys are found among their accepted aliases
//! - each remaining column becomes numeric or text
//! - bad rows are skipped and reported, never silently coerced
//!
//! No feature or fitting logic lives here.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::Panel;
use crate::error::AppError;
use crate::features::MacroSeries;
use crate::prepare::{ENTITY_ALIASES, FIELD_ALIASES, RAW_NUMERIC_FIELDS, REQUIRED_FIELDS, TEXT_FIELDS, TIME_ALIASES, find_alias};

/// Cell values read as missing (compared case-insensitively).
pub const NULL_TOKENS: [&str; 6] = ["", "na", "nan", "null", "none", "n/a"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub entity: Option<String>,
    pub message: String,
}

/// Ingest output: the panel plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedPanel {
    pub panel: Panel,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Text,
}

/// Load a panel CSV from disk.
pub fn load_panel_csv(path: &Path) -> Result<IngestedPanel, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let out = read_panel_csv(file)?;
    info!(
        path = %path.display(),
        rows_read = out.rows_read,
        rows_used = out.rows_used,
        row_errors = out.row_errors.len(),
        "loaded panel CSV"
    );
    Ok(out)
}

/// Parse a panel CSV from any reader.
pub fn read_panel_csv<R: Read>(input: R) -> Result<IngestedPanel, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();
    let header_map = build_header_map(&headers);

    let entity_col = find_alias(&headers, &ENTITY_ALIASES).ok_or_else(|| {
        AppError::new(
            2,
            format!("Missing entity column (expected one of: {}).", ENTITY_ALIASES.join(", ")),
        )
    })?;
    let time_col = find_alias(&headers, &TIME_ALIASES).ok_or_else(|| {
        AppError::new(
            2,
            format!("Missing time column (expected one of: {}).", TIME_ALIASES.join(", ")),
        )
    })?;
    let (entity_idx, time_idx) = (header_map[entity_col], header_map[time_col]);

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header, lines are 1-based
        let line = idx + 2;
        match result {
            Ok(r) => records.push((line, r)),
            Err(e) => row_errors.push(RowError {
                line,
                entity: None,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }
    let rows_read = records.len() + row_errors.len();

    let columns: Vec<(usize, &str, ColumnKind)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != entity_idx && *idx != time_idx)
        .filter(|(idx, name)| header_map.get(name.as_str()) == Some(idx))
        .map(|(idx, name)| (idx, name.as_str(), classify(idx, name, &records)))
        .collect();

    let mut entities = Vec::new();
    let mut times = Vec::new();
    let mut numeric: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len()];
    let mut text: Vec<Vec<Option<String>>> = vec![Vec::new(); columns.len()];

    for (line, record) in &records {
        match parse_row(record, entity_idx, time_idx, &columns) {
            Ok(row) => {
                entities.push(row.entity);
                times.push(row.time);
                for (j, value) in row.values.into_iter().enumerate() {
                    match value {
                        Cell::Number(v) => numeric[j].push(v),
                        Cell::Text(s) => text[j].push(s),
                    }
                }
            }
            Err((entity, message)) => row_errors.push(RowError {
                line: *line,
                entity,
                message,
            }),
        }
    }

    let rows_used = entities.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid rows in panel CSV."));
    }

    let mut panel = Panel::new(entities, times)?;
    for (j, (_, name, kind)) in columns.iter().enumerate() {
        match kind {
            ColumnKind::Numeric => panel.insert_numeric(*name, std::mem::take(&mut numeric[j]))?,
            ColumnKind::Text => panel.insert_text(*name, std::mem::take(&mut text[j]))?,
        }
    }

    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), "skipped malformed CSV rows");
    }

    Ok(IngestedPanel {
        panel,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Load a dated macro series (time column + numeric columns) for the as-of
/// merge.
pub fn load_macro_csv(path: &Path) -> Result<MacroSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open macro CSV '{}': {e}", path.display())))?;
    read_macro_csv(file)
}

pub fn read_macro_csv<R: Read>(input: R) -> Result<MacroSeries, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read macro CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();
    let time_col = find_alias(&headers, &TIME_ALIASES)
        .ok_or_else(|| AppError::new(2, "Macro CSV needs a time/date column."))?;
    let time_idx = build_header_map(&headers)[time_col];

    let mut dates = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];
    let mut skipped = 0usize;
    for result in reader.records() {
        let Ok(record) = result else {
            skipped += 1;
            continue;
        };
        let Some(date) = record.get(time_idx).and_then(|s| parse_date(s).ok()) else {
            skipped += 1;
            continue;
        };
        dates.push(date);
        for (j, col) in values.iter_mut().enumerate() {
            if j != time_idx {
                col.push(record.get(j).and_then(|s| parse_number(s).ok().flatten()));
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "skipped macro CSV rows without a valid date");
    }

    let columns = headers
        .into_iter()
        .zip(values)
        .enumerate()
        .filter(|(j, _)| *j != time_idx)
        .map(|(_, pair)| pair)
        .collect();
    MacroSeries::new(dates, columns).ok_or_else(|| AppError::new(2, "Macro CSV columns have uneven lengths."))
}

enum Cell {
    Number(Option<f64>),
    Text(Option<String>),
}

struct ParsedRow {
    entity: String,
    time: NaiveDate,
    values: Vec<Cell>,
}

fn parse_row(
    record: &StringRecord,
    entity_idx: usize,
    time_idx: usize,
    columns: &[(usize, &str, ColumnKind)],
) -> Result<ParsedRow, (Option<String>, String)> {
    let entity = get_cell(record, entity_idx)
        .ok_or_else(|| (None, "Missing required value: entity".to_string()))?
        .to_string();
    let time = get_cell(record, time_idx)
        .ok_or_else(|| (Some(entity.clone()), "Missing required value: time".to_string()))
        .and_then(|s| parse_date(s).map_err(|e| (Some(entity.clone()), e)))?;

    let mut values = Vec::with_capacity(columns.len());
    for (idx, name, kind) in columns {
        let raw = get_cell(record, *idx);
        values.push(match kind {
            ColumnKind::Text => Cell::Text(raw.map(str::to_string)),
            ColumnKind::Numeric => match raw.map(parse_number).transpose() {
                Ok(v) => Cell::Number(v.flatten()),
                Err(e) => return Err((Some(entity), format!("Column `{name}`: {e}"))),
            },
        });
    }

    Ok(ParsedRow { entity, time, values })
}

/// Known numeric fields are always numeric; known text fields are always
/// text; any other column is numeric only if every non-null value parses.
fn classify(idx: usize, name: &str, records: &[(usize, StringRecord)]) -> ColumnKind {
    if TEXT_FIELDS.contains(&name) {
        return ColumnKind::Text;
    }
    let known_numeric = RAW_NUMERIC_FIELDS.contains(&name)
        || REQUIRED_FIELDS.contains(&name)
        || FIELD_ALIASES.iter().any(|(alias, canonical)| *alias == name && RAW_NUMERIC_FIELDS.contains(canonical));
    if known_numeric {
        return ColumnKind::Numeric;
    }
    let all_numbers = records
        .iter()
        .filter_map(|(_, r)| get_cell(r, idx))
        .all(|s| parse_number(s).is_ok());
    if all_numbers {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

fn build_header_map(headers: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // first occurrence wins for duplicated headers
        map.entry(name.clone()).or_insert(idx);
    }
    map
}

pub fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, key detection fails.
    let name = name.trim().trim_start_matches('\u{feff}').trim();
    name.to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Non-null cell contents (null tokens read as `None`).
fn get_cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !NULL_TOKENS.contains(&s.to_ascii_lowercase().as_str()))
}

/// `Ok(None)` for null tokens and non-finite numbers, `Err` for text.
fn parse_number(s: &str) -> Result<Option<f64>, String> {
    let t = s.trim();
    if NULL_TOKENS.contains(&t.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    let cleaned = t.replace(',', "");
    cleaned
        .parse::<f64>()
        .map(|v| v.is_finite().then_some(v))
        .map_err(|_| format!("'{t}' is not a number"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const DATE_FMTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
    const DATETIME_FMTS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY or YYYY-MM-DD HH:MM:SS."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::date;

    const CSV: &str = "\u{feff}Symbol,Date,Total Assets,net_income,Sector,credit-rating,notes\n\
        AAA,2024-03-31,100,5,Tech,A+,first\n\
        AAA,2024-06-30,NA,6,Tech,A,\n\
        BBB,2024-03-31 00:00:00,200,oops,Energy,BBB,x\n\
        BBB,not-a-date,200,1,Energy,BBB,y\n\
        ,2024-06-30,1,1,Energy,BBB,z\n";

    #[test]
    fn reads_keys_aliases_and_nulls() {
        let out = read_panel_csv(CSV.as_bytes()).unwrap();
        assert_eq!(out.rows_read, 5);
        assert_eq!(out.rows_used, 2);
        assert_eq!(out.row_errors.len(), 3);

        let p = &out.panel;
        assert_eq!(p.entities(), &["AAA".to_string(), "AAA".to_string()]);
        assert_eq!(p.times()[1], date(2024, 6, 30));
        assert_eq!(p.numeric("total_assets").unwrap(), &[Some(100.0), None]);
        assert_eq!(p.text("credit_rating").unwrap()[0].as_deref(), Some("A+"));
        assert_eq!(p.text("sector").unwrap()[1].as_deref(), Some("Tech"));
        assert!(p.has_text("notes"));
    }

    #[test]
    fn bad_numbers_in_known_columns_skip_the_row() {
        let out = read_panel_csv(CSV.as_bytes()).unwrap();
        let err = out.row_errors.iter().find(|e| e.line == 4).unwrap();
        assert_eq!(err.entity.as_deref(), Some("BBB"));
        assert!(err.message.contains("net_income"));
    }

    #[test]
    fn missing_key_columns_exit_2() {
        let err = read_panel_csv("name,value\nx,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let csv = "ticker,date,x\nA,2024-01-01,1\nA,2024-01-01,2\n";
        assert!(read_panel_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn macro_series_parses_dates_and_values() {
        let csv = "date,risk_free_rate,index_return\n2024-01-01,5.1,0.2\n2023-12-01,5.0,\n";
        let series = read_macro_csv(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.column_names(), vec!["risk_free_rate", "index_return"]);
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header_name("\u{feff} Total-Assets "), "total_assets");
    }
}
