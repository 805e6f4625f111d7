//! Export engineered tables and run results.
//!
//! The CSV export is meant to be easy to consume in spreadsheets or downstream
//! scripts: one row per (entity, time), missing cells left empty.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::Panel;
use crate::error::AppError;

/// Write a panel to CSV.
///
/// Columns: `entity`, `time`, text columns, numeric columns, then one
/// `{field}_imputed` flag column per imputed field. Rows are written in
/// `(entity, time)` order.
pub fn write_panel_csv(path: &Path, panel: &Panel) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_panel(file, panel)
}

pub fn write_panel<W: Write>(out: W, panel: &Panel) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let text_names = panel.text_names();
    let numeric_names = panel.numeric_names();
    let imputed_names = panel.imputed_names();

    let mut header = vec!["entity".to_string(), "time".to_string()];
    header.extend(text_names.iter().cloned());
    header.extend(numeric_names.iter().cloned());
    header.extend(imputed_names.iter().map(|n| format!("{n}_imputed")));
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    let text: Vec<&[Option<String>]> = text_names.iter().filter_map(|n| panel.text(n)).collect();
    let numeric: Vec<&[Option<f64>]> = numeric_names.iter().filter_map(|n| panel.numeric(n)).collect();
    let imputed: Vec<&[bool]> = imputed_names.iter().filter_map(|n| panel.imputed(n)).collect();

    for i in panel.entity_time_order() {
        let mut record = Vec::with_capacity(header.len());
        record.push(panel.entities()[i].clone());
        record.push(panel.times()[i].format("%Y-%m-%d").to_string());
        record.extend(text.iter().map(|c| c[i].clone().unwrap_or_default()));
        record.extend(numeric.iter().map(|c| c[i].map(|v| v.to_string()).unwrap_or_default()));
        record.extend(imputed.iter().map(|c| c[i].to_string()));
        writer
            .write_record(&record)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))
}

/// Write any serializable result as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;
    use crate::io::ingest::read_panel_csv;

    #[test]
    fn export_reads_back_through_ingest() {
        let mut p = quarterly_panel(&["B", "A"], 2);
        p.insert_numeric("roa", vec![Some(1.5), None, Some(-0.25), Some(2.0)]).unwrap();
        p.insert_text("sector", vec![Some("Tech".into()), None, Some("Energy".into()), None])
            .unwrap();
        p.insert_imputed("roa", vec![false, true, false, false]).unwrap();

        let mut buf = Vec::new();
        write_panel(&mut buf, &p).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("entity,time,sector,roa,roa_imputed\n"));
        assert!(text.lines().nth(1).unwrap().starts_with("A,2020-03-31,Energy,-0.25,false"));

        let back = read_panel_csv(text.as_bytes()).unwrap();
        assert_eq!(back.rows_used, 4);
        assert_eq!(back.panel.numeric("roa").unwrap().iter().flatten().count(), 3);
    }
}
