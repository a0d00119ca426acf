//! Spreadsheet flattening.
//!
//! Every non-empty sheet becomes a marker line followed by its cells as a
//! header-less JSON matrix:
//!
//! ```text
//! --- SHEET: "Conto Economico" ---
//! [
//!   ["Voce", 2022, 2023],
//!   ["Ricavi", 1200000, 1350000]
//! ]
//! ```
//!
//! Blank rows are dropped, short rows are padded with `""`, and sheets left
//! with no rows are skipped entirely.

use calamine::{Data, DataType, Reader};
use finsight_core::{Error, Result};
use serde_json::Value;
use std::io::Cursor;
use tracing::debug;

use crate::format::DocumentFormat;

/// Name given to the single sheet of a CSV file.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// One sheet's surviving rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetMatrix {
    pub name: String,
    pub rows: Vec<Vec<Value>>,
}

/// The marker line that precedes each rendered sheet.
pub fn sheet_marker(name: &str) -> String {
    format!("--- SHEET: \"{name}\" ---")
}

/// Flatten a workbook (or CSV) into prompt text.
///
/// Fails with [`Error::EmptyDocument`] when the container declares no
/// sheets or every sheet is empty.
pub fn flatten(name: &str, bytes: &[u8], format: DocumentFormat) -> Result<String> {
    let sheets = match format {
        DocumentFormat::Csv => vec![read_csv(name, bytes)?],
        DocumentFormat::Xlsx | DocumentFormat::Xls | DocumentFormat::Ods => {
            read_workbook(name, bytes)?
        }
        DocumentFormat::Pdf => {
            return Err(Error::DocumentDecode {
                name: name.into(),
                reason: "page documents are not tabular".into(),
            });
        }
    };

    let declared = sheets.len();
    let mut text = String::new();
    let mut rendered = 0usize;
    for sheet in &sheets {
        if let Some(block) = render_sheet(sheet)? {
            text.push_str(&block);
            rendered += 1;
        }
    }

    debug!(document = %name, declared, rendered, chars = text.len(), "Flattened workbook");

    if rendered == 0 {
        return Err(Error::EmptyDocument { name: name.into() });
    }
    Ok(text)
}

/// Render one sheet, or `None` when it has no non-blank rows.
pub fn render_sheet(sheet: &SheetMatrix) -> Result<Option<String>> {
    let mut rows: Vec<Vec<Value>> = sheet
        .rows
        .iter()
        .filter(|row| !row.iter().all(is_blank))
        .cloned()
        .collect();

    if rows.is_empty() {
        return Ok(None);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, Value::String(String::new()));
    }

    let matrix = serde_json::to_string_pretty(&rows)?;
    Ok(Some(format!("\n{}\n{}\n", sheet_marker(&sheet.name), matrix)))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn read_workbook(name: &str, bytes: &[u8]) -> Result<Vec<SheetMatrix>> {
    let decode_err = |e: calamine::Error| Error::DocumentDecode {
        name: name.into(),
        reason: e.to_string(),
    };

    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(decode_err)?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet_name).map_err(decode_err)?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_json).collect())
            .collect();
        sheets.push(SheetMatrix {
            name: sheet_name,
            rows,
        });
    }
    Ok(sheets)
}

fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => number_to_json(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => {
                Value::String(dt.date().format("%Y-%m-%d").to_string())
            }
            Some(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => Value::String(cell.to_string()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(e.to_string()),
    }
}

/// Whole floats become integers so `1200000.0` reads as `1200000`.
fn number_to_json(f: f64) -> Value {
    if !f.is_finite() {
        return Value::String(f.to_string());
    }
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Value::from(f as i64);
    }
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}

fn read_csv(name: &str, bytes: &[u8]) -> Result<SheetMatrix> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(bytes))
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::DocumentDecode {
            name: name.into(),
            reason: e.to_string(),
        })?;
        rows.push(record.iter().map(csv_field_to_json).collect());
    }

    Ok(SheetMatrix {
        name: CSV_SHEET_NAME.into(),
        rows,
    })
}

/// European exports often use `;` because `,` is the decimal separator.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let count = |d: u8| first_line.iter().filter(|b| **b == d).count();
    if count(b';') > count(b',') {
        b';'
    } else if count(b'\t') > count(b',') {
        b'\t'
    } else {
        b','
    }
}

/// Account codes such as `0012` stay text so the leading zeros survive.
fn has_leading_zero(field: &str) -> bool {
    let digits = field.strip_prefix(['-', '+']).unwrap_or(field).as_bytes();
    digits.len() > 1 && digits[0] == b'0' && digits[1].is_ascii_digit()
}

fn csv_field_to_json(field: &str) -> Value {
    let trimmed = field.trim();
    if has_leading_zero(trimmed) {
        return Value::String(field.to_string());
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && !trimmed.is_empty() => number_to_json(f),
        _ => Value::String(field.to_string()),
    }
}
