//! Delimited text (CSV, TSV, ...) reading and writing, and the CSV ↔ JSON conversions.

use std::collections::HashSet;

use encoding_rs::Encoding;
use serde::Deserialize;
use serde_json::Value;

use crate::encoding::{decode_text, lookup};
use crate::error::{ConvertError, Result};
use crate::json::{parse_json, to_json_text};
use crate::limits::Limits;
use crate::tabular::{Conversion, Table};

/// CSV delimiter, encoding and header configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub has_header: bool,
}

impl Dialect {
    pub fn new(delimiter: &str, encoding: &str, has_header: bool) -> Result<Self> {
        Ok(Self {
            delimiter: parse_delimiter(delimiter)?,
            encoding: lookup(encoding)?,
            has_header,
        })
    }
}

/// Parse a delimiter option. It must be a single ASCII character; `\t` and
/// `tab` select a tab.
pub fn parse_delimiter(delimiter: &str) -> Result<u8> {
    match delimiter {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        d if d.len() == 1 && d.is_ascii() && d != "\"" && d != "\n" && d != "\r" => {
            Ok(d.as_bytes()[0])
        }
        d => Err(ConvertError::InvalidOption(format!(
            "Delimiter must be a single ASCII character, got '{d}'"
        ))),
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvToJsonOptions {
    pub delimiter: String,
    pub encoding: String,
    pub has_header: bool,
    pub pretty: bool,
}

impl Default for CsvToJsonOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            encoding: default_encoding(),
            has_header: true,
            pretty: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JsonToCsvOptions {
    pub delimiter: String,
    pub has_header: bool,
}

impl Default for JsonToCsvOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_header: true,
        }
    }
}

/// Read every record of a delimited document.
///
/// Rows may differ in length. Reading stops with a size-limit error as soon
/// as the number of data rows exceeds `max_rows`; the header row, when
/// present, does not count.
pub fn read_rows(input: &[u8], dialect: &Dialect, max_rows: usize) -> Result<Vec<Vec<String>>> {
    let text = decode_text(input, dialect.encoding)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let allowed = max_rows + usize::from(dialect.has_header);
    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            ConvertError::Malformed(format!("Invalid CSV at record {}: {e}", index + 1))
        })?;
        if rows.len() == allowed {
            return Err(ConvertError::SizeLimit(format!(
                "CSV input exceeds the limit of {max_rows} rows"
            )));
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(ConvertError::Malformed("CSV input is empty".to_string()));
    }
    Ok(rows)
}

/// Write rows as delimited text, with an optional header line first.
pub fn write_rows(header: Option<&[String]>, rows: &[Vec<String>], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(Vec::new());

    let write_err = |e: csv::Error| ConvertError::Malformed(format!("Failed to write CSV: {e}"));
    if let Some(header) = header {
        writer.write_record(header).map_err(write_err)?;
    }
    for row in rows {
        writer.write_record(row).map_err(write_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ConvertError::Malformed(format!("Failed to write CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ConvertError::Malformed(format!("Failed to write CSV: {e}")))
}

/// Parse CSV into a table of string cells.
pub fn read_table(input: &[u8], dialect: &Dialect, limits: &Limits) -> Result<(Table, Option<String>)> {
    let rows = read_rows(input, dialect, limits.max_rows)?;
    Table::from_rows(rows, dialect.has_header)
}

/// Convert CSV bytes to a JSON array with one object per data row.
pub fn csv_to_json(input: &[u8], options: &CsvToJsonOptions, limits: &Limits) -> Result<Conversion<String>> {
    let dialect = Dialect::new(&options.delimiter, &options.encoding, options.has_header)?;
    let (table, warning) = read_table(input, &dialect, limits)?;
    let rows = table.len();
    let records = table
        .into_records()
        .into_iter()
        .map(Value::Object)
        .collect();

    Ok(Conversion {
        output: to_json_text(&Value::Array(records), options.pretty)?,
        rows,
        warning,
    })
}

/// Text used for a JSON value inside a CSV cell.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Convert a JSON array of objects (or of arrays) to CSV.
///
/// Columns are the union of all object keys in first-seen order; keys missing
/// from a record become empty cells.
pub fn json_to_csv(input: &str, options: &JsonToCsvOptions, limits: &Limits) -> Result<Conversion<String>> {
    let delimiter = parse_delimiter(&options.delimiter)?;
    let items = match parse_json(input, limits)? {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(ConvertError::Malformed(
                "JSON must be a non-empty array of objects or arrays".to_string(),
            ))
        }
    };

    if items.len() > limits.max_rows {
        return Err(ConvertError::SizeLimit(format!(
            "JSON input exceeds the limit of {} rows",
            limits.max_rows
        )));
    }

    match &items[0] {
        Value::Object(_) => objects_to_csv(&items, delimiter, options.has_header),
        Value::Array(_) => arrays_to_csv(&items, delimiter, options.has_header),
        _ => Err(ConvertError::Malformed(
            "JSON must be an array of objects ({...}) or an array of arrays ([...])".to_string(),
        )),
    }
}

fn objects_to_csv(items: &[Value], delimiter: u8, has_header: bool) -> Result<Conversion<String>> {
    let mut keys: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let record = item.as_object().ok_or_else(|| {
            ConvertError::Malformed("All elements must be JSON objects".to_string())
        })?;
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                keys.push(key.clone());
            }
        }
        records.push(record);
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            keys.iter()
                .map(|key| record.get(key).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let header = has_header.then_some(keys.as_slice());
    Ok(Conversion {
        output: write_rows(header, &rows, delimiter)?,
        rows: rows.len(),
        warning: None,
    })
}

fn arrays_to_csv(items: &[Value], delimiter: u8, has_header: bool) -> Result<Conversion<String>> {
    let rows = items
        .iter()
        .map(|item| {
            item.as_array()
                .map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>())
                .ok_or_else(|| {
                    ConvertError::Malformed(
                        "All elements must be arrays when the first one is an array".to_string(),
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let warning = has_header.then(|| "has_header is ignored for an array of arrays".to_string());
    Ok(Conversion {
        output: write_rows(None, &rows, delimiter)?,
        rows: rows.len(),
        warning,
    })
}
