//! CSV ↔ Excel (.xlsx) conversions.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Deserialize;

use crate::delimited::{read_rows, write_rows, Dialect};
use crate::encoding::encode_text;
use crate::error::{ConvertError, Result};
use crate::limits::Limits;
use crate::tabular::Conversion;

/// Widest sheet the xlsx format allows.
pub const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsvToExcelOptions {
    pub delimiter: String,
    pub encoding: String,
    pub has_header: bool,
    pub sheet_name: String,
}

impl Default for CsvToExcelOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            encoding: "utf-8".to_string(),
            has_header: true,
            sheet_name: "Sheet1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExcelToCsvOptions {
    pub delimiter: String,
    /// Encoding of the CSV output.
    pub encoding: String,
    /// Only changes the reported row count.
    pub has_header: bool,
    /// Sheet to read; the first sheet when absent.
    pub sheet_name: Option<String>,
}

impl Default for ExcelToCsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            encoding: "utf-8".to_string(),
            has_header: true,
            sheet_name: None,
        }
    }
}

fn xlsx_error(e: XlsxError) -> ConvertError {
    ConvertError::Malformed(format!("Failed to write Excel workbook: {e}"))
}

/// Write CSV rows into a single-sheet workbook. Every cell is stored as text;
/// the header row, when present, is bold.
pub fn csv_to_excel(input: &[u8], options: &CsvToExcelOptions, limits: &Limits) -> Result<Conversion<Vec<u8>>> {
    let dialect = Dialect::new(&options.delimiter, &options.encoding, options.has_header)?;
    let rows = read_rows(input, &dialect, limits.max_rows)?;

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width > MAX_COLUMNS {
        return Err(ConvertError::SizeLimit(format!(
            "CSV has {width} columns; Excel allows at most {MAX_COLUMNS}"
        )));
    }

    let sheet_name = match options.sheet_name.trim() {
        "" => "Sheet1",
        name => name,
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).map_err(|e| {
        ConvertError::InvalidOption(format!("Invalid sheet name '{sheet_name}': {e}"))
    })?;

    let bold = Format::new().set_bold();
    for (r, row) in rows.iter().enumerate() {
        // Both fit: rows are capped by `max_rows`, columns by MAX_COLUMNS.
        let row_num = r as u32;
        for (c, cell) in row.iter().enumerate() {
            let col_num = c as u16;
            let written = if r == 0 && options.has_header {
                worksheet.write_string_with_format(row_num, col_num, cell.as_str(), &bold)
            } else {
                worksheet.write_string(row_num, col_num, cell.as_str())
            };
            written.map_err(xlsx_error)?;
        }
    }

    let bytes = workbook.save_to_buffer().map_err(xlsx_error)?;
    Ok(Conversion {
        output: bytes,
        rows: rows.len() - usize::from(options.has_header),
        warning: None,
    })
}

/// Read one worksheet and write it as delimited text in the requested encoding.
pub fn excel_to_csv(input: &[u8], options: &ExcelToCsvOptions, limits: &Limits) -> Result<Conversion<Vec<u8>>> {
    let dialect = Dialect::new(&options.delimiter, &options.encoding, options.has_header)?;

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(input))
        .map_err(|e| ConvertError::Malformed(format!("Cannot read Excel workbook: {e}")))?;

    let sheet_names = workbook.sheet_names();
    let sheet = match &options.sheet_name {
        Some(name) if !name.is_empty() => sheet_names
            .iter()
            .find(|candidate| *candidate == name)
            .cloned()
            .ok_or_else(|| ConvertError::NotFound(format!("Sheet '{name}' not found in workbook")))?,
        _ => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ConvertError::NotFound("Workbook contains no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ConvertError::Malformed(format!("Cannot read sheet '{sheet}': {e}")))?;

    // calamine starts the range at the first used cell; output starts at A1.
    let (top, left) = range
        .start()
        .map_or((0, 0), |(row, column)| (row as usize, column as usize));

    let allowed = limits.max_rows + usize::from(options.has_header);
    if top + range.height() > allowed {
        return Err(ConvertError::SizeLimit(format!(
            "Sheet '{sheet}' exceeds the limit of {} rows",
            limits.max_rows
        )));
    }

    let width = left + range.width();
    let mut rows: Vec<Vec<String>> = vec![vec![String::new(); width]; top];
    rows.extend(range.rows().map(|row| {
        std::iter::repeat(String::new())
            .take(left)
            .chain(row.iter().map(cell_text))
            .collect::<Vec<_>>()
    }));

    let text = write_rows(None, &rows, dialect.delimiter)?;
    let output = encode_text(&text, dialect.encoding)?.into_owned();

    Ok(Conversion {
        output,
        rows: rows.len().saturating_sub(usize::from(options.has_header)),
        warning: None,
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d: chrono::NaiveDateTime| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| format_float(dt.as_f64())),
        Data::Error(e) => e.to_string(),
    }
}

// Integral floats are printed without a fraction, e.g. 3.0 -> "3".
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
