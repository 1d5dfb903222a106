//! HTML `<table>` extraction into JSON records.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::error::{ConvertError, Result};
use crate::json::to_json_text;
use crate::limits::Limits;
use crate::tabular::{Conversion, Table};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HtmlTableOptions {
    /// Zero-based position of the table in document order.
    pub table_index: usize,
    pub has_header: bool,
    /// Emit cells that look like numbers as JSON numbers.
    pub convert_numbers: bool,
}

impl Default for HtmlTableOptions {
    fn default() -> Self {
        Self {
            table_index: 0,
            has_header: true,
            convert_numbers: false,
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ConvertError::Malformed(format!("Failed to parse selector '{css}': {e:?}")))
}

/// Innermost `<table>` that contains `element`.
fn owning_table<'a>(element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read the rows of one table, leaving out rows of tables nested inside it.
fn table_rows(table: &ElementRef<'_>, row_selector: &Selector) -> Vec<Vec<String>> {
    table
        .select(row_selector)
        .filter(|row| owning_table(row).map(|owner| owner.id()) == Some(table.id()))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                .map(|cell| cell_text(&cell))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Parse `text` as a JSON number when it looks like one. A comma is accepted
/// as the decimal separator.
pub fn maybe_number(text: &str) -> Option<Number> {
    static RE_NUMBER: OnceLock<Regex> = OnceLock::new();
    let re_number = RE_NUMBER
        .get_or_init(|| Regex::new(r"^[+-]?(\d+([.,]\d*)?|[.,]\d+)([eE][+-]?\d+)?$").unwrap());

    let text = text.trim();
    if !re_number.is_match(text) {
        return None;
    }

    let normalized = text.replace(',', ".");
    if let Ok(integer) = normalized.parse::<i64>() {
        return Some(Number::from(integer));
    }
    normalized
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
}

/// Extract the table at `table_index` as a JSON array of records.
pub fn html_table_to_json(input: &str, options: &HtmlTableOptions, limits: &Limits) -> Result<Conversion<String>> {
    let document = Html::parse_document(input);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;

    let tables: Vec<ElementRef<'_>> = document.select(&table_selector).collect();
    if tables.is_empty() {
        return Err(ConvertError::NotFound("No table found in HTML".to_string()));
    }

    let table = tables.get(options.table_index).ok_or_else(|| {
        ConvertError::NotFound(format!(
            "Table index {} is out of range; the document has {} table(s)",
            options.table_index,
            tables.len()
        ))
    })?;

    let rows = table_rows(table, &row_selector);
    if rows.is_empty() {
        return Err(ConvertError::NotFound(format!(
            "Table {} contains no rows",
            options.table_index
        )));
    }

    let data_rows = rows.len() - usize::from(options.has_header);
    if data_rows > limits.html_max_rows {
        return Err(ConvertError::SizeLimit(format!(
            "Table has {data_rows} rows; the limit is {}",
            limits.html_max_rows
        )));
    }

    let (table, warning) = Table::from_rows(rows, options.has_header)?;
    let rows = table.len();
    let records = if options.convert_numbers {
        table.into_records_with(|cell| match maybe_number(&cell) {
            Some(number) => Value::Number(number),
            None => Value::String(cell),
        })
    } else {
        table.into_records()
    };

    let records = Value::Array(records.into_iter().map(Value::Object).collect());
    Ok(Conversion {
        output: to_json_text(&records, false)?,
        rows,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn convert(html: &str, options: &HtmlTableOptions) -> Value {
        let out = html_table_to_json(html, options, &Limits::default()).unwrap();
        serde_json::from_str(&out.output).unwrap()
    }

    const PRICES: &str = r#"
        <html><body>
          <h1>Prices</h1>
          <table id="prices">
            <thead><tr><th>Item</th><th>Price</th></tr></thead>
            <tbody>
              <tr><td> Coffee <b>beans</b> </td><td>12,50</td></tr>
              <tr><td>Tea</td><td>7</td></tr>
            </tbody>
          </table>
          <table><tr><td>second</td></tr></table>
        </body></html>
    "#;

    #[test]
    fn test_first_table_with_header() {
        let value = convert(PRICES, &HtmlTableOptions::default());
        assert_eq!(
            value,
            json!([
                {"Item": "Coffee beans", "Price": "12,50"},
                {"Item": "Tea", "Price": "7"}
            ])
        );
    }

    #[test]
    fn test_convert_numbers() {
        let options = HtmlTableOptions {
            convert_numbers: true,
            ..Default::default()
        };
        let value = convert(PRICES, &options);
        assert_eq!(value[0]["Price"], json!(12.5));
        assert_eq!(value[1]["Price"], json!(7));
        assert_eq!(value[0]["Item"], json!("Coffee beans"));
    }

    #[test]
    fn test_table_index_selects_table() {
        let options = HtmlTableOptions {
            table_index: 1,
            has_header: false,
            ..Default::default()
        };
        let out = html_table_to_json(PRICES, &options, &Limits::default()).unwrap();
        assert_eq!(out.output, r#"[{"col_1":"second"}]"#);
        assert!(out.warning.is_some());
    }

    #[test]
    fn test_table_index_out_of_range() {
        let options = HtmlTableOptions {
            table_index: 5,
            ..Default::default()
        };
        let err = html_table_to_json(PRICES, &options, &Limits::default()).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_no_table_found() {
        let err = html_table_to_json("<p>nothing here</p>", &HtmlTableOptions::default(), &Limits::default())
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().to_lowercase().contains("no table found"));
    }

    #[test]
    fn test_nested_table_rows_are_excluded() {
        let html = r#"
            <table>
              <tr><th>name</th><th>detail</th></tr>
              <tr><td>outer</td><td><table><tr><td>inner</td></tr></table></td></tr>
            </table>
        "#;
        let value = convert(html, &HtmlTableOptions::default());
        assert_eq!(value, json!([{"name": "outer", "detail": "inner"}]));
    }

    #[test]
    fn test_row_limit() {
        let rows: String = (0..6).map(|i| format!("<tr><td>{i}</td></tr>")).collect();
        let html = format!("<table><tr><th>n</th></tr>{rows}</table>");
        let limits = Limits {
            html_max_rows: 5,
            ..Default::default()
        };
        let err = html_table_to_json(&html, &HtmlTableOptions::default(), &limits).unwrap_err();
        assert_eq!(err.kind(), "size_limit");
    }

    #[test]
    fn test_maybe_number() {
        assert_eq!(maybe_number("42"), Some(Number::from(42)));
        assert_eq!(maybe_number("-3,25"), Number::from_f64(-3.25));
        assert_eq!(maybe_number("1e3"), Number::from_f64(1000.0));
        assert_eq!(maybe_number("inf"), None);
        assert_eq!(maybe_number("1,000.5"), None);
        assert_eq!(maybe_number(""), None);
        assert_eq!(maybe_number("12 kg"), None);
    }
}
