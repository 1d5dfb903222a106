//! Row model shared by the CSV, Excel and HTML table conversions.

use serde_json::{Map, Value};

use crate::error::{ConvertError, Result};

/// One row of a tabular dataset: field name to value, in column order.
pub type Record = Map<String, Value>;

/// Output of a conversion together with what the caller should know about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion<T> {
    pub output: T,
    /// Number of data rows converted (header excluded).
    pub rows: usize,
    pub warning: Option<String>,
}

impl<T> Conversion<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Conversion<U> {
        Conversion {
            output: f(self.output),
            rows: self.rows,
            warning: self.warning,
        }
    }
}

/// Rectangular table: every row has exactly `header.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// `col_1..col_N` names used when the input carries no header row.
pub fn generic_header(width: usize) -> Vec<String> {
    (1..=width).map(|i| format!("col_{i}")).collect()
}

impl Table {
    /// Build a table from raw rows of uneven length.
    ///
    /// With a header, rows are padded with empty cells or truncated to the
    /// header width. Without one, the widest row decides the width and
    /// generic column names are generated.
    pub fn from_rows(mut rows: Vec<Vec<String>>, has_header: bool) -> Result<(Self, Option<String>)> {
        if rows.is_empty() {
            return Err(ConvertError::Malformed("Input contains no rows".to_string()));
        }

        if has_header {
            let header = rows.remove(0);
            if header.iter().all(|name| name.trim().is_empty()) {
                return Err(ConvertError::Malformed("Header row is empty".to_string()));
            }

            let width = header.len();
            let mut uneven = false;
            for row in &mut rows {
                if row.len() != width {
                    uneven = true;
                    row.resize(width, String::new());
                }
            }

            let warning = uneven.then(|| {
                "Some rows do not have the same number of columns as the header; \
                 missing values were filled with empty strings"
                    .to_string()
            });
            Ok((Self { header, rows }, warning))
        } else {
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            for row in &mut rows {
                row.resize(width, String::new());
            }
            let warning =
                Some("No header row: generic column names col_1, col_2, ... were used".to_string());
            Ok((
                Self {
                    header: generic_header(width),
                    rows,
                },
                warning,
            ))
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.into_records_with(Value::String)
    }

    /// Turn every row into a record, mapping each cell through `cell`.
    pub fn into_records_with(self, cell: impl Fn(String) -> Value) -> Vec<Record> {
        let Table { header, rows } = self;
        rows.into_iter()
            .map(|row| {
                header
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(&cell))
                    .collect::<Record>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_from_rows_with_header() {
        let (table, warning) = Table::from_rows(rows(&[&["a", "b"], &["1", "2"]]), true).unwrap();
        assert_eq!(table.header, vec!["a", "b"]);
        assert_eq!(table.rows, rows(&[&["1", "2"]]));
        assert!(warning.is_none());
    }

    #[test]
    fn test_from_rows_pads_and_truncates() {
        let (table, warning) =
            Table::from_rows(rows(&[&["a", "b"], &["1"], &["1", "2", "3"]]), true).unwrap();
        assert_eq!(table.rows, rows(&[&["1", ""], &["1", "2"]]));
        assert!(warning.unwrap().contains("same number of columns"));
    }

    #[test]
    fn test_from_rows_without_header_uses_generic_names() {
        let (table, warning) = Table::from_rows(rows(&[&["x"], &["y", "z"]]), false).unwrap();
        assert_eq!(table.header, vec!["col_1", "col_2"]);
        assert_eq!(table.rows, rows(&[&["x", ""], &["y", "z"]]));
        assert!(warning.unwrap().contains("col_1"));
    }

    #[test]
    fn test_from_rows_rejects_empty_input() {
        let err = Table::from_rows(Vec::new(), true).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
    }

    #[test]
    fn test_from_rows_rejects_blank_header() {
        let err = Table::from_rows(rows(&[&["", " "], &["1", "2"]]), true).unwrap_err();
        assert_eq!(err.to_string(), "Header row is empty");
    }

    #[test]
    fn test_into_records_keeps_column_order() {
        let (table, _) =
            Table::from_rows(rows(&[&["z", "a"], &["1", "2"]]), true).unwrap();
        let records = table.into_records();
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(records[0]["a"], Value::String("2".into()));
    }

    #[test]
    fn test_conversion_map() {
        let conversion = Conversion {
            output: 2,
            rows: 1,
            warning: Some("w".to_string()),
        };
        let mapped = conversion.map(|n| n * 10);
        assert_eq!(mapped.output, 20);
        assert_eq!(mapped.warning.as_deref(), Some("w"));
    }
}
