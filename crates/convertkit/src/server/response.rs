use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use convertkit_core::Conversion;

pub const ROW_COUNT_HEADER: HeaderName = HeaderName::from_static("x-row-count");
pub const WARNING_HEADER: HeaderName = HeaderName::from_static("x-conversion-warning");

pub const JSON: &str = "application/json";
pub const CSV: &str = "text/csv; charset=utf-8";
pub const XML: &str = "application/xml";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A converted payload plus the metadata sent back as headers.
#[derive(Debug)]
pub struct Output {
    content_type: &'static str,
    body: Vec<u8>,
    filename: Option<String>,
    rows: Option<usize>,
    warning: Option<String>,
}

impl Output {
    pub fn new(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type,
            body: body.into(),
            filename: None,
            rows: None,
            warning: None,
        }
    }

    /// Body, row count and warning of a tabular conversion.
    pub fn tabular<T: Into<Vec<u8>>>(content_type: &'static str, conversion: Conversion<T>) -> Self {
        Self {
            rows: Some(conversion.rows),
            warning: conversion.warning,
            ..Self::new(content_type, conversion.output)
        }
    }

    /// Send the body as a download named after the uploaded file.
    pub fn attachment(mut self, upload_name: Option<&str>, extension: &str) -> Self {
        self.filename = Some(output_filename(upload_name, extension));
        self
    }
}

/// `report.csv` + `xlsx` -> `report.xlsx`. Characters that are unsafe in a
/// header are replaced with `_`.
pub fn output_filename(upload_name: Option<&str>, extension: &str) -> String {
    let stem = upload_name
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name))
        .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
        .filter(|stem| !stem.is_empty())
        .unwrap_or("converted");

    let stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}.{extension}")
}

impl IntoResponse for Output {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type));

        if let Some(filename) = &self.filename {
            if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
                headers.insert(header::CONTENT_DISPOSITION, value);
            }
        }
        if let Some(rows) = self.rows {
            headers.insert(ROW_COUNT_HEADER, HeaderValue::from(rows));
        }
        if let Some(warning) = &self.warning {
            match HeaderValue::from_str(warning) {
                Ok(value) => {
                    headers.insert(WARNING_HEADER, value);
                }
                Err(_) => log::debug!("Dropping warning header that is not valid ASCII: {warning}"),
            }
        }

        (headers, self.body).into_response()
    }
}
