use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use convertkit_core::delimited::{self, CsvToJsonOptions};
use convertkit_core::excel::{self, CsvToExcelOptions};
use serde::Deserialize;

use super::{options, Options};
use crate::error::Error;
use crate::fetch::fetch_bytes;
use crate::server::response::{Output, JSON, XLSX};
use crate::server::upload::read_file;
use crate::server::AppState;

pub async fn to_json(
    State(state): State<Arc<AppState>>,
    query: Options<CsvToJsonOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let conversion = delimited::csv_to_json(&upload.bytes, &options, &state.config.limits)?;
    Ok(Output::tabular(JSON, conversion))
}

pub async fn to_excel(
    State(state): State<Arc<AppState>>,
    query: Options<CsvToExcelOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let conversion = excel::csv_to_excel(&upload.bytes, &options, &state.config.limits)?;
    Ok(Output::tabular(XLSX, conversion).attachment(upload.filename.as_deref(), "xlsx"))
}

#[derive(Debug, Deserialize)]
pub struct UrlToJsonRequest {
    pub url: String,
    #[serde(flatten)]
    pub options: CsvToJsonOptions,
}

pub async fn url_to_json(
    State(state): State<Arc<AppState>>,
    request: Result<Json<UrlToJsonRequest>, JsonRejection>,
) -> Result<Output, Error> {
    let Json(request) = request?;
    let bytes = fetch_bytes(&state.client, &request.url, &state.config.fetch).await?;
    let conversion = delimited::csv_to_json(&bytes, &request.options, &state.config.limits)?;
    Ok(Output::tabular(JSON, conversion))
}
