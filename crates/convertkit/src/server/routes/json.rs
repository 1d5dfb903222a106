use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use convertkit_core::delimited::{json_to_csv, JsonToCsvOptions};
use convertkit_core::json::{format_json, FormatOptions};
use convertkit_core::xml::{json_to_xml, JsonToXmlOptions};

use super::{options, Options};
use crate::error::Error;
use crate::server::response::{Output, CSV, JSON, XML};
use crate::server::upload::read_file;
use crate::server::AppState;

pub async fn format(
    State(state): State<Arc<AppState>>,
    query: Options<FormatOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let formatted = format_json(&upload.text()?, &options, &state.config.limits)?;
    Ok(Output::new(JSON, formatted))
}

pub async fn to_xml(
    State(state): State<Arc<AppState>>,
    query: Options<JsonToXmlOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let xml = json_to_xml(&upload.text()?, &options, &state.config.limits)?;
    Ok(Output::new(XML, xml).attachment(upload.filename.as_deref(), "xml"))
}

pub async fn to_csv(
    State(state): State<Arc<AppState>>,
    query: Options<JsonToCsvOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let conversion = json_to_csv(&upload.text()?, &options, &state.config.limits)?;
    Ok(Output::tabular(CSV, conversion).attachment(upload.filename.as_deref(), "csv"))
}
