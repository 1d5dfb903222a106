use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use convertkit_core::xml::{xml_to_json, XmlToJsonOptions};

use super::{options, Options};
use crate::error::Error;
use crate::server::response::{Output, JSON};
use crate::server::upload::read_file;
use crate::server::AppState;

pub async fn to_json(
    State(state): State<Arc<AppState>>,
    query: Options<XmlToJsonOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let json = xml_to_json(&upload.text()?, &options, &state.config.limits)?;
    Ok(Output::new(JSON, json))
}
