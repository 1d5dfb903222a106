use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use convertkit_core::html_table::{html_table_to_json, HtmlTableOptions};

use super::{options, Options};
use crate::error::Error;
use crate::server::response::{Output, JSON};
use crate::server::upload::read_file;
use crate::server::AppState;

pub async fn to_json(
    State(state): State<Arc<AppState>>,
    query: Options<HtmlTableOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let conversion = html_table_to_json(&upload.text()?, &options, &state.config.limits)?;
    Ok(Output::tabular(JSON, conversion))
}
