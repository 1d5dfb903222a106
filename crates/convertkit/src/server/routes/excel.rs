use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use convertkit_core::excel::{self, ExcelToCsvOptions};

use super::{options, Options};
use crate::error::Error;
use crate::server::response::{Output, CSV};
use crate::server::upload::read_file;
use crate::server::AppState;

pub async fn to_csv(
    State(state): State<Arc<AppState>>,
    query: Options<ExcelToCsvOptions>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Output, Error> {
    let options = options(query)?;
    let upload = read_file(multipart).await?;
    let conversion = excel::excel_to_csv(&upload.bytes, &options, &state.config.limits)?;
    Ok(Output::tabular(CSV, conversion).attachment(upload.filename.as_deref(), "csv"))
}
