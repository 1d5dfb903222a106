use axum::extract::rejection::JsonRejection;
use axum::Json;
use convertkit_core::text::{clean_text, CleanOptions, CleanedText};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub text: String,
}

/// Options sit next to `text` in the same object. `#[serde(flatten)]` cannot
/// read numeric fields under `arbitrary_precision`, so both are read from the value.
pub async fn clean(
    request: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CleanedText>, Error> {
    let Json(body) = request?;
    let request: CleanRequest = serde_json::from_value(body.clone())
        .map_err(|e| Error::BadRequest(e.to_string()))?;
    let options: CleanOptions =
        serde_json::from_value(body).map_err(|e| Error::BadRequest(e.to_string()))?;
    Ok(Json(clean_text(&request.text, &options)))
}
