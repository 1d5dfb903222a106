use std::time::Duration;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use convertkit_core::ConvertError;
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Fetch timed out after {}s", .0.as_secs_f64())]
    FetchTimeout(Duration),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Convert(e) => e.kind(),
            Error::Fetch(_) => "fetch_error",
            Error::FetchTimeout(_) => "fetch_timeout",
            Error::BadRequest(_) => "bad_request",
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        let position = match error {
            Error::Convert(e) => e.position(),
            _ => None,
        };
        Self {
            error: error.kind(),
            message: error.to_string(),
            line: position.map(|(line, _)| line),
            column: position.map(|(_, column)| column),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        log::warn!("Request failed ({}): {}", self.kind(), self);
        (StatusCode::BAD_REQUEST, Json(ErrorBody::from(&self))).into_response()
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for Error {
    fn from(error: MultipartError) -> Self {
        Error::BadRequest(error.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_carries_json_position() {
        let error = Error::from(ConvertError::InvalidJson {
            message: "expected value at line 2 column 3".to_string(),
            line: 2,
            column: 3,
        });
        let body = serde_json::to_value(ErrorBody::from(&error)).unwrap();
        assert_eq!(body["error"], "malformed_input");
        assert_eq!(body["line"], 2);
        assert_eq!(body["column"], 3);
    }

    #[test]
    fn test_error_body_omits_missing_position() {
        let error = Error::FetchTimeout(Duration::from_millis(1500));
        let body = serde_json::to_value(ErrorBody::from(&error)).unwrap();
        assert_eq!(body["error"], "fetch_timeout");
        assert_eq!(body["message"], "Fetch timed out after 1.5s");
        assert!(body.get("line").is_none());
    }

    #[test]
    fn test_into_response_is_bad_request() {
        let response = Error::Fetch("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
