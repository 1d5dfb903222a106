use std::borrow::Cow;

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use convertkit_core::encoding::decode_utf8;

use crate::error::Error;

pub const FILE_FIELD: &str = "file";

/// The `file` part of a multipart upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// Contents as UTF-8 text, without a leading byte order mark.
    pub fn text(&self) -> Result<Cow<'_, str>, Error> {
        Ok(decode_utf8(&self.bytes)?)
    }
}

pub async fn read_file(multipart: Result<Multipart, MultipartRejection>) -> Result<Upload, Error> {
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        log::debug!(
            "Received upload {:?} ({} bytes)",
            filename.as_deref().unwrap_or("<unnamed>"),
            bytes.len()
        );
        return Ok(Upload { filename, bytes });
    }
    Err(Error::BadRequest(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}
