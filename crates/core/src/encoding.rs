//! Text encoding lookup, decoding and encoding for tabular input and output.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use crate::error::{ConvertError, Result};

/// Resolve an encoding label.
///
/// Accepts WHATWG labels (`utf-8`, `latin1`, `windows-1252`, `shift_jis`, ...)
/// plus a few common aliases such as `utf-8-sig` and `latin-1`.
pub fn lookup(label: &str) -> Result<&'static Encoding> {
    let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
    let alias = match normalized.as_str() {
        "utf-8-sig" | "utf8-sig" => "utf-8",
        "latin-1" => "latin1",
        other => other,
    };

    Encoding::for_label(alias.as_bytes())
        .ok_or_else(|| ConvertError::InvalidOption(format!("Unknown encoding '{label}'")))
}

/// Decode `input` strictly: a byte order mark matching `encoding` is skipped
/// and any malformed sequence is an error.
pub fn decode_text<'a>(input: &'a [u8], encoding: &'static Encoding) -> Result<Cow<'a, str>> {
    let body = match Encoding::for_bom(input) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &input[bom_len..],
        _ => input,
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| {
            ConvertError::Malformed(format!("Input is not valid {} text", encoding.name()))
        })
}

/// Decode UTF-8 text such as JSON, XML or HTML uploads.
pub fn decode_utf8(input: &[u8]) -> Result<Cow<'_, str>> {
    decode_text(input, UTF_8)
}

/// Encode `text`, failing when a character has no representation in `encoding`.
///
/// UTF-16 labels encode as UTF-8, which is what encoding_rs produces for them.
pub fn encode_text<'a>(text: &'a str, encoding: &'static Encoding) -> Result<Cow<'a, [u8]>> {
    if encoding == UTF_8 {
        return Ok(Cow::Borrowed(text.as_bytes()));
    }

    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(ConvertError::Malformed(format!(
            "Output contains characters that cannot be encoded as {}",
            encoding.name()
        )));
    }
    Ok(bytes)
}
