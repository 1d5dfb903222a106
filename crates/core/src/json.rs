//! JSON parsing with size limits, and the pretty/compact formatter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConvertError, Result};
use crate::limits::Limits;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatMode {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub mode: FormatMode,
    /// Report syntax errors with their position instead of a bare message.
    pub validate: bool,
    /// Spaces per indentation level in pretty mode.
    pub indent: usize,
    pub sort_keys: bool,
    /// Escape every non-ASCII character as `\uXXXX`.
    pub ensure_ascii: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            mode: FormatMode::Pretty,
            validate: true,
            indent: 2,
            sort_keys: false,
            ensure_ascii: false,
        }
    }
}

const MAX_INDENT: usize = 8;

/// Reject JSON text larger than the configured limit.
pub fn check_size(input: &str, limits: &Limits) -> Result<()> {
    if input.len() > limits.max_json_bytes {
        return Err(ConvertError::SizeLimit(format!(
            "JSON input is too large ({:.1} KB > {} KB allowed)",
            input.len() as f64 / 1024.0,
            limits.max_json_bytes / 1024
        )));
    }
    Ok(())
}

/// Parse JSON text after enforcing the size limit.
pub fn parse_json(input: &str, limits: &Limits) -> Result<Value> {
    check_size(input, limits)?;
    serde_json::from_str(input).map_err(|e| ConvertError::InvalidJson {
        message: e.to_string(),
        line: e.line(),
        column: e.column(),
    })
}

/// Serialize a value either compactly or with two-space indentation.
pub fn to_json_text(value: &Value, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    text.map_err(|e| ConvertError::Malformed(format!("Failed to serialize JSON: {e}")))
}

/// Validate and re-serialize JSON text.
pub fn format_json(input: &str, options: &FormatOptions, limits: &Limits) -> Result<String> {
    if options.indent > MAX_INDENT {
        return Err(ConvertError::InvalidOption(format!(
            "indent must be between 0 and {MAX_INDENT}"
        )));
    }

    let value = match parse_json(input, limits) {
        Ok(value) => value,
        Err(ConvertError::InvalidJson { message, .. }) if !options.validate => {
            return Err(ConvertError::Malformed(format!("Invalid JSON: {message}")));
        }
        Err(e) => return Err(e),
    };

    let value = if options.sort_keys {
        sort_keys(value)
    } else {
        value
    };

    let text = match options.mode {
        FormatMode::Compact => to_json_text(&value, false)?,
        FormatMode::Pretty => write_indented(&value, options.indent)?,
    };

    Ok(if options.ensure_ascii {
        escape_non_ascii(&text)
    } else {
        text
    })
}

fn write_indented(value: &Value, indent: usize) -> Result<String> {
    let indent = " ".repeat(indent);
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| ConvertError::Malformed(format!("Failed to serialize JSON: {e}")))?;
    String::from_utf8(out)
        .map_err(|e| ConvertError::Malformed(format!("Failed to serialize JSON: {e}")))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

// Non-ASCII characters can only appear inside string literals of serialized JSON.
fn escape_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut units = [0u16; 2];
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}
