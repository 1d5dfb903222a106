/// Errors produced by the conversion functions.
///
/// Every variant maps to a stable `kind` string that the HTTP layer returns to
/// callers alongside the message.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("{0}")]
    Malformed(String),

    #[error("Invalid JSON: {message}")]
    InvalidJson {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("{0}")]
    SizeLimit(String),

    #[error("{0}")]
    DepthLimit(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

impl ConvertError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Malformed(_) | ConvertError::InvalidJson { .. } => "malformed_input",
            ConvertError::SizeLimit(_) => "size_limit",
            ConvertError::DepthLimit(_) => "depth_limit",
            ConvertError::NotFound(_) => "not_found",
            ConvertError::InvalidOption(_) => "invalid_option",
        }
    }

    /// Line and column of a JSON syntax error, when known.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            ConvertError::InvalidJson { line, column, .. } => Some((*line, *column)),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
