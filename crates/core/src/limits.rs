//! Process-wide ceilings that bound memory and CPU per conversion.

use serde::Serialize;

pub const DEFAULT_MAX_ROWS: usize = 100_000;
pub const DEFAULT_MAX_JSON_BYTES: usize = 1024 * 1024;
pub const DEFAULT_XML_MAX_DEPTH: usize = 32;
pub const DEFAULT_XML_MAX_NODES: usize = 10_000;
pub const DEFAULT_HTML_MAX_ROWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    /// Maximum number of data rows (header excluded) in tabular input.
    pub max_rows: usize,
    /// Maximum size of JSON input, in bytes.
    pub max_json_bytes: usize,
    pub xml_max_depth: usize,
    pub xml_max_nodes: usize,
    pub html_max_rows: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            max_json_bytes: DEFAULT_MAX_JSON_BYTES,
            xml_max_depth: DEFAULT_XML_MAX_DEPTH,
            xml_max_nodes: DEFAULT_XML_MAX_NODES,
            html_max_rows: DEFAULT_HTML_MAX_ROWS,
        }
    }
}

impl Limits {
    /// Resolve a per-request ceiling: callers may lower a limit, never raise it.
    pub fn lowered(ceiling: usize, requested: Option<usize>) -> usize {
        requested.map_or(ceiling, |value| value.min(ceiling))
    }
}
