use std::time::Duration;

use convertkit_core::limits::{
    DEFAULT_HTML_MAX_ROWS, DEFAULT_MAX_JSON_BYTES, DEFAULT_MAX_ROWS, DEFAULT_XML_MAX_DEPTH,
    DEFAULT_XML_MAX_NODES,
};
use convertkit_core::Limits;

pub const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_MAX_FETCH_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, clap::Args)]
pub struct ServeOptions {
    /// Port to listen on
    #[arg(short, long, env = "CONVERTKIT_PORT", default_value = "8000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, env = "CONVERTKIT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Maximum request body size in bytes
    #[arg(long, env = "CONVERTKIT_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    #[clap(flatten)]
    pub fetch: FetchOptions,

    #[clap(flatten)]
    pub limits: LimitOptions,
}

#[derive(Debug, Clone, clap::Args)]
pub struct FetchOptions {
    /// Total timeout of the CSV URL fetch, in seconds
    #[arg(long, env = "CONVERTKIT_FETCH_TIMEOUT", default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout: f64,

    /// Largest body the CSV URL fetch will download, in bytes
    #[arg(long, env = "CONVERTKIT_MAX_FETCH_BYTES", default_value_t = DEFAULT_MAX_FETCH_BYTES)]
    pub max_fetch_bytes: usize,
}

#[derive(Debug, Clone, clap::Args)]
pub struct LimitOptions {
    /// Maximum number of data rows in CSV and Excel input
    #[arg(long, env = "CONVERTKIT_MAX_ROWS", default_value_t = DEFAULT_MAX_ROWS)]
    pub max_rows: usize,

    /// Maximum size of JSON input, in bytes
    #[arg(long, env = "CONVERTKIT_MAX_JSON_BYTES", default_value_t = DEFAULT_MAX_JSON_BYTES)]
    pub max_json_bytes: usize,

    /// Maximum XML nesting depth
    #[arg(long, env = "CONVERTKIT_XML_MAX_DEPTH", default_value_t = DEFAULT_XML_MAX_DEPTH)]
    pub xml_max_depth: usize,

    /// Maximum number of XML elements
    #[arg(long, env = "CONVERTKIT_XML_MAX_NODES", default_value_t = DEFAULT_XML_MAX_NODES)]
    pub xml_max_nodes: usize,

    /// Maximum number of HTML table rows
    #[arg(long, env = "CONVERTKIT_HTML_MAX_ROWS", default_value_t = DEFAULT_HTML_MAX_ROWS)]
    pub html_max_rows: usize,
}

impl From<&LimitOptions> for Limits {
    fn from(options: &LimitOptions) -> Self {
        Limits {
            max_rows: options.max_rows,
            max_json_bytes: options.max_json_bytes,
            xml_max_depth: options.xml_max_depth,
            xml_max_nodes: options.xml_max_nodes,
            html_max_rows: options.html_max_rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(DEFAULT_FETCH_TIMEOUT_SECS),
            max_bytes: DEFAULT_MAX_FETCH_BYTES,
        }
    }
}

impl TryFrom<&FetchOptions> for FetchConfig {
    type Error = color_eyre::eyre::Report;

    fn try_from(options: &FetchOptions) -> Result<Self, Self::Error> {
        let timeout = Duration::try_from_secs_f64(options.fetch_timeout).map_err(|e| {
            color_eyre::eyre::eyre!("Invalid fetch timeout {}: {e}", options.fetch_timeout)
        })?;
        if timeout.is_zero() {
            return Err(color_eyre::eyre::eyre!("Fetch timeout must be greater than zero"));
        }
        Ok(Self {
            timeout,
            max_bytes: options.max_fetch_bytes,
        })
    }
}

/// Immutable settings shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub body_limit: usize,
    pub fetch: FetchConfig,
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
            fetch: FetchConfig::default(),
            limits: Limits::default(),
        }
    }
}

impl TryFrom<&ServeOptions> for ServerConfig {
    type Error = color_eyre::eyre::Report;

    fn try_from(options: &ServeOptions) -> Result<Self, Self::Error> {
        Ok(Self {
            addr: format!("{}:{}", options.host, options.port),
            body_limit: options.body_limit,
            fetch: FetchConfig::try_from(&options.fetch)?,
            limits: Limits::from(&options.limits),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, clap::Parser)]
    struct TestApp {
        #[clap(flatten)]
        serve: ServeOptions,
    }

    #[test]
    fn test_defaults_match_core_limits() {
        let app = TestApp::parse_from(["convertkit"]);
        let config = ServerConfig::try_from(&app.serve).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let app = TestApp::parse_from([
            "convertkit",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--fetch-timeout",
            "0.5",
            "--max-rows",
            "10",
            "--xml-max-depth",
            "4",
        ]);
        let config = ServerConfig::try_from(&app.serve).unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.fetch.timeout, Duration::from_millis(500));
        assert_eq!(config.limits.max_rows, 10);
        assert_eq!(config.limits.xml_max_depth, 4);
        assert_eq!(config.limits.max_json_bytes, DEFAULT_MAX_JSON_BYTES);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let app = TestApp::parse_from(["convertkit", "--fetch-timeout", "0"]);
        assert!(ServerConfig::try_from(&app.serve).is_err());
    }
}
