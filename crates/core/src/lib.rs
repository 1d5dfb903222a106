//! Core library for convertkit
//!
//! This crate implements the **Functional Core** of the convertkit service,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! convertkit uses a two-crate architecture:
//!
//! - **`convertkit_core`** (this crate): Pure conversion functions with zero I/O
//! - **`convertkit`**: The HTTP server, the CLI, and the URL fetch (the Imperative Shell)
//!
//! Every conversion takes bytes or text plus an options struct and the
//! process-wide [`Limits`], and returns either the converted output or a
//! [`ConvertError`]. Nothing here touches the network or the filesystem, so
//! the tests use fixture strings only.
//!
//! # Module Organization
//!
//! - [`delimited`]: CSV reading and writing, CSV ↔ JSON
//! - [`excel`]: CSV ↔ `.xlsx`
//! - [`json`]: JSON parsing under a size limit and the formatter
//! - [`xml`]: XML ↔ JSON with depth and node limits
//! - [`html_table`]: HTML `<table>` → JSON
//! - [`text`]: The text cleaning pipeline
//! - [`tabular`], [`encoding`], [`limits`], [`error`]: Shared building blocks
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use convertkit_core::delimited::{csv_to_json, CsvToJsonOptions};
//! use convertkit_core::Limits;
//!
//! let out = csv_to_json(b"name\nAda\n", &CsvToJsonOptions::default(), &Limits::default())?;
//! assert_eq!(out.output, r#"[{"name":"Ada"}]"#);
//! assert_eq!(out.rows, 1);
//! ```

pub mod delimited;
pub mod encoding;
pub mod error;
pub mod excel;
pub mod html_table;
pub mod json;
pub mod limits;
pub mod tabular;
pub mod text;
pub mod xml;

pub use error::ConvertError;
pub use limits::Limits;
pub use tabular::Conversion;
