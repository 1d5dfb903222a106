//! Free-text normalization: truncation, Unicode forms, accent stripping, whitespace and case.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

pub const DEFAULT_MAX_LENGTH: usize = 10_000;

/// Steps of the cleaning pipeline. Every step is on by default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    pub trim: bool,
    pub normalize_unicode: bool,
    pub remove_accents: bool,
    pub collapse_whitespace: bool,
    pub to_lower: bool,
    /// Characters kept from the input; `0` keeps everything.
    pub max_length: usize,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            trim: true,
            normalize_unicode: true,
            remove_accents: true,
            collapse_whitespace: true,
            to_lower: true,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedText {
    pub text: String,
    pub original_length: usize,
    pub cleaned_length: usize,
}

/// Clean up free text.
///
/// Steps run in a fixed order: truncate, NFC normalization, accent removal,
/// trim, whitespace collapsing, lower-casing. Lengths are counted in
/// characters.
pub fn clean_text(text: &str, options: &CleanOptions) -> CleanedText {
    let original_length = text.chars().count();

    let mut result = if options.max_length > 0 && original_length > options.max_length {
        text.chars().take(options.max_length).collect()
    } else {
        text.to_string()
    };

    if options.normalize_unicode {
        result = result.nfc().collect();
    }

    if options.remove_accents {
        result = result.nfd().filter(|c| !is_combining_mark(*c)).collect();
    }

    if options.trim {
        result = result.trim().to_string();
    }

    if options.collapse_whitespace {
        static RE_WHITESPACE: OnceLock<Regex> = OnceLock::new();
        let re_whitespace = RE_WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());
        result = re_whitespace.replace_all(&result, " ").to_string();
    }

    if options.to_lower {
        result = result.to_lowercase();
    }

    CleanedText {
        cleaned_length: result.chars().count(),
        text: result,
        original_length,
    }
}
