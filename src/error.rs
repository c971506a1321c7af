//! Custom error types for scholarmail.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, ScholarMailError>` instead of using `unwrap()`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scholarmail operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum ScholarMailError {
    /// Browser automation error (launch, CDP command, navigation)
    #[error("Browser error: {0}")]
    Browser(String),

    /// Expected page element was not present
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Bounded wait elapsed without the awaited condition
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// A document could not be turned into text
    #[error("Extraction failed for {path:?}: {reason}")]
    Extraction {
        /// Document that failed
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Similarity ranking was given no candidate emails
    #[error("No candidate emails to rank")]
    EmptyInput,

    /// None of the ranked texts produced a term
    #[error("Empty vocabulary: no terms in name or email local-parts")]
    EmptyVocabulary,
}

/// Result type alias using `ScholarMailError`
pub type Result<T> = std::result::Result<T, ScholarMailError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with an element-not-found error
    fn ok_or_not_found(self, what: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, what: &str) -> Result<T> {
        self.ok_or_else(|| ScholarMailError::ElementNotFound(what.to_string()))
    }
}
