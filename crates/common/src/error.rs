//! Error types for the QA suites

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`QaError`]
pub type QaResult<T> = std::result::Result<T, QaError>;

/// QA harness error types
#[derive(Error, Debug)]
pub enum QaError {
    #[error("Assertion failed: {field}: expected {expected}, got {actual}")]
    Assertion {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Timed out after {after:?} waiting for: {what}")]
    Timeout { what: String, after: Duration },

    #[error("Cancelled by the test timeout")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser bridge error: {0}")]
    Bridge(String),

    #[error("Browser action failed: {action} - {reason}")]
    Browser { action: String, reason: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl QaError {
    /// Build an assertion failure citing the mismatched field.
    pub fn assertion(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl ToString,
    ) -> Self {
        QaError::Assertion {
            field: field.into(),
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        QaError::Timeout {
            what: what.into(),
            after,
        }
    }

    /// True for failures the suite is meant to report (as opposed to harness faults).
    pub fn is_assertion(&self) -> bool {
        matches!(self, QaError::Assertion { .. } | QaError::Timeout { .. })
    }
}

/// Fail with an assertion error unless `cond` holds.
pub fn ensure(
    cond: bool,
    field: impl Into<String>,
    expected: impl Into<String>,
    actual: impl ToString,
) -> QaResult<()> {
    if cond {
        Ok(())
    } else {
        Err(QaError::assertion(field, expected, actual))
    }
}
