//! Error types for the autopsy engine
//!
//! Business findings (loops, hallucinations, ...) are data and never show up
//! here. Errors are limited to:
//! - Structurally invalid traces
//! - Unreadable or nonsensical configuration

use autopsy_model::TraceError;
use std::path::PathBuf;

/// Top-level engine error
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Trace rejected before analysis
    #[error("invalid input: {0}")]
    InvalidInput(#[from] TraceError),

    /// Engine configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Whether the trace itself was rejected
    #[inline]
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML rendering failed
    #[error("render error: {0}")]
    Render(#[from] toml::ser::Error),

    /// Value out of range
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted field path
        field: String,
        /// What is wrong
        reason: String,
    },
}

impl ConfigError {
    /// Create an out-of-range error
    #[inline]
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
