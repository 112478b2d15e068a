//! Error type shared by the configuration layer and the data-source boundary.
//!
//! Insufficient data (empty tracks, no overlap, nothing voiced) is not an
//! error anywhere in this crate; it produces an empty result instead.

use thiserror::Error;

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum ContourError {
    /// A configuration value is outside its accepted range.
    #[error("invalid value for `{name}`: got {value}, {reason}")]
    InvalidConfig {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A pitch-track document declared a schema version this adapter does not know.
    #[error("unsupported pitch track document version {0}")]
    UnsupportedVersion(u32),

    /// A pitch-track document could not be parsed.
    #[error("JSON decode error while {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading a pitch-track document failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ContourError {
    pub(crate) fn invalid_config(
        name: &'static str,
        value: impl std::fmt::Display,
        reason: &'static str,
    ) -> Self {
        Self::InvalidConfig {
            name,
            value: value.to_string(),
            reason,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ContourError>;
