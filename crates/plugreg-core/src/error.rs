use std::path::PathBuf;

use thiserror::Error;

/// Core error types for desired-state loading and validation
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Malformed mapping document: {message}")]
    MalformedMapping { message: String },

    #[error("Duplicate {entity} natural key under {parent}: {key}")]
    DuplicateNaturalKey {
        entity: &'static str,
        parent: String,
        key: String,
    },

    #[error("Invalid {kind} value: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("Failed to read mapping document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Create a new MalformedMapping error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMapping {
            message: message.into(),
        }
    }

    /// Create a new DuplicateNaturalKey error
    pub fn duplicate_key(
        entity: &'static str,
        parent: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::DuplicateNaturalKey {
            entity,
            parent: parent.into(),
            key: key.into(),
        }
    }

    /// Create a new InvalidValue error
    pub fn invalid_value(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind,
            value: value.into(),
        }
    }

    /// Check if this error was raised by mapping validation rather than IO
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
