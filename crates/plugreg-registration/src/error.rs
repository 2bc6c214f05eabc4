//! Error taxonomy of a registration run.
//!
//! Every error is fatal: the run stops at the first failure and whatever was
//! already written remotely stays applied.

use std::fmt;
use std::path::PathBuf;

use plugreg_core::CoreError;
use plugreg_storage::{ErrorCategory, RecordKind, StoreError};

/// Remote operation that failed, reported with the entity kind and natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    Query,
    Create,
    Update,
    Delete,
    Associate,
    Lookup,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Associate => "associate",
            Self::Lookup => "lookup",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Invalid flag combination or missing input file; raised before any remote call.
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Assembly not found at {path}: {reason}")]
    AssemblyNotFound { path: PathBuf, reason: String },

    /// The file is readable but is not a managed assembly.
    #[error("Invalid assembly {path}: {reason}")]
    InvalidAssembly { path: PathBuf, reason: String },

    #[error("Split assembly for type '{type_name}' not found at {path}")]
    MissingSplitAssembly { type_name: String, path: PathBuf },

    #[error("Malformed mapping document: {message}")]
    MalformedMapping { message: String },

    #[error("Duplicate {entity} natural key under {parent}: {key}")]
    DuplicateNaturalKey {
        entity: &'static str,
        parent: String,
        key: String,
    },

    #[error("Remote {operation} of {entity} '{key}' failed: {source}")]
    Remote {
        entity: RecordKind,
        key: String,
        operation: RemoteOperation,
        #[source]
        source: StoreError,
    },
}

impl RegistrationError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }

    pub fn assembly_not_found(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::AssemblyNotFound {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_assembly(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidAssembly {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn remote(
        entity: RecordKind,
        key: impl Into<String>,
        operation: RemoteOperation,
        source: StoreError,
    ) -> Self {
        Self::Remote {
            entity,
            key: key.into(),
            operation,
            source,
        }
    }

    /// A message, filter or user lookup matched no record.
    pub fn lookup_missing(entity: RecordKind, key: impl Into<String>) -> Self {
        let key = key.into();
        Self::Remote {
            entity,
            source: StoreError::not_found(entity, key.clone()),
            key,
            operation: RemoteOperation::Lookup,
        }
    }

    /// True for errors raised before the first remote call could be issued.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Remote { .. })
    }

    /// Category of the underlying store error, for remote failures.
    pub fn remote_category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Remote { source, .. } => Some(source.category()),
            _ => None,
        }
    }
}

impl From<CoreError> for RegistrationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DuplicateNaturalKey {
                entity,
                parent,
                key,
            } => Self::DuplicateNaturalKey {
                entity,
                parent,
                key,
            },
            CoreError::Io { path, source } => Self::precondition(format!(
                "mapping document {} cannot be read: {source}",
                path.display()
            )),
            CoreError::MalformedMapping { message } => Self::MalformedMapping { message },
            other @ CoreError::InvalidValue { .. } => Self::MalformedMapping {
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_names_entity_key_and_operation() {
        let err = RegistrationError::remote(
            RecordKind::Step,
            "update/account/PostOperation/Synchronous",
            RemoteOperation::Create,
            StoreError::rejected(403, "no privilege"),
        );
        assert_eq!(
            err.to_string(),
            "Remote create of sdkmessageprocessingstep 'update/account/PostOperation/Synchronous' \
             failed: Request rejected (HTTP 403): no privilege"
        );
        assert_eq!(err.remote_category(), Some(ErrorCategory::Permission));
        assert!(!err.is_local());
    }

    #[test]
    fn test_lookup_missing() {
        let err = RegistrationError::lookup_missing(RecordKind::SdkMessage, "Frobnicate");
        assert!(matches!(
            err,
            RegistrationError::Remote {
                operation: RemoteOperation::Lookup,
                entity: RecordKind::SdkMessage,
                ..
            }
        ));
        assert_eq!(err.remote_category(), Some(ErrorCategory::NotFound));
    }

    #[test]
    fn test_core_errors_map_into_taxonomy() {
        let err: RegistrationError = CoreError::duplicate_key("step", "T", "k").into();
        assert!(matches!(err, RegistrationError::DuplicateNaturalKey { .. }));

        let err: RegistrationError = CoreError::malformed("missing field `Name`").into();
        assert_eq!(
            err.to_string(),
            "Malformed mapping document: missing field `Name`"
        );

        let err: RegistrationError = CoreError::invalid_value("Stage", "Later").into();
        assert!(matches!(err, RegistrationError::MalformedMapping { .. }));
        assert!(err.is_local());
    }
}
