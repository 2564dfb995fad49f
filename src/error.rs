//! Error types for the schema model, the catalog session and reverse engineering.

use thiserror::Error;

use crate::model::SystemId;

/// A modification tracker refused a change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Veto: {0}")]
pub struct VetoError(pub String);

impl VetoError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors raised by the model's mutation protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Identifier violates the dialect's name rules.
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Name collision under dialect normalization.
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// Removal would break a relation or another reference.
    #[error("Cannot delete {kind} {name}: {reason}")]
    CannotDelete {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Veto(#[from] VetoError),

    /// Generic delete was called with an item kind the model does not dispatch.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("{kind} {id} is not part of the model")]
    NotFound { kind: &'static str, id: SystemId },

    #[error("Unknown datatype {0}")]
    UnknownDataType(String),

    /// A cross reference would dangle or break a relation invariant.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl ModelError {
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        ModelError::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn cannot_delete(
        kind: &'static str,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ModelError::CannotDelete {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: SystemId) -> Self {
        ModelError::NotFound { kind, id }
    }

    pub fn is_veto(&self) -> bool {
        matches!(self, ModelError::Veto(_))
    }
}

/// Errors raised by a catalog session or while opening one.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No catalog driver registered for {0}")]
    DriverUnavailable(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Authentication failed for user {0}")]
    AuthFailed(String),

    #[error("Connection lost")]
    ConnectionLost,

    /// Metadata could not be read or a statement could not be executed.
    #[error("Catalog query failed: {0}")]
    Query(String),

    #[error("DDL parse error: {0}")]
    Parse(#[from] crate::catalog::DdlParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn query(message: impl Into<String>) -> Self {
        CatalogError::Query(message.into())
    }

    /// Fatal errors end the current pipeline run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CatalogError::ConnectionLost
                | CatalogError::AuthFailed(_)
                | CatalogError::DriverUnavailable(_)
                | CatalogError::ConnectionRefused(_)
        )
    }
}

/// Errors raised by the reverse-engineering pipeline.
#[derive(Debug, Error)]
pub enum ReverseEngineeringError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Reverse engineering cancelled")]
    Cancelled,
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veto_converts_into_model_error() {
        let err: ModelError = VetoError::new("read only").into();
        assert!(err.is_veto());
        assert_eq!(err.to_string(), "Veto: read only");
    }

    #[test]
    fn test_fatal_catalog_errors() {
        assert!(CatalogError::ConnectionLost.is_fatal());
        assert!(CatalogError::AuthFailed("scott".into()).is_fatal());
        assert!(!CatalogError::query("no such table").is_fatal());
    }
}
