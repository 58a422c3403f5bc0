//! Error types for payload decoding and store access

use thiserror::Error;

/// Errors raised while decoding or validating a secret payload.
///
/// All variants are fatal: a payload that does not match its type's schema
/// is a configuration bug and retrying will not fix it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Payload is not valid JSON
    #[error("Secret payload is not valid JSON: {reason}")]
    Malformed { reason: String },

    /// A top-level key is missing
    #[error("Secret payload is missing the `{field}` key")]
    MissingField { field: &'static str },

    /// `Type` tag is not one of the supported credential types
    #[error("Unrecognized secret type `{tag}`")]
    UnknownType { tag: String },

    /// `Attributes` do not deserialize into the type's schema
    #[error("Invalid attributes for {secret_type}: {reason}")]
    InvalidAttributes {
        secret_type: &'static str,
        reason: String,
    },

    /// An attribute is present but violates a constraint
    #[error("Invalid attribute {secret_type}.{field}: {reason}")]
    InvalidValue {
        secret_type: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Result type for codec operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised by a [`SecretStore`](crate::SecretStore) implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// Secret, version, or stage does not exist
    #[error("Not found in secret store: {what}")]
    NotFound { what: String },

    /// Label move rejected because the label is attached elsewhere
    #[error("Stage {stage} on {secret_id} is attached to version {attached_to}, not {expected}")]
    StageConflict {
        secret_id: String,
        stage: String,
        attached_to: String,
        expected: String,
    },

    /// A request argument was rejected locally or by the store
    #[error("Invalid store request: {reason}")]
    InvalidRequest { reason: String },

    /// Transport or service failure talking to the store
    #[error("Secret store {operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wrap a backend failure
    pub fn backend(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }

    /// Whether this error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
