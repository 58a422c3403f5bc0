//! Rotation error taxonomy
//!
//! Every failure of a rotation step ends up as a [`RotationError`]. The host
//! reports [`RotationError::kind`] as the invocation's error type, and the
//! store decides from it whether to retry the step.

use cfrotate_platform::PlatformError;
use cfrotate_secret::{SchemaError, StoreError};
use thiserror::Error;

/// Errors returned by [`Rotator::handle`](crate::Rotator::handle)
#[derive(Debug, Error)]
pub enum RotationError {
    /// A payload does not match its type's schema
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The secret, a required version, or a referenced secret is missing
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Transient platform failure (transport, timeout, 429, 5xx)
    #[error(transparent)]
    Platform(PlatformError),

    /// The platform refused a request
    #[error(transparent)]
    PlatformRejected(PlatformError),

    /// The pending credential did not pass its live check
    #[error("Pending {secret_type} of {secret_id} (version {version}) failed verification")]
    Verification {
        secret_id: String,
        version: String,
        secret_type: &'static str,
    },

    /// `finishSecret` was invoked before `testSecret` passed
    #[error("Version {version} of {secret_id} has not passed testSecret; refusing to promote it")]
    NotVerified { secret_id: String, version: String },

    /// The event does not fit the secret's current labels
    #[error("Cannot rotate {secret_id}: {reason}")]
    InvalidState { secret_id: String, reason: String },

    /// Missing platform credentials or bundle inputs
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Local key pair or CSR generation failed
    #[error("Key generation failed: {reason}")]
    KeyGeneration { reason: String },

    /// Secret store failure
    #[error(transparent)]
    Store(StoreError),
}

impl RotationError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn key_generation(reason: impl Into<String>) -> Self {
        Self::KeyGeneration {
            reason: reason.into(),
        }
    }

    /// Stable name reported as the invocation's error type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "SchemaError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Platform(_) => "PlatformError",
            Self::PlatformRejected(_) => "PlatformRejected",
            Self::Verification { .. } => "VerificationError",
            Self::NotVerified { .. } => "NotVerified",
            Self::InvalidState { .. } => "InvalidState",
            Self::Config { .. } => "ConfigError",
            Self::KeyGeneration { .. } => "KeyGenerationError",
            Self::Store(_) => "StoreError",
        }
    }

    /// Whether repeating the same step may succeed without intervention
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Platform(_) | Self::Store(_))
    }
}

impl From<StoreError> for RotationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { what } => Self::NotFound { what },
            other => Self::Store(other),
        }
    }
}

impl From<PlatformError> for RotationError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Transient { .. } => Self::Platform(err),
            PlatformError::MissingCredentials { .. } | PlatformError::InvalidConfig { .. } => {
                Self::Config {
                    reason: err.to_string(),
                }
            }
            PlatformError::Rejected { .. } | PlatformError::Decode { .. } => {
                Self::PlatformRejected(err)
            }
        }
    }
}

/// Result type for rotation operations
pub type RotationResult<T> = Result<T, RotationError>;
