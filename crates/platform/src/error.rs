//! Platform client errors

use thiserror::Error;

use crate::types::ApiMessage;

/// Errors raised by the Cloudflare client
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Transport failure, timeout, rate limit, or server error; worth retrying
    #[error("Cloudflare {operation} failed transiently: {reason}")]
    Transient {
        operation: &'static str,
        status: Option<u16>,
        reason: String,
    },

    /// The API refused the request (4xx or `success: false`)
    #[error("Cloudflare rejected {operation} with HTTP {status}: {}", join_messages(.errors))]
    Rejected {
        operation: &'static str,
        status: u16,
        errors: Vec<ApiMessage>,
    },

    /// A successful response did not have the expected shape
    #[error("Unexpected Cloudflare response to {operation}: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    /// The credentials needed for an operation were not configured
    #[error("Cannot {purpose}: {missing} not configured")]
    MissingCredentials {
        purpose: &'static str,
        missing: &'static str,
    },

    /// Client construction parameters are out of range
    #[error("Invalid platform client configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl PlatformError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// HTTP status of the failed call, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } => *status,
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn join_messages(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;
