//! Secret and version identifiers
//!
//! Both are validated newtypes. The engine treats their contents as opaque;
//! validation only rejects values the store itself would refuse.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Maximum length of a secret ARN or name accepted by the store
const MAX_SECRET_ID_LENGTH: usize = 2048;

/// Maximum length of a client request token
const MAX_VERSION_ID_LENGTH: usize = 64;

/// Identifier of a secret record: a full ARN or a secret name
///
/// # Examples
///
/// ```
/// use cfrotate_secret::SecretId;
///
/// let id = SecretId::new("arn:aws:secretsmanager:us-east-1:123456789012:secret:cf/api-AbCdEf").unwrap();
/// assert!(id.is_arn());
///
/// assert!(SecretId::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretId(String);

impl SecretId {
    /// Creates a validated secret identifier
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StoreError::InvalidRequest {
                reason: "secret id must not be empty".into(),
            });
        }
        if id.len() > MAX_SECRET_ID_LENGTH {
            return Err(StoreError::InvalidRequest {
                reason: format!(
                    "secret id exceeds {MAX_SECRET_ID_LENGTH} characters ({})",
                    id.len()
                ),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is a full ARN rather than a name
    pub fn is_arn(&self) -> bool {
        self.0.starts_with("arn:")
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SecretId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SecretId> for String {
    fn from(id: SecretId) -> Self {
        id.0
    }
}

/// Identifier of one version of a secret (the rotation's client request token)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Creates a validated version identifier
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_VERSION_ID_LENGTH {
            return Err(StoreError::InvalidRequest {
                reason: format!(
                    "version id must be 1-{MAX_VERSION_ID_LENGTH} characters, got {}",
                    id.len()
                ),
            });
        }
        if !id.chars().all(|c| c.is_ascii_graphic()) {
            return Err(StoreError::InvalidRequest {
                reason: "version id must be printable ASCII".into(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_id_accepts_names_and_arns() {
        let name = SecretId::new("cloudflare/dns-token").unwrap();
        assert!(!name.is_arn());

        let arn = SecretId::new("arn:aws:secretsmanager:eu-west-1:123456789012:secret:cf-AbCdEf")
            .unwrap();
        assert!(arn.is_arn());
        assert_eq!(arn.to_string(), arn.as_str());
    }

    #[test]
    fn test_secret_id_rejects_blank_and_oversized() {
        assert!(SecretId::new("").is_err());
        assert!(SecretId::new("   ").is_err());
        assert!(SecretId::new("a".repeat(MAX_SECRET_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_version_id_validation() {
        assert!(VersionId::new("7f3c5a5e-0c5d-4c1e-9b7a-2f0d1f1b7c11").is_ok());
        assert!(VersionId::new("").is_err());
        assert!(VersionId::new("has space").is_err());
        assert!(VersionId::new("x".repeat(65)).is_err());
    }

    #[test]
    fn test_ids_deserialize_with_validation() {
        let id: SecretId = serde_json::from_str("\"cf/token\"").unwrap();
        assert_eq!(id.as_str(), "cf/token");

        let bad: Result<VersionId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
