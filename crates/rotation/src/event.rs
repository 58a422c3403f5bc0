//! Rotation events delivered by the secret store

use cfrotate_secret::{SecretId, VersionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four rotation steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RotationStep {
    /// Mint a new credential and store it as the pending version
    CreateSecret,
    /// Install the pending credential in the target service
    SetSecret,
    /// Check the pending credential against the platform
    TestSecret,
    /// Promote the pending version and retire the superseded credential
    FinishSecret,
}

impl RotationStep {
    /// Wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateSecret => "createSecret",
            Self::SetSecret => "setSecret",
            Self::TestSecret => "testSecret",
            Self::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invocation payload sent by Secrets Manager
///
/// ```
/// use cfrotate_rotation::{RotationEvent, RotationStep};
///
/// let event: RotationEvent = serde_json::from_str(r#"{
///     "SecretId": "arn:aws:secretsmanager:us-east-1:123456789012:secret:cf/dns-AbCdEf",
///     "ClientRequestToken": "5b8ba0fe-2fd9-4fd3-b2c9-7d38b2a5c33e",
///     "Step": "testSecret"
/// }"#).unwrap();
/// assert_eq!(event.step, RotationStep::TestSecret);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RotationEvent {
    pub secret_id: SecretId,
    /// Version being rotated to
    pub client_request_token: VersionId,
    pub step: RotationStep,
}

impl RotationEvent {
    pub fn new(secret_id: SecretId, client_request_token: VersionId, step: RotationStep) -> Self {
        Self {
            secret_id,
            client_request_token,
            step,
        }
    }
}
