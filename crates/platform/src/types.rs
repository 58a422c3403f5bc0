//! Request and response bodies of the Cloudflare v4 API

use cfrotate_secret::{SecretValue, TokenPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One entry of the envelope's `errors` or `messages` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ApiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Response envelope shared by every v4 endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
    pub result: Option<T>,
}

/// Body of `POST /user/tokens`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewApiToken {
    pub name: String,
    pub policies: Vec<TokenPolicy>,
    /// RFC 3339 timestamp, seconds precision, `Z` suffix
    pub not_before: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

/// Token returned by `POST /user/tokens`
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedApiToken {
    pub id: String,
    pub value: SecretValue,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub expires_on: Option<String>,
}

/// Result of `GET /user/tokens/verify`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenVerification {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
}

/// Result of `GET /user/service_keys/origintunnel`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServiceKeyResult {
    pub service_key: SecretValue,
}

/// Body of `POST /certificates`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginCertificateRequest {
    pub hostnames: Vec<String>,
    pub requested_validity: u32,
    pub request_type: String,
    pub csr: String,
}

impl OriginCertificateRequest {
    /// ECC origin certificate for one hostname
    pub fn origin_ecc(
        hostname: impl Into<String>,
        validity_days: u32,
        csr_pem: impl Into<String>,
    ) -> Self {
        Self {
            hostnames: vec![hostname.into()],
            requested_validity: validity_days,
            request_type: "origin-ecc".into(),
            csr: csr_pem.into(),
        }
    }
}

/// Certificate returned by `POST /certificates`
#[derive(Debug, Clone, Deserialize)]
pub struct OriginCertificate {
    #[serde(default)]
    pub id: Option<String>,
    /// PEM-encoded certificate
    pub certificate: String,
    #[serde(default)]
    pub expires_on: Option<String>,
}
