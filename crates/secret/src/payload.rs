//! Secret payload codec
//!
//! Every rotated secret stores a JSON document of the form
//!
//! ```json
//! {"Type": "apiToken", "Attributes": {"Name": "dns", "Policies": [...], "ValidDays": 7}}
//! ```
//!
//! [`SecretPayload`] is a closed enum over the supported credential types, so
//! dispatch on the type is an exhaustive `match` everywhere downstream.
//! Attributes the engine does not know are kept in each type's `extra` map
//! and written back unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{SchemaError, SchemaResult};

/// Certificate lifetimes (days) accepted by the origin CA
pub const VALID_ORIGIN_CERT_DAYS: [u32; 7] = [7, 30, 90, 365, 730, 1095, 5475];

/// Credential type tag of a secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretType {
    /// Scoped API token
    ApiToken,
    /// Account-level origin tunnel service key
    TunnelServiceKey,
    /// Argo tunnel token bundle (key + origin certificate + service key)
    ArgoTunnelToken,
}

impl SecretType {
    /// All supported types
    pub const ALL: [Self; 3] = [Self::ApiToken, Self::TunnelServiceKey, Self::ArgoTunnelToken];

    /// Wire tag used in the `Type` key
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiToken => "apiToken",
            Self::TunnelServiceKey => "tunnelServiceKey",
            Self::ArgoTunnelToken => "argoTunnelToken",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownType { tag: s.to_string() })
    }
}

/// Secret material stored inside a payload
///
/// Serializes as a plain string; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wrap secret material
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret (use with caution)
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue[REDACTED]")
    }
}

/// Effect of a token policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

/// Permission group referenced by a token policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGroup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One policy of an API token, in the platform's own field names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPolicy {
    /// Platform-assigned policy id; stripped when the policy is reused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub effect: PolicyEffect,
    pub permission_groups: Vec<PermissionGroup>,
    /// Resource scoping, e.g. `{"com.cloudflare.api.account.zone.<zone>": "*"}`
    pub resources: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenPolicy {
    /// Copy of the policy without its platform-assigned id
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }
}

/// Attributes of an `apiToken` secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiTokenAttributes {
    pub name: String,
    pub policies: Vec<TokenPolicy>,
    /// Validity window of minted tokens; `0` mints tokens without expiry
    pub valid_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_value: Option<SecretValue>,
    /// Request conditions (e.g. client IP restrictions) carried to new tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attributes of a `tunnelServiceKey` secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TunnelServiceKeyAttributes {
    pub key_value: SecretValue,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attributes of an `argoTunnelToken` secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArgoTunnelTokenAttributes {
    pub hostname: String,
    pub validity_days: u32,
    pub zone_id: String,
    /// Locator of another secret whose `KeyValue` is the tunnel service key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_service_key_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_value: Option<SecretValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decoded secret payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type", content = "Attributes")]
pub enum SecretPayload {
    #[serde(rename = "apiToken")]
    ApiToken(ApiTokenAttributes),
    #[serde(rename = "tunnelServiceKey")]
    TunnelServiceKey(TunnelServiceKeyAttributes),
    #[serde(rename = "argoTunnelToken")]
    ArgoTunnelToken(ArgoTunnelTokenAttributes),
}

impl SecretPayload {
    /// Decode and validate a raw payload
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the JSON is malformed, `Type` or
    /// `Attributes` is missing, the `Type` tag is unknown, or the attributes
    /// violate the type's schema.
    pub fn decode(raw: &str) -> SchemaResult<Self> {
        let mut envelope: Map<String, Value> =
            serde_json::from_str(raw).map_err(|e| SchemaError::Malformed {
                reason: e.to_string(),
            })?;

        let secret_type = match envelope.remove("Type") {
            Some(Value::String(tag)) => tag.parse::<SecretType>()?,
            Some(other) => {
                return Err(SchemaError::UnknownType {
                    tag: other.to_string(),
                });
            }
            None => return Err(SchemaError::MissingField { field: "Type" }),
        };

        let attributes = envelope
            .remove("Attributes")
            .ok_or(SchemaError::MissingField {
                field: "Attributes",
            })?;

        let payload = match secret_type {
            SecretType::ApiToken => Self::ApiToken(attributes_as(secret_type, attributes)?),
            SecretType::TunnelServiceKey => {
                Self::TunnelServiceKey(attributes_as(secret_type, attributes)?)
            }
            SecretType::ArgoTunnelToken => {
                Self::ArgoTunnelToken(attributes_as(secret_type, attributes)?)
            }
        };

        payload.validate()?;
        Ok(payload)
    }

    /// Encode to the wire format
    pub fn encode(&self) -> SchemaResult<String> {
        serde_json::to_string(self).map_err(|e| SchemaError::Malformed {
            reason: e.to_string(),
        })
    }

    /// Credential type of this payload
    pub fn secret_type(&self) -> SecretType {
        match self {
            Self::ApiToken(_) => SecretType::ApiToken,
            Self::TunnelServiceKey(_) => SecretType::TunnelServiceKey,
            Self::ArgoTunnelToken(_) => SecretType::ArgoTunnelToken,
        }
    }

    /// Check semantic constraints that serde cannot express
    pub fn validate(&self) -> SchemaResult<()> {
        match self {
            Self::ApiToken(attrs) => validate_api_token(attrs),
            Self::TunnelServiceKey(_) => Ok(()),
            Self::ArgoTunnelToken(attrs) => validate_argo_tunnel_token(attrs),
        }
    }
}

fn attributes_as<T: DeserializeOwned>(
    secret_type: SecretType,
    attributes: Value,
) -> SchemaResult<T> {
    serde_json::from_value(attributes).map_err(|e| SchemaError::InvalidAttributes {
        secret_type: secret_type.as_str(),
        reason: e.to_string(),
    })
}

fn invalid(secret_type: SecretType, field: &'static str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidValue {
        secret_type: secret_type.as_str(),
        field,
        reason: reason.into(),
    }
}

fn validate_api_token(attrs: &ApiTokenAttributes) -> SchemaResult<()> {
    let t = SecretType::ApiToken;
    if attrs.name.trim().is_empty() {
        return Err(invalid(t, "Name", "must not be empty"));
    }
    if attrs.policies.is_empty() {
        return Err(invalid(t, "Policies", "at least one policy is required"));
    }
    for (index, policy) in attrs.policies.iter().enumerate() {
        if policy.permission_groups.is_empty() {
            return Err(invalid(
                t,
                "Policies",
                format!("policy {index} has no permission groups"),
            ));
        }
        if policy.resources.is_empty() {
            return Err(invalid(t, "Policies", format!("policy {index} has no resources")));
        }
    }
    Ok(())
}

fn is_zone_id(value: &str) -> bool {
    value.len() == 32 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn validate_argo_tunnel_token(attrs: &ArgoTunnelTokenAttributes) -> SchemaResult<()> {
    let t = SecretType::ArgoTunnelToken;
    if attrs.hostname.trim().is_empty() || attrs.hostname.contains(char::is_whitespace) {
        return Err(invalid(t, "Hostname", "must be a non-empty hostname"));
    }
    if !is_zone_id(&attrs.zone_id) {
        return Err(invalid(t, "ZoneId", "must be 32 lowercase hex characters"));
    }
    if !VALID_ORIGIN_CERT_DAYS.contains(&attrs.validity_days) {
        return Err(invalid(
            t,
            "ValidityDays",
            format!(
                "{} is not one of {:?}",
                attrs.validity_days, VALID_ORIGIN_CERT_DAYS
            ),
        ));
    }
    if attrs
        .tunnel_service_key_arn
        .as_deref()
        .is_some_and(|arn| arn.trim().is_empty())
    {
        return Err(invalid(t, "TunnelServiceKeyArn", "must not be empty when present"));
    }
    Ok(())
}
