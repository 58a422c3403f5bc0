//! Platform credentials and authentication schemes
//!
//! Cloudflare accepts several kinds of authentication and each endpoint the
//! rotator uses wants a specific one:
//!
//! | Operation | Scheme |
//! |---|---|
//! | token management | `X-Auth-Email` + `X-Auth-Key`, else `Authorization: Bearer` |
//! | tunnel service keys | `X-Auth-Email` + `X-Auth-Key` only |
//! | origin certificates | `X-Auth-User-Service-Key` (origin CA key) |
//! | probes | the credential under test |

use cfrotate_secret::SecretType;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::error::{PlatformError, PlatformResult};

/// Authentication material supplied once when the client is built
///
/// `Debug` never prints secret values.
#[derive(Clone, Default)]
pub struct PlatformCredentials {
    api_token: Option<SecretString>,
    api_key: Option<SecretString>,
    api_email: Option<String>,
    origin_ca_key: Option<SecretString>,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.trim().is_empty()).then_some(value)
}

impl PlatformCredentials {
    /// No credentials
    pub fn new() -> Self {
        Self::default()
    }

    /// API token allowed to create other tokens
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = non_empty(token).map(SecretString::from);
        self
    }

    /// Global API key and the account email it belongs to
    pub fn with_global_key(mut self, email: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_email = non_empty(email);
        self.api_key = non_empty(key).map(SecretString::from);
        self
    }

    /// Origin CA key for certificate issuance
    pub fn with_origin_ca_key(mut self, key: impl Into<String>) -> Self {
        self.origin_ca_key = non_empty(key).map(SecretString::from);
        self
    }

    /// Whether both halves of the global key are present
    pub fn has_global_key(&self) -> bool {
        self.api_key.is_some() && self.api_email.is_some()
    }

    /// Check that the credentials needed to rotate `secret_type` are present
    ///
    /// Runs before any platform call so a misconfigured function fails fast.
    pub fn require(&self, secret_type: SecretType) -> PlatformResult<()> {
        match secret_type {
            SecretType::ApiToken => self.token_management().map(drop),
            SecretType::TunnelServiceKey => self.global_key("issue tunnel service keys").map(drop),
            SecretType::ArgoTunnelToken => self.origin_ca("issue origin certificates").map(drop),
        }
    }

    /// Scheme for `/user/tokens` management calls
    pub(crate) fn token_management(&self) -> PlatformResult<AuthScheme<'_>> {
        if let Ok(scheme) = self.global_key("manage API tokens") {
            return Ok(scheme);
        }
        self.api_token
            .as_ref()
            .map(AuthScheme::Bearer)
            .ok_or(PlatformError::MissingCredentials {
                purpose: "manage API tokens",
                missing: "CF_API_TOKEN (or CF_API_EMAIL + CF_API_KEY)",
            })
    }

    pub(crate) fn global_key(&self, purpose: &'static str) -> PlatformResult<AuthScheme<'_>> {
        match (&self.api_email, &self.api_key) {
            (Some(email), Some(key)) => Ok(AuthScheme::GlobalKey {
                email: email.as_str(),
                key,
            }),
            _ => Err(PlatformError::MissingCredentials {
                purpose,
                missing: "CF_API_EMAIL + CF_API_KEY",
            }),
        }
    }

    pub(crate) fn origin_ca(&self, purpose: &'static str) -> PlatformResult<AuthScheme<'_>> {
        self.origin_ca_key
            .as_ref()
            .map(AuthScheme::OriginCaKey)
            .ok_or(PlatformError::MissingCredentials {
                purpose,
                missing: "CF_API_CERTKEY",
            })
    }
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mark(present: bool) -> &'static str {
            if present { "[REDACTED]" } else { "<unset>" }
        }
        f.debug_struct("PlatformCredentials")
            .field("api_token", &mark(self.api_token.is_some()))
            .field("api_key", &mark(self.api_key.is_some()))
            .field("api_email", &self.api_email)
            .field("origin_ca_key", &mark(self.origin_ca_key.is_some()))
            .finish()
    }
}

/// How a single request authenticates
#[derive(Clone, Copy)]
pub(crate) enum AuthScheme<'a> {
    GlobalKey {
        email: &'a str,
        key: &'a SecretString,
    },
    Bearer(&'a SecretString),
    OriginCaKey(&'a SecretString),
    /// A user service key under test
    ServiceKey(&'a str),
}

impl AuthScheme<'_> {
    pub(crate) fn apply(self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key.expose_secret()),
            Self::Bearer(token) => request.bearer_auth(token.expose_secret()),
            Self::OriginCaKey(key) => {
                request.header("X-Auth-User-Service-Key", key.expose_secret())
            }
            Self::ServiceKey(key) => request.header("X-Auth-User-Service-Key", key),
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::GlobalKey { .. } => "global_key",
            Self::Bearer(_) => "bearer",
            Self::OriginCaKey(_) => "origin_ca_key",
            Self::ServiceKey(_) => "service_key",
        }
    }
}
