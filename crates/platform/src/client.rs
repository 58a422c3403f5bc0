//! HTTP client for the Cloudflare v4 API

use async_trait::async_trait;
use cfrotate_secret::{SecretType, SecretValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::api::PlatformApi;
use crate::credentials::{AuthScheme, PlatformCredentials};
use crate::error::{PlatformError, PlatformResult};
use crate::retry::{RetryPolicy, retry_with_policy};
use crate::types::{
    CreatedApiToken, Envelope, NewApiToken, OriginCertificate, OriginCertificateRequest,
    ServiceKeyResult, TokenVerification,
};

/// Production API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Error code the API uses for a token id it does not know
const INVALID_OR_MISSING_TOKEN: i64 = 1003;

/// Construction parameters of [`CloudflareClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without a trailing slash
    pub base_url: String,

    /// Per-request timeout, 1 to 60 seconds
    pub timeout: Duration,

    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Validate configuration values
    pub fn validate(&self) -> PlatformResult<()> {
        let invalid = |reason: String| PlatformError::InvalidConfig { reason };

        if !(1..=60).contains(&self.timeout.as_secs()) {
            return Err(invalid(format!(
                "timeout must be between 1 and 60 seconds, got {:?}",
                self.timeout
            )));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(invalid(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        self.retry.validate().map_err(invalid)
    }
}

/// Cloudflare API client
#[derive(Debug, Clone)]
pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    credentials: PlatformCredentials,
}

impl CloudflareClient {
    /// Build a client
    pub fn new(config: ClientConfig, credentials: PlatformCredentials) -> PlatformResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(format!("cfrotate/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlatformError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
            credentials,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    /// Send a request built by `build`, retrying transient failures, and
    /// return the envelope's `result`
    async fn call(
        &self,
        operation: &'static str,
        build: impl Fn() -> RequestBuilder + Send + Sync,
    ) -> PlatformResult<Value> {
        retry_with_policy(&self.retry, PlatformError::is_transient, |attempt| {
            let request = build();
            async move {
                tracing::debug!(operation, attempt, "Calling Cloudflare");
                send(operation, request).await
            }
        })
        .await
    }
}

fn transport_error(operation: &'static str, err: &reqwest::Error) -> PlatformError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    PlatformError::Transient {
        operation,
        status: err.status().map(|s| s.as_u16()),
        reason,
    }
}

/// Execute one request and classify the outcome
async fn send(operation: &'static str, request: RequestBuilder) -> PlatformResult<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| transport_error(operation, &e))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(operation, &e))?;
    let envelope = serde_json::from_str::<Envelope<Value>>(&body).ok();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        let reason = envelope
            .as_ref()
            .and_then(|env| env.errors.first())
            .map_or_else(|| format!("HTTP {status}"), |first| format!("HTTP {status}: {first}"));
        return Err(PlatformError::Transient {
            operation,
            status: Some(status.as_u16()),
            reason,
        });
    }

    let Some(envelope) = envelope else {
        if status.is_success() {
            return Err(PlatformError::Decode {
                operation,
                reason: "response body is not an API envelope".into(),
            });
        }
        return Err(PlatformError::Rejected {
            operation,
            status: status.as_u16(),
            errors: Vec::new(),
        });
    };

    if !status.is_success() || !envelope.success {
        return Err(PlatformError::Rejected {
            operation,
            status: status.as_u16(),
            errors: envelope.errors,
        });
    }

    if !envelope.messages.is_empty() {
        tracing::debug!(operation, messages = ?envelope.messages, "Cloudflare returned messages");
    }
    Ok(envelope.result.unwrap_or(Value::Null))
}

fn decode<T: DeserializeOwned>(operation: &'static str, result: Value) -> PlatformResult<T> {
    serde_json::from_value(result).map_err(|e| PlatformError::Decode {
        operation,
        reason: e.to_string(),
    })
}

/// Map authentication failures of a probe to a negative answer
fn probe_outcome<T>(result: PlatformResult<T>) -> PlatformResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PlatformError::Rejected {
            status: 401 | 403, ..
        }) => Ok(None),
        Err(err) => Err(err),
    }
}

#[async_trait]
impl PlatformApi for CloudflareClient {
    fn require(&self, secret_type: SecretType) -> PlatformResult<()> {
        self.credentials.require(secret_type)
    }

    #[tracing::instrument(skip(self, token), fields(name = %token.name))]
    async fn create_api_token(&self, token: &NewApiToken) -> PlatformResult<CreatedApiToken> {
        const OP: &str = "create_api_token";
        let auth = self.credentials.token_management()?;
        tracing::debug!(auth = auth.name(), "Creating API token");

        let result = self
            .call(OP, || auth.apply(self.request(Method::POST, "/user/tokens")).json(token))
            .await?;
        let created: CreatedApiToken = decode(OP, result)?;

        tracing::info!(token_id = %created.id, "Created API token");
        Ok(created)
    }

    #[tracing::instrument(skip(self))]
    async fn revoke_api_token(&self, token_id: &str) -> PlatformResult<()> {
        const OP: &str = "revoke_api_token";
        let auth = self.credentials.token_management()?;
        let path = format!("/user/tokens/{token_id}");

        match self
            .call(OP, || auth.apply(self.request(Method::DELETE, &path)))
            .await
        {
            Ok(_) => {
                tracing::info!("Revoked API token");
                Ok(())
            }
            Err(PlatformError::Rejected { status, errors, .. })
                if status == 404 || errors.iter().any(|e| e.code == INVALID_OR_MISSING_TOKEN) =>
            {
                tracing::info!(status, "API token already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    #[tracing::instrument(skip_all)]
    async fn verify_api_token(&self, token: &SecretValue) -> PlatformResult<bool> {
        const OP: &str = "verify_api_token";
        let result = probe_outcome(
            self.call(OP, || {
                self.request(Method::GET, "/user/tokens/verify")
                    .bearer_auth(token.expose())
            })
            .await,
        )?;

        let Some(result) = result else {
            tracing::info!("API token was refused");
            return Ok(false);
        };
        let verification: TokenVerification = decode(OP, result)?;
        tracing::info!(
            token_id = verification.id.as_deref().unwrap_or("<unknown>"),
            status = %verification.status,
            "Verified API token"
        );
        Ok(verification.status == "active")
    }

    #[tracing::instrument(skip(self))]
    async fn create_tunnel_service_key(&self) -> PlatformResult<SecretValue> {
        const OP: &str = "create_tunnel_service_key";
        let auth = self.credentials.global_key("issue tunnel service keys")?;

        let result = self
            .call(OP, || {
                auth.apply(self.request(Method::GET, "/user/service_keys/origintunnel"))
            })
            .await?;
        let key: ServiceKeyResult = decode(OP, result)?;
        if key.service_key.is_empty() {
            return Err(PlatformError::Decode {
                operation: OP,
                reason: "empty service key".into(),
            });
        }

        tracing::info!("Issued tunnel service key");
        Ok(key.service_key)
    }

    #[tracing::instrument(
        skip(self, request),
        fields(hostnames = ?request.hostnames, validity = request.requested_validity)
    )]
    async fn create_origin_certificate(
        &self,
        request: &OriginCertificateRequest,
    ) -> PlatformResult<OriginCertificate> {
        const OP: &str = "create_origin_certificate";
        let auth = self.credentials.origin_ca("issue origin certificates")?;

        let result = self
            .call(OP, || {
                auth.apply(self.request(Method::POST, "/certificates"))
                    .json(request)
            })
            .await?;
        let certificate: OriginCertificate = decode(OP, result)?;

        tracing::info!(
            certificate_id = ?certificate.id,
            expires_on = ?certificate.expires_on,
            "Issued origin certificate"
        );
        Ok(certificate)
    }

    #[tracing::instrument(skip(self, key))]
    async fn probe_service_key(
        &self,
        key: &SecretValue,
        zone_id: Option<&str>,
    ) -> PlatformResult<bool> {
        const OP: &str = "probe_service_key";
        let result = self
            .call(OP, || {
                let request = AuthScheme::ServiceKey(key.expose())
                    .apply(self.request(Method::GET, "/certificates"));
                match zone_id {
                    Some(zone) => request.query(&[("zone_id", zone)]),
                    None => request,
                }
            })
            .await;

        let accepted = match result {
            Ok(_) => true,
            Err(PlatformError::Rejected {
                status: 401 | 403, ..
            }) => false,
            // Without a zone the listing itself is refused; the key got past authentication
            Err(PlatformError::Rejected { status, errors, .. }) if zone_id.is_none() => {
                tracing::debug!(status, ?errors, "Unscoped certificate listing refused");
                true
            }
            Err(err) => return Err(err),
        };
        tracing::info!(accepted, "Probed service key");
        Ok(accepted)
    }
}
