//! The platform operations credential strategies depend on

use async_trait::async_trait;
use cfrotate_secret::{SecretType, SecretValue};

use crate::error::PlatformResult;
use crate::types::{CreatedApiToken, NewApiToken, OriginCertificate, OriginCertificateRequest};

/// Cloudflare operations used during rotation
///
/// [`CloudflareClient`](crate::CloudflareClient) is the production
/// implementation. Every call is bounded by the client's timeout and retries
/// transient failures before returning.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Fail with `MissingCredentials` unless the configured credentials can
    /// rotate `secret_type`
    fn require(&self, secret_type: SecretType) -> PlatformResult<()>;

    /// Create an API token
    async fn create_api_token(&self, token: &NewApiToken) -> PlatformResult<CreatedApiToken>;

    /// Delete an API token; a token that no longer exists counts as deleted
    async fn revoke_api_token(&self, token_id: &str) -> PlatformResult<()>;

    /// Whether `token` authenticates and is active
    async fn verify_api_token(&self, token: &SecretValue) -> PlatformResult<bool>;

    /// Issue a fresh origin tunnel service key
    async fn create_tunnel_service_key(&self) -> PlatformResult<SecretValue>;

    /// Request an origin certificate for a CSR
    async fn create_origin_certificate(
        &self,
        request: &OriginCertificateRequest,
    ) -> PlatformResult<OriginCertificate>;

    /// Whether `key` authenticates as a user service key, optionally
    /// scoped to a zone
    async fn probe_service_key(&self, key: &SecretValue, zone_id: Option<&str>)
    -> PlatformResult<bool>;
}
