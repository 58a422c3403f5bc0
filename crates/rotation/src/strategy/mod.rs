//! Credential strategies
//!
//! One strategy per [`SecretType`](cfrotate_secret::SecretType). Each knows
//! how to mint a replacement credential, check it against the platform, and
//! retire the credential it replaced. [`Strategies`] dispatches on the decoded
//! payload with an exhaustive `match`.

mod api_token;
mod argo_tunnel;
mod tunnel_service_key;

pub use api_token::ApiTokenStrategy;
pub use argo_tunnel::ArgoTunnelStrategy;
pub use tunnel_service_key::TunnelServiceKeyStrategy;

use async_trait::async_trait;
use cfrotate_platform::PlatformApi;
use cfrotate_secret::{SecretPayload, SecretStore, SecretValue};
use std::sync::Arc;

use crate::error::RotationResult;

/// What happened to a superseded credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retirement {
    /// Revoked at the platform (or already gone)
    Revoked { external_id: String },
    /// The superseded version never held a platform credential
    NothingToRetire,
    /// The credential type cannot be revoked; it stays valid
    Unsupported { reason: &'static str },
}

/// Mint, verify, and retire one credential type
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    /// Attributes of the secret type this strategy handles
    type Attributes: Send + Sync;

    /// Create a new credential, returning the attributes of the pending version
    async fn mint(&self, current: &Self::Attributes) -> RotationResult<Self::Attributes>;

    /// Live check of a pending credential
    ///
    /// `Ok(false)` means the platform does not accept it.
    async fn verify(&self, pending: &Self::Attributes) -> RotationResult<bool>;

    /// Retire the credential of a superseded version
    async fn retire(&self, superseded: &Self::Attributes) -> RotationResult<Retirement>;
}

/// All strategies, dispatched by payload type
pub struct Strategies {
    api_token: ApiTokenStrategy,
    tunnel_service_key: TunnelServiceKeyStrategy,
    argo_tunnel: ArgoTunnelStrategy,
}

impl Strategies {
    /// Build the strategies over a platform client
    ///
    /// `store` resolves `TunnelServiceKeyArn` references; `inline_service_key`
    /// is the fallback tunnel service key for Argo tunnel tokens.
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        store: Arc<dyn SecretStore>,
        inline_service_key: Option<SecretValue>,
    ) -> Self {
        Self {
            api_token: ApiTokenStrategy::new(Arc::clone(&platform)),
            tunnel_service_key: TunnelServiceKeyStrategy::new(Arc::clone(&platform)),
            argo_tunnel: ArgoTunnelStrategy::new(platform, store, inline_service_key),
        }
    }

    pub async fn mint(&self, current: &SecretPayload) -> RotationResult<SecretPayload> {
        Ok(match current {
            SecretPayload::ApiToken(attrs) => {
                SecretPayload::ApiToken(self.api_token.mint(attrs).await?)
            }
            SecretPayload::TunnelServiceKey(attrs) => {
                SecretPayload::TunnelServiceKey(self.tunnel_service_key.mint(attrs).await?)
            }
            SecretPayload::ArgoTunnelToken(attrs) => {
                SecretPayload::ArgoTunnelToken(self.argo_tunnel.mint(attrs).await?)
            }
        })
    }

    pub async fn verify(&self, pending: &SecretPayload) -> RotationResult<bool> {
        match pending {
            SecretPayload::ApiToken(attrs) => self.api_token.verify(attrs).await,
            SecretPayload::TunnelServiceKey(attrs) => self.tunnel_service_key.verify(attrs).await,
            SecretPayload::ArgoTunnelToken(attrs) => self.argo_tunnel.verify(attrs).await,
        }
    }

    pub async fn retire(&self, superseded: &SecretPayload) -> RotationResult<Retirement> {
        match superseded {
            SecretPayload::ApiToken(attrs) => self.api_token.retire(attrs).await,
            SecretPayload::TunnelServiceKey(attrs) => self.tunnel_service_key.retire(attrs).await,
            SecretPayload::ArgoTunnelToken(attrs) => self.argo_tunnel.retire(attrs).await,
        }
    }
}
