//! Tunnel service key strategy

use async_trait::async_trait;
use cfrotate_platform::PlatformApi;
use cfrotate_secret::TunnelServiceKeyAttributes;
use std::sync::Arc;

use super::{CredentialStrategy, Retirement};
use crate::error::RotationResult;

pub struct TunnelServiceKeyStrategy {
    platform: Arc<dyn PlatformApi>,
}

impl TunnelServiceKeyStrategy {
    pub fn new(platform: Arc<dyn PlatformApi>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl CredentialStrategy for TunnelServiceKeyStrategy {
    type Attributes = TunnelServiceKeyAttributes;

    async fn mint(
        &self,
        current: &TunnelServiceKeyAttributes,
    ) -> RotationResult<TunnelServiceKeyAttributes> {
        let key_value = self.platform.create_tunnel_service_key().await?;
        tracing::info!("Minted tunnel service key");

        Ok(TunnelServiceKeyAttributes {
            key_value,
            extra: current.extra.clone(),
        })
    }

    async fn verify(&self, pending: &TunnelServiceKeyAttributes) -> RotationResult<bool> {
        Ok(self
            .platform
            .probe_service_key(&pending.key_value, None)
            .await?)
    }

    async fn retire(&self, _superseded: &TunnelServiceKeyAttributes) -> RotationResult<Retirement> {
        Ok(Retirement::Unsupported {
            reason: "tunnel service keys cannot be revoked; the superseded key remains valid",
        })
    }
}
