//! API token strategy
//!
//! Every rotation creates a fresh token with the recorded name, policies,
//! and condition, and revokes the token it replaces once the new one is
//! promoted.

use async_trait::async_trait;
use cfrotate_platform::{NewApiToken, PlatformApi};
use cfrotate_secret::{ApiTokenAttributes, TokenPolicy};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::{CredentialStrategy, Retirement};
use crate::error::RotationResult;

/// Timestamp format the token API accepts
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub struct ApiTokenStrategy {
    platform: Arc<dyn PlatformApi>,
}

impl ApiTokenStrategy {
    pub fn new(platform: Arc<dyn PlatformApi>) -> Self {
        Self { platform }
    }

    /// Creation request for a token replacing `current`, valid from `now`
    pub fn token_request(current: &ApiTokenAttributes, now: DateTime<Utc>) -> NewApiToken {
        let expires_on = (current.valid_days > 0).then(|| {
            (now + Duration::days(i64::from(current.valid_days)))
                .format(TIMESTAMP_FORMAT)
                .to_string()
        });

        NewApiToken {
            name: current.name.clone(),
            policies: current.policies.iter().map(TokenPolicy::without_id).collect(),
            not_before: now.format(TIMESTAMP_FORMAT).to_string(),
            expires_on,
            condition: current.condition.clone(),
        }
    }
}

#[async_trait]
impl CredentialStrategy for ApiTokenStrategy {
    type Attributes = ApiTokenAttributes;

    async fn mint(&self, current: &ApiTokenAttributes) -> RotationResult<ApiTokenAttributes> {
        let request = Self::token_request(current, Utc::now());
        let created = self.platform.create_api_token(&request).await?;

        tracing::info!(
            name = %current.name,
            previous_token_id = current.token_id.as_deref().unwrap_or("<none>"),
            token_id = %created.id,
            expires_on = request.expires_on.as_deref().unwrap_or("never"),
            "Minted API token"
        );

        Ok(ApiTokenAttributes {
            token_id: Some(created.id),
            token_value: Some(created.value),
            ..current.clone()
        })
    }

    async fn verify(&self, pending: &ApiTokenAttributes) -> RotationResult<bool> {
        let Some(token) = &pending.token_value else {
            tracing::warn!(name = %pending.name, "Pending API token has no TokenValue");
            return Ok(false);
        };
        Ok(self.platform.verify_api_token(token).await?)
    }

    async fn retire(&self, superseded: &ApiTokenAttributes) -> RotationResult<Retirement> {
        let Some(token_id) = &superseded.token_id else {
            return Ok(Retirement::NothingToRetire);
        };
        self.platform.revoke_api_token(token_id).await?;
        Ok(Retirement::Revoked {
            external_id: token_id.clone(),
        })
    }
}
