//! Rotation orchestrator
//!
//! [`Rotator::handle`] runs one step of the four-step rotation protocol. Every
//! step starts from the labels the store reports, so re-delivered events and
//! events for a rotation that already advanced settle without side effects.

use cfrotate_platform::PlatformApi;
use cfrotate_secret::{
    SecretDescription, SecretId, SecretPayload, SecretStore, SecretValue, StageLabel, StoreError,
    VersionId, VersionSelector,
};
use std::sync::Arc;

use crate::error::{RotationError, RotationResult};
use crate::event::{RotationEvent, RotationStep};
use crate::strategy::{Retirement, Strategies};

/// Outcome of event admission
enum Admission {
    /// The version is already `AWSCURRENT`; nothing left to do
    Settled,
    /// The version is `AWSPENDING`; run the step
    Proceed(SecretDescription),
}

/// Drives rotation steps against a secret store and the platform
pub struct Rotator {
    store: Arc<dyn SecretStore>,
    platform: Arc<dyn PlatformApi>,
    strategies: Strategies,
}

impl Rotator {
    /// Create a rotator
    ///
    /// `inline_service_key` is the tunnel service key used for Argo tunnel
    /// tokens that do not reference one.
    pub fn new(
        store: Arc<dyn SecretStore>,
        platform: Arc<dyn PlatformApi>,
        inline_service_key: Option<SecretValue>,
    ) -> Self {
        let strategies =
            Strategies::new(Arc::clone(&platform), Arc::clone(&store), inline_service_key);
        Self {
            store,
            platform,
            strategies,
        }
    }

    /// Run one rotation step
    #[tracing::instrument(
        skip(self, event),
        fields(
            secret_id = %event.secret_id,
            version = %event.client_request_token,
            step = %event.step,
        )
    )]
    pub async fn handle(&self, event: &RotationEvent) -> RotationResult<()> {
        let description = match self.admit(event).await? {
            Admission::Settled => {
                tracing::info!("Version is already AWSCURRENT; nothing to do");
                return Ok(());
            }
            Admission::Proceed(description) => description,
        };

        let id = &event.secret_id;
        let token = &event.client_request_token;
        match event.step {
            RotationStep::CreateSecret => self.create(id, token).await,
            RotationStep::SetSecret => {
                tracing::info!(
                    "Credential is live at the platform once minted; setSecret is a no-op"
                );
                Ok(())
            }
            RotationStep::TestSecret => self.test(id, token, &description).await,
            RotationStep::FinishSecret => self.finish(id, token, &description).await,
        }
    }

    /// Check that the event fits the secret's labels
    async fn admit(&self, event: &RotationEvent) -> RotationResult<Admission> {
        let id = &event.secret_id;
        let token = &event.client_request_token;
        let description = self.store.describe(id).await?;

        if !description.rotation_enabled {
            return Err(invalid_state(id, "rotation is not enabled"));
        }
        if !description.versions.contains_version(token) {
            return Err(invalid_state(
                id,
                format!("version {token} has no stage for rotation"),
            ));
        }
        if description.versions.has(token, &StageLabel::Current) {
            return Ok(Admission::Settled);
        }
        if !description.versions.has(token, &StageLabel::Pending) {
            return Err(invalid_state(
                id,
                format!("version {token} is not set as AWSPENDING for rotation"),
            ));
        }
        Ok(Admission::Proceed(description))
    }

    async fn create(&self, id: &SecretId, token: &VersionId) -> RotationResult<()> {
        let pending = VersionSelector::VersionInStage(token.clone(), StageLabel::Pending);
        match self.store.get_value(id, &pending).await {
            Ok(_) => {
                tracing::info!("Pending version already holds a value");
                return Ok(());
            }
            Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let current = self.read_seed(id).await?;
        let payload = SecretPayload::decode(&current)?;
        let secret_type = payload.secret_type();
        self.platform.require(secret_type)?;

        let minted = self.strategies.mint(&payload).await?;
        let encoded = minted.encode()?;
        self.store.put_pending(id, token, &encoded).await?;

        tracing::info!(%secret_type, "Stored new credential as AWSPENDING");
        Ok(())
    }

    /// Payload the next credential is derived from: `AWSCURRENT`, else `CFINIT`
    async fn read_seed(&self, id: &SecretId) -> RotationResult<String> {
        match self
            .store
            .get_value(id, &VersionSelector::Stage(StageLabel::Current))
            .await
        {
            Ok(raw) => return Ok(raw),
            Err(StoreError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        match self
            .store
            .get_value(id, &VersionSelector::Stage(StageLabel::Init))
            .await
        {
            Ok(raw) => {
                tracing::info!("No AWSCURRENT version; rotating from the CFINIT seed");
                Ok(raw)
            }
            Err(StoreError::NotFound { .. }) => Err(RotationError::NotFound {
                what: format!("AWSCURRENT or CFINIT version of {id}"),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn test(
        &self,
        id: &SecretId,
        token: &VersionId,
        description: &SecretDescription,
    ) -> RotationResult<()> {
        let raw = self
            .store
            .get_value(
                id,
                &VersionSelector::VersionInStage(token.clone(), StageLabel::Pending),
            )
            .await?;
        let payload = SecretPayload::decode(&raw)?;
        let secret_type = payload.secret_type();

        if !self.strategies.verify(&payload).await? {
            return Err(RotationError::Verification {
                secret_id: id.to_string(),
                version: token.to_string(),
                secret_type: secret_type.as_str(),
            });
        }

        let holder = description.versions.holder(&StageLabel::Verified);
        if holder == Some(token) {
            tracing::info!(%secret_type, "Pending credential verified; already marked CFVERIFIED");
            return Ok(());
        }
        self.store
            .move_stage(id, &StageLabel::Verified, token, holder)
            .await?;

        tracing::info!(%secret_type, "Pending credential verified; marked CFVERIFIED");
        Ok(())
    }

    async fn finish(
        &self,
        id: &SecretId,
        token: &VersionId,
        description: &SecretDescription,
    ) -> RotationResult<()> {
        if !description.versions.has(token, &StageLabel::Verified) {
            return Err(RotationError::NotVerified {
                secret_id: id.to_string(),
                version: token.to_string(),
            });
        }

        let old = description.versions.holder(&StageLabel::Current).cloned();
        let superseded = match &old {
            Some(version) => match self
                .store
                .get_value(id, &VersionSelector::Version(version.clone()))
                .await
            {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(
                        superseded = %version,
                        error = %e,
                        "Could not read the superseded version; its credential will not be retired"
                    );
                    None
                }
            },
            None => None,
        };

        self.store
            .move_stage(id, &StageLabel::Current, token, old.as_ref())
            .await?;
        tracing::info!(
            superseded = old.as_ref().map_or("<none>", VersionId::as_str),
            "Promoted pending version to AWSCURRENT"
        );

        if let Some(raw) = superseded {
            self.retire(&raw).await;
        }
        Ok(())
    }

    /// Retire a superseded credential; failures are logged, never returned
    async fn retire(&self, raw: &str) {
        let payload = match SecretPayload::decode(raw) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Superseded version does not decode; nothing retired");
                return;
            }
        };

        let secret_type = payload.secret_type();
        match self.strategies.retire(&payload).await {
            Ok(Retirement::Revoked { external_id }) => {
                tracing::info!(%secret_type, %external_id, "Revoked superseded credential");
            }
            Ok(Retirement::NothingToRetire) => {
                tracing::info!(%secret_type, "Superseded version held no platform credential");
            }
            Ok(Retirement::Unsupported { reason }) => {
                tracing::info!(%secret_type, reason, "Superseded credential left in place");
            }
            Err(e) => {
                tracing::warn!(
                    %secret_type,
                    error = %e,
                    kind = e.kind(),
                    "Failed to retire superseded credential"
                );
            }
        }
    }
}

fn invalid_state(id: &SecretId, reason: impl Into<String>) -> RotationError {
    RotationError::InvalidState {
        secret_id: id.to_string(),
        reason: reason.into(),
    }
}
