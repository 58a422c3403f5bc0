//! In-memory secret store
//!
//! Mirrors the labelling rules of AWS Secrets Manager closely enough to run
//! complete rotations in tests and local dry runs.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::id::{SecretId, VersionId};
use crate::stage::{StageLabel, VersionStages};
use crate::store::{SecretDescription, SecretStore, VersionSelector};

#[derive(Debug, Default)]
struct VersionEntry {
    value: Option<String>,
    labels: BTreeSet<StageLabel>,
}

#[derive(Debug)]
struct Record {
    rotation_enabled: bool,
    versions: BTreeMap<VersionId, VersionEntry>,
}

impl Record {
    fn holder(&self, stage: &StageLabel) -> Option<VersionId> {
        self.versions
            .iter()
            .find(|(_, entry)| entry.labels.contains(stage))
            .map(|(version, _)| version.clone())
    }

    fn detach(&mut self, stage: &StageLabel) {
        for entry in self.versions.values_mut() {
            entry.labels.remove(stage);
        }
    }

    fn stages(&self) -> VersionStages {
        let mut stages = VersionStages::new();
        for (version, entry) in &self.versions {
            stages.insert(version.clone(), entry.labels.iter().cloned());
        }
        stages
    }
}

/// Secret store kept in process memory
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    records: RwLock<BTreeMap<SecretId, Record>>,
    next_version: AtomicU64,
}

impl MemorySecretStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_version(&self) -> StoreResult<VersionId> {
        let n = self.next_version.fetch_add(1, Ordering::Relaxed) + 1;
        VersionId::new(format!("00000000-0000-4000-8000-{n:012x}"))
    }

    /// Create a secret whose first version carries `stage`
    ///
    /// Rotation is enabled on the new secret. Returns the seed version.
    pub async fn seed(
        &self,
        id: &SecretId,
        payload: &str,
        stage: StageLabel,
    ) -> StoreResult<VersionId> {
        let version = self.fresh_version()?;
        let mut versions = BTreeMap::new();
        versions.insert(
            version.clone(),
            VersionEntry {
                value: Some(payload.to_string()),
                labels: BTreeSet::from([stage]),
            },
        );
        self.records.write().await.insert(
            id.clone(),
            Record {
                rotation_enabled: true,
                versions,
            },
        );
        Ok(version)
    }

    /// Toggle the rotation flag of a secret
    pub async fn set_rotation_enabled(&self, id: &SecretId, enabled: bool) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("secret {id}")))?;
        record.rotation_enabled = enabled;
        Ok(())
    }

    /// Start a rotation the way the store does before invoking the handler
    ///
    /// Creates an empty version labelled `AWSPENDING` and returns its id,
    /// which the caller passes as the event's client request token.
    pub async fn begin_rotation(&self, id: &SecretId) -> StoreResult<VersionId> {
        let version = self.fresh_version()?;
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("secret {id}")))?;
        record.detach(&StageLabel::Pending);
        record.versions.insert(
            version.clone(),
            VersionEntry {
                value: None,
                labels: BTreeSet::from([StageLabel::Pending]),
            },
        );
        Ok(version)
    }

    /// Value stored for a version, bypassing label checks
    pub async fn value_of(&self, id: &SecretId, version: &VersionId) -> Option<String> {
        self.records
            .read()
            .await
            .get(id)
            .and_then(|record| record.versions.get(version))
            .and_then(|entry| entry.value.clone())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn describe(&self, id: &SecretId) -> StoreResult<SecretDescription> {
        let records = self.records.read().await;
        let record = records
            .get(id)
            .ok_or_else(|| StoreError::not_found(format!("secret {id}")))?;
        Ok(SecretDescription {
            id: id.clone(),
            rotation_enabled: record.rotation_enabled,
            versions: record.stages(),
        })
    }

    async fn get_value(&self, id: &SecretId, selector: &VersionSelector) -> StoreResult<String> {
        let records = self.records.read().await;
        let record = records
            .get(id)
            .ok_or_else(|| StoreError::not_found(format!("secret {id}")))?;

        let entry = match selector {
            VersionSelector::Stage(stage) => record
                .versions
                .values()
                .find(|entry| entry.labels.contains(stage)),
            VersionSelector::Version(version) => record.versions.get(version),
            VersionSelector::VersionInStage(version, stage) => record
                .versions
                .get(version)
                .filter(|entry| entry.labels.contains(stage)),
        };

        entry
            .and_then(|entry| entry.value.clone())
            .ok_or_else(|| StoreError::not_found(format!("{selector} of secret {id}")))
    }

    async fn put_pending(
        &self,
        id: &SecretId,
        version: &VersionId,
        payload: &str,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("secret {id}")))?;

        if let Some(existing) = record
            .versions
            .get(version)
            .and_then(|entry| entry.value.as_deref())
        {
            if existing == payload {
                return Ok(());
            }
            return Err(StoreError::InvalidRequest {
                reason: format!("version {version} of {id} already holds a different value"),
            });
        }

        if record.holder(&StageLabel::Pending).as_ref() != Some(version) {
            record.detach(&StageLabel::Pending);
        }
        let entry = record.versions.entry(version.clone()).or_default();
        entry.value = Some(payload.to_string());
        entry.labels.insert(StageLabel::Pending);
        Ok(())
    }

    async fn move_stage(
        &self,
        id: &SecretId,
        stage: &StageLabel,
        to: &VersionId,
        from: Option<&VersionId>,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("secret {id}")))?;

        if !record.versions.contains_key(to) {
            return Err(StoreError::not_found(format!("version {to} of secret {id}")));
        }

        let holder = record.holder(stage);
        if holder.as_ref() == Some(to) {
            return Ok(());
        }
        if let Some(attached) = &holder
            && from != Some(attached)
        {
            return Err(StoreError::StageConflict {
                secret_id: id.to_string(),
                stage: stage.to_string(),
                attached_to: attached.to_string(),
                expected: from.map_or_else(|| "<none>".to_string(), ToString::to_string),
            });
        }

        record.detach(stage);
        if let Some(entry) = record.versions.get_mut(to) {
            entry.labels.insert(stage.clone());
            if *stage == StageLabel::Current {
                entry.labels.remove(&StageLabel::Pending);
            }
        }

        if *stage == StageLabel::Current
            && let Some(demoted) = holder
        {
            record.detach(&StageLabel::Previous);
            if let Some(entry) = record.versions.get_mut(&demoted) {
                entry.labels.insert(StageLabel::Previous);
            }
        }

        tracing::debug!(secret = %id, stage = %stage, to = %to, "Moved stage");
        Ok(())
    }
}
