//! Secret store interface
//!
//! The rotation engine never owns secret storage. It reads and writes
//! versions through this trait, and relies on [`SecretStore::move_stage`]
//! being atomic on the store's side.

use async_trait::async_trait;
use std::fmt;

use crate::error::StoreResult;
use crate::id::{SecretId, VersionId};
use crate::stage::{StageLabel, VersionStages};

/// Which version of a secret to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// The version currently carrying a label
    Stage(StageLabel),
    /// A specific version
    Version(VersionId),
    /// A specific version, only if it carries the label
    VersionInStage(VersionId, StageLabel),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(stage) => write!(f, "stage {stage}"),
            Self::Version(version) => write!(f, "version {version}"),
            Self::VersionInStage(version, stage) => write!(f, "version {version} in stage {stage}"),
        }
    }
}

/// Metadata of a secret relevant to rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretDescription {
    pub id: SecretId,
    pub rotation_enabled: bool,
    pub versions: VersionStages,
}

/// Storage backend holding the rotated secrets
///
/// Implementations must be safe to share across tasks; the engine holds them
/// behind `Arc<dyn SecretStore>`.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Rotation flag and version labels of a secret
    async fn describe(&self, id: &SecretId) -> StoreResult<SecretDescription>;

    /// Secret string of the selected version
    ///
    /// Returns `StoreError::NotFound` when the secret, the version, or a value
    /// for the version does not exist.
    async fn get_value(&self, id: &SecretId, selector: &VersionSelector) -> StoreResult<String>;

    /// Store `payload` as the value of `version`, labelled `AWSPENDING`
    ///
    /// Repeating the call with the same payload is a no-op.
    async fn put_pending(&self, id: &SecretId, version: &VersionId, payload: &str)
    -> StoreResult<()>;

    /// Atomically move `stage` onto `to`, removing it from `from`
    ///
    /// `from` must name the version currently carrying the label (or be
    /// `None` when no version carries it). Moving `AWSCURRENT` also attaches
    /// `AWSPREVIOUS` to the demoted version and drops `AWSPENDING` from the
    /// promoted one.
    async fn move_stage(
        &self,
        id: &SecretId,
        stage: &StageLabel,
        to: &VersionId,
        from: Option<&VersionId>,
    ) -> StoreResult<()>;
}
