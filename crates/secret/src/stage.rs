//! Version stage labels

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::id::VersionId;

/// A staging label attached to a secret version
///
/// The store's own labels use their wire names (`AWSCURRENT`, ...). `CFINIT`
/// marks the out-of-band seed version and `CFVERIFIED` marks the version whose
/// credential passed its live check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StageLabel {
    Current,
    Pending,
    Previous,
    Init,
    Verified,
    Custom(String),
}

impl StageLabel {
    /// Wire name used by the store
    pub fn as_str(&self) -> &str {
        match self {
            Self::Current => "AWSCURRENT",
            Self::Pending => "AWSPENDING",
            Self::Previous => "AWSPREVIOUS",
            Self::Init => "CFINIT",
            Self::Verified => "CFVERIFIED",
            Self::Custom(label) => label,
        }
    }

    /// Parse a wire name
    pub fn parse(label: &str) -> Self {
        match label {
            "AWSCURRENT" => Self::Current,
            "AWSPENDING" => Self::Pending,
            "AWSPREVIOUS" => Self::Previous,
            "CFINIT" => Self::Init,
            "CFVERIFIED" => Self::Verified,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for StageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StageLabel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<StageLabel> for String {
    fn from(label: StageLabel) -> Self {
        label.as_str().to_string()
    }
}

/// Labels attached to each version of a secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStages(BTreeMap<VersionId, BTreeSet<StageLabel>>);

impl VersionStages {
    /// Empty label map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the labels of one version, replacing any previous entry
    pub fn insert(&mut self, version: VersionId, labels: impl IntoIterator<Item = StageLabel>) {
        self.0.insert(version, labels.into_iter().collect());
    }

    /// Whether the store knows this version at all
    pub fn contains_version(&self, version: &VersionId) -> bool {
        self.0.contains_key(version)
    }

    /// Labels of a version (empty when the version is unknown)
    pub fn labels(&self, version: &VersionId) -> impl Iterator<Item = &StageLabel> {
        self.0.get(version).into_iter().flatten()
    }

    /// Whether `version` carries `label`
    pub fn has(&self, version: &VersionId, label: &StageLabel) -> bool {
        self.0
            .get(version)
            .is_some_and(|labels| labels.contains(label))
    }

    /// Version currently carrying `label`, if any
    pub fn holder(&self, label: &StageLabel) -> Option<&VersionId> {
        self.0
            .iter()
            .find(|(_, labels)| labels.contains(label))
            .map(|(version, _)| version)
    }

    /// Number of versions carrying `label`
    pub fn count(&self, label: &StageLabel) -> usize {
        self.0.values().filter(|labels| labels.contains(label)).count()
    }

    /// Iterate over versions and their labels
    pub fn iter(&self) -> impl Iterator<Item = (&VersionId, &BTreeSet<StageLabel>)> {
        self.0.iter()
    }

    /// Number of known versions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no versions are known
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
