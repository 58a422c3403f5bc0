//! cfrotate secret - payloads and storage for rotated Cloudflare credentials
//!
//! This crate owns everything the rotation engine knows about the secret
//! store:
//!
//! - **Identifiers** - [`SecretId`] (ARN or name) and [`VersionId`]
//!   (the store's client request token)
//! - **Stage labels** - [`StageLabel`] and the per-version label map
//! - **Codec** - [`SecretPayload`], the `{"Type", "Attributes"}` JSON payload
//!   with per-type schema validation
//! - **Store interface** - the [`SecretStore`] trait, an in-memory
//!   implementation, and the AWS Secrets Manager implementation
//!   (feature `aws`)
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod memory;
pub mod payload;
pub mod stage;
pub mod store;

#[cfg(feature = "aws")]
pub mod aws;

pub use crate::error::{SchemaError, SchemaResult, StoreError, StoreResult};
pub use crate::id::{SecretId, VersionId};
pub use crate::memory::MemorySecretStore;
pub use crate::payload::{
    ApiTokenAttributes, ArgoTunnelTokenAttributes, PermissionGroup, PolicyEffect, SecretPayload,
    SecretType, SecretValue, TokenPolicy, TunnelServiceKeyAttributes, VALID_ORIGIN_CERT_DAYS,
};
pub use crate::stage::{StageLabel, VersionStages};
pub use crate::store::{SecretDescription, SecretStore, VersionSelector};

#[cfg(feature = "aws")]
pub use crate::aws::{AwsSecretsManagerConfig, AwsSecretsManagerStore};
