//! cfrotate rotation - the rotation engine
//!
//! Runs the Secrets Manager rotation protocol for Cloudflare credentials:
//!
//! - [`Rotator`] admits an event against the secret's labels and runs one of
//!   `createSecret`, `setSecret`, `testSecret`, `finishSecret`
//! - [`strategy`] holds one [`CredentialStrategy`] per secret type
//! - [`ArgoTunnelBundle`] renders and parses the tunnel token format
//!
//! ```no_run
//! use std::sync::Arc;
//! use cfrotate_platform::{ClientConfig, CloudflareClient, PlatformCredentials};
//! use cfrotate_rotation::{RotationEvent, Rotator};
//! use cfrotate_secret::MemorySecretStore;
//!
//! # async fn run(event: RotationEvent) -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = PlatformCredentials::new().with_api_token("token");
//! let platform = CloudflareClient::new(ClientConfig::default(), credentials)?;
//! let rotator = Rotator::new(Arc::new(MemorySecretStore::new()), Arc::new(platform), None);
//! rotator.handle(&event).await?;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

pub mod bundle;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod strategy;

pub use crate::bundle::{ArgoTunnelBundle, BundleError};
pub use crate::error::{RotationError, RotationResult};
pub use crate::event::{RotationEvent, RotationStep};
pub use crate::orchestrator::Rotator;
pub use crate::strategy::{CredentialStrategy, Retirement, Strategies};
