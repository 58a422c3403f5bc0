//! cfrotate platform - Cloudflare v4 API client
//!
//! The [`PlatformApi`] trait is the seam between credential strategies and
//! Cloudflare. [`CloudflareClient`] implements it over HTTP:
//!
//! - bounded per-request timeouts
//! - retry with exponential backoff for transport failures, 429 and 5xx
//! - immediate [`PlatformError::Rejected`] for other 4xx and `success: false`
//! - the authentication scheme each endpoint expects, chosen from
//!   [`PlatformCredentials`]
#![forbid(unsafe_code)]

pub mod api;
pub mod client;
pub mod credentials;
pub mod error;
pub mod retry;
pub mod types;

pub use crate::api::PlatformApi;
pub use crate::client::{ClientConfig, CloudflareClient, DEFAULT_BASE_URL};
pub use crate::credentials::PlatformCredentials;
pub use crate::error::{PlatformError, PlatformResult};
pub use crate::retry::{RetryPolicy, retry_with_policy};
pub use crate::types::{
    ApiMessage, CreatedApiToken, NewApiToken, OriginCertificate, OriginCertificateRequest,
};
