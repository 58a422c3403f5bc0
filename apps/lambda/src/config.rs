//! Function configuration
//!
//! Read once per cold start from the environment. `CF_*` variables carry
//! platform credentials, `ROTATOR_*` variables tune the handler:
//!
//! | Variable | Field |
//! |---|---|
//! | `CF_API_TOKEN` | `api_token` |
//! | `CF_API_KEY`, `CF_API_EMAIL` | `api_key`, `api_email` |
//! | `CF_API_CERTKEY` | `api_certkey` |
//! | `CF_TUNNEL_SERVICE_KEY` | `tunnel_service_key` |
//! | `CF_API_BASE_URL` | `api_base_url` |
//! | `ROTATOR_TIMEOUT_SECS` | `timeout_secs` |
//! | `ROTATOR_MAX_RETRIES` | `max_retries` |
//! | `ROTATOR_LOG_LEVEL` | `log_level` |
//! | `ROTATOR_LOG_FORMAT` | `log_format` |

use anyhow::{Context, bail};
use cfrotate_platform::{ClientConfig, DEFAULT_BASE_URL, PlatformCredentials, RetryPolicy};
use cfrotate_secret::{AwsSecretsManagerConfig, SecretValue};
use figment::Figment;
use figment::providers::Env;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

const CF_KEYS: [&str; 6] = [
    "api_token",
    "api_key",
    "api_email",
    "api_certkey",
    "tunnel_service_key",
    "api_base_url",
];
const ROTATOR_KEYS: [&str; 4] = ["timeout_secs", "max_retries", "log_level", "log_format"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Settings of the rotation function
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LambdaConfig {
    #[serde(deserialize_with = "secret")]
    pub api_token: Option<SecretString>,
    #[serde(deserialize_with = "secret")]
    pub api_key: Option<SecretString>,
    #[serde(deserialize_with = "text")]
    pub api_email: Option<String>,
    #[serde(deserialize_with = "secret")]
    pub api_certkey: Option<SecretString>,
    #[serde(deserialize_with = "secret")]
    pub tunnel_service_key: Option<SecretString>,
    #[serde(deserialize_with = "text")]
    pub api_base_url: Option<String>,

    /// Per-request timeout for platform and store calls
    pub timeout_secs: u64,
    /// Retries of transient platform failures
    pub max_retries: u32,
    /// `EnvFilter` directive
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for LambdaConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_key: None,
            api_email: None,
            api_certkey: None,
            tunnel_service_key: None,
            api_base_url: None,
            timeout_secs: 10,
            max_retries: 2,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl LambdaConfig {
    /// Load from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_figment(&Self::figment())
    }

    /// Environment providers, `CF_*` then `ROTATOR_*`
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Env::prefixed("CF_").only(&CF_KEYS))
            .merge(Env::prefixed("ROTATOR_").only(&ROTATOR_KEYS))
    }

    pub fn from_figment(figment: &Figment) -> anyhow::Result<Self> {
        let config: Self = figment
            .extract()
            .context("failed to read configuration from environment")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=60).contains(&self.timeout_secs) {
            bail!(
                "ROTATOR_TIMEOUT_SECS must be between 1 and 60, got {}",
                self.timeout_secs
            );
        }
        if self.max_retries > 10 {
            bail!(
                "ROTATOR_MAX_RETRIES must be between 0 and 10, got {}",
                self.max_retries
            );
        }
        if self.api_email.is_some() != self.api_key.is_some() {
            bail!("CF_API_EMAIL and CF_API_KEY must be set together");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Platform credentials assembled from the `CF_*` variables
    pub fn credentials(&self) -> PlatformCredentials {
        let mut credentials = PlatformCredentials::new();
        if let Some(token) = &self.api_token {
            credentials = credentials.with_api_token(token.expose_secret());
        }
        if let (Some(email), Some(key)) = (&self.api_email, &self.api_key) {
            credentials = credentials.with_global_key(email.as_str(), key.expose_secret());
        }
        if let Some(key) = &self.api_certkey {
            credentials = credentials.with_origin_ca_key(key.expose_secret());
        }
        credentials
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self
                .api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: self.timeout(),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn store_config(&self) -> AwsSecretsManagerConfig {
        AwsSecretsManagerConfig {
            timeout: self.timeout(),
            ..AwsSecretsManagerConfig::default()
        }
    }

    /// Inline tunnel service key for Argo tunnel tokens
    pub fn inline_service_key(&self) -> Option<SecretValue> {
        self.tunnel_service_key
            .as_ref()
            .map(|key| SecretValue::new(key.expose_secret()))
    }
}

impl fmt::Debug for LambdaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = |value: &Option<SecretString>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("LambdaConfig")
            .field("api_token", &set(&self.api_token))
            .field("api_key", &set(&self.api_key))
            .field("api_email", &self.api_email)
            .field("api_certkey", &set(&self.api_certkey))
            .field("tunnel_service_key", &set(&self.tunnel_service_key))
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

/// Scalar as the environment provider hands it over
///
/// Values that look like numbers or booleans arrive typed; credentials are
/// always wanted as text.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Flag(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Signed(n) => n.to_string(),
            Self::Unsigned(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

/// Optional text; empty counts as unset
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value
        .map(Scalar::into_text)
        .filter(|s| !s.trim().is_empty()))
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<SecretString>, D::Error> {
    Ok(text(deserializer)?.map(SecretString::from))
}
