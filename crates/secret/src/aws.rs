//! AWS Secrets Manager secret store
//!
//! Maps the [`SecretStore`] operations onto `DescribeSecret`,
//! `GetSecretValue`, `PutSecretValue`, and `UpdateSecretVersionStage`. The
//! last one is the store's atomic stage-move primitive; AWS attaches
//! `AWSPREVIOUS` to the demoted version itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use cfrotate_secret::{AwsSecretsManagerConfig, AwsSecretsManagerStore};
//!
//! let store = AwsSecretsManagerStore::new(AwsSecretsManagerConfig::default()).await?;
//! ```

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_sdk_secretsmanager::error::SdkError;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::id::{SecretId, VersionId};
use crate::stage::{StageLabel, VersionStages};
use crate::store::{SecretDescription, SecretStore, VersionSelector};

/// Configuration of the AWS Secrets Manager store
#[derive(Debug, Clone)]
pub struct AwsSecretsManagerConfig {
    /// AWS region (auto-detected from the environment if None)
    pub region: Option<String>,

    /// Custom endpoint URL (LocalStack or a VPC endpoint)
    pub endpoint_url: Option<String>,

    /// Per-operation timeout, 1 to 60 seconds
    pub timeout: Duration,
}

impl Default for AwsSecretsManagerConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl AwsSecretsManagerConfig {
    /// Validate configuration values
    pub fn validate(&self) -> StoreResult<()> {
        let timeout_secs = self.timeout.as_secs();
        if !(1..=60).contains(&timeout_secs) {
            return Err(StoreError::InvalidRequest {
                reason: format!(
                    "timeout must be between 1 and 60 seconds, got {timeout_secs} seconds"
                ),
            });
        }
        if let Some(endpoint) = &self.endpoint_url
            && !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
        {
            return Err(StoreError::InvalidRequest {
                reason: "endpoint_url must start with http:// or https://".into(),
            });
        }
        Ok(())
    }
}

/// Secret store backed by AWS Secrets Manager
#[derive(Clone)]
pub struct AwsSecretsManagerStore {
    client: SecretsManagerClient,
}

impl std::fmt::Debug for AwsSecretsManagerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretsManagerStore").finish_non_exhaustive()
    }
}

impl AwsSecretsManagerStore {
    /// Create a store using the default AWS credential chain
    pub async fn new(config: AwsSecretsManagerConfig) -> StoreResult<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(config.timeout)
                .build(),
        );
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        tracing::info!(
            provider = "AWS Secrets Manager",
            region = ?config.region,
            endpoint = ?config.endpoint_url,
            "Initialized secret store"
        );

        Ok(Self::from_client(SecretsManagerClient::new(&sdk_config)))
    }

    /// Wrap an already configured client
    pub fn from_client(client: SecretsManagerClient) -> Self {
        Self { client }
    }
}

/// Map an SDK failure, classifying the service's not-found exception
fn map_sdk_error<E, R>(
    operation: &'static str,
    what: impl FnOnce() -> String,
    err: SdkError<E, R>,
    is_not_found: impl FnOnce(&E) -> bool,
) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if err.as_service_error().is_some_and(is_not_found) {
        StoreError::not_found(what())
    } else {
        StoreError::backend(operation, err)
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManagerStore {
    #[tracing::instrument(skip(self), fields(provider = "AWS", secret = %id))]
    async fn describe(&self, id: &SecretId) -> StoreResult<SecretDescription> {
        let output = self
            .client
            .describe_secret()
            .secret_id(id.as_str())
            .send()
            .await
            .map_err(|e| {
                map_sdk_error("DescribeSecret", || format!("secret {id}"), e, |se| {
                    se.is_resource_not_found_exception()
                })
            })?;

        let mut versions = VersionStages::new();
        if let Some(map) = output.version_ids_to_stages() {
            for (version, labels) in map {
                versions.insert(
                    VersionId::new(version.clone())?,
                    labels.iter().map(|label| StageLabel::parse(label)),
                );
            }
        }

        Ok(SecretDescription {
            id: id.clone(),
            rotation_enabled: output.rotation_enabled().unwrap_or(false),
            versions,
        })
    }

    #[tracing::instrument(skip(self), fields(provider = "AWS", secret = %id, selector = %selector))]
    async fn get_value(&self, id: &SecretId, selector: &VersionSelector) -> StoreResult<String> {
        let request = self.client.get_secret_value().secret_id(id.as_str());
        let request = match selector {
            VersionSelector::Stage(stage) => request.version_stage(stage.as_str()),
            VersionSelector::Version(version) => request.version_id(version.as_str()),
            VersionSelector::VersionInStage(version, stage) => request
                .version_id(version.as_str())
                .version_stage(stage.as_str()),
        };

        let output = request.send().await.map_err(|e| {
            map_sdk_error("GetSecretValue", || format!("{selector} of secret {id}"), e, |se| {
                se.is_resource_not_found_exception()
            })
        })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| StoreError::InvalidRequest {
                reason: format!("{selector} of secret {id} holds binary data, not a string"),
            })
    }

    #[tracing::instrument(
        skip(self, payload),
        fields(provider = "AWS", secret = %id, version = %version)
    )]
    async fn put_pending(
        &self,
        id: &SecretId,
        version: &VersionId,
        payload: &str,
    ) -> StoreResult<()> {
        self.client
            .put_secret_value()
            .secret_id(id.as_str())
            .client_request_token(version.as_str())
            .secret_string(payload)
            .version_stages(StageLabel::Pending.as_str())
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_exists_exception())
                {
                    return StoreError::InvalidRequest {
                        reason: format!(
                            "version {version} of {id} already holds a different value"
                        ),
                    };
                }
                map_sdk_error("PutSecretValue", || format!("secret {id}"), e, |se| {
                    se.is_resource_not_found_exception()
                })
            })?;

        tracing::debug!("Stored pending version");
        Ok(())
    }

    #[tracing::instrument(
        skip(self),
        fields(provider = "AWS", secret = %id, stage = %stage, to = %to)
    )]
    async fn move_stage(
        &self,
        id: &SecretId,
        stage: &StageLabel,
        to: &VersionId,
        from: Option<&VersionId>,
    ) -> StoreResult<()> {
        self.client
            .update_secret_version_stage()
            .secret_id(id.as_str())
            .version_stage(stage.as_str())
            .move_to_version_id(to.as_str())
            .set_remove_from_version_id(from.map(|v| v.as_str().to_string()))
            .send()
            .await
            .map_err(|e| {
                map_sdk_error(
                    "UpdateSecretVersionStage",
                    || format!("version {to} of secret {id}"),
                    e,
                    |se| se.is_resource_not_found_exception(),
                )
            })?;

        tracing::debug!("Moved stage");
        Ok(())
    }
}
