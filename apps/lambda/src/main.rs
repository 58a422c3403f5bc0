//! Secrets Manager rotation function for Cloudflare credentials
//!
//! Secrets Manager invokes the function once per rotation step with
//! `{"SecretId", "ClientRequestToken", "Step"}`. A successful step returns
//! `null`; a failed step returns an error whose type is the stable error kind.

mod config;
mod logging;

use cfrotate_platform::CloudflareClient;
use cfrotate_rotation::{RotationError, RotationEvent, Rotator};
use cfrotate_secret::AwsSecretsManagerStore;
use lambda_runtime::{Diagnostic, LambdaEvent, service_fn};
use std::sync::Arc;
use tracing::Instrument;

use crate::config::LambdaConfig;

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let config = LambdaConfig::from_env()?;
    logging::init(&config.log_level, config.log_format)?;
    tracing::debug!(?config, "Loaded configuration");

    let store = AwsSecretsManagerStore::new(config.store_config()).await?;
    let platform = CloudflareClient::new(config.client_config(), config.credentials())?;
    let rotator = Rotator::new(
        Arc::new(store),
        Arc::new(platform),
        config.inline_service_key(),
    );

    let rotator = &rotator;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<RotationEvent>| async move {
        handle(rotator, event).await
    }))
    .await
}

async fn handle(rotator: &Rotator, event: LambdaEvent<RotationEvent>) -> Result<(), Diagnostic> {
    let (event, context) = event.into_parts();
    let span = tracing::info_span!("invocation", request_id = %context.request_id);

    rotator
        .handle(&event)
        .instrument(span)
        .await
        .map_err(|err| {
            tracing::error!(
                secret_id = %event.secret_id,
                step = %event.step,
                kind = err.kind(),
                retryable = err.is_retryable(),
                error = %err,
                "Rotation step failed"
            );
            diagnostic(&err)
        })
}

/// Invocation error reported to the runtime
fn diagnostic(err: &RotationError) -> Diagnostic {
    Diagnostic {
        error_type: err.kind().to_string(),
        error_message: err.to_string(),
    }
}
