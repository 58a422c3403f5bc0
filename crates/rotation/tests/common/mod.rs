//! Shared fixtures for rotation tests
//!
//! A [`Harness`] wires a [`Rotator`] to an in-memory store and a
//! [`CloudflareClient`] pointed at a wiremock server.

#![allow(dead_code)]

use cfrotate_platform::{ClientConfig, CloudflareClient, PlatformCredentials, RetryPolicy};
use cfrotate_rotation::{RotationEvent, RotationResult, RotationStep, Rotator};
use cfrotate_secret::{
    MemorySecretStore, SecretId, SecretStore, SecretValue, StageLabel, VersionId, VersionStages,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{MockServer, ResponseTemplate};

pub const ZONE_ID: &str = "023e105f4ecef8ad9ca31a8372d0c353";
pub const HOSTNAME: &str = "tunnel.example.com";

/// A seeded secret with a rotation in progress
pub struct Rotation {
    pub id: SecretId,
    /// Version created by the seed
    pub seed: VersionId,
    /// Client request token of the rotation
    pub token: VersionId,
}

pub struct Harness {
    pub server: MockServer,
    pub store: Arc<MemorySecretStore>,
    pub rotator: Rotator,
}

impl Harness {
    /// Harness with every platform credential configured
    pub async fn new() -> Self {
        Self::with(full_credentials(), None).await
    }

    pub async fn with(credentials: PlatformCredentials, inline_service_key: Option<&str>) -> Self {
        let server = MockServer::start().await;
        let platform = CloudflareClient::new(
            ClientConfig {
                base_url: server.uri(),
                timeout: Duration::from_secs(5),
                retry: RetryPolicy {
                    max_retries: 1,
                    base_delay: Duration::from_millis(10),
                    max_delay: Duration::from_millis(20),
                    jitter: false,
                },
            },
            credentials,
        )
        .unwrap();

        let store = Arc::new(MemorySecretStore::new());
        let rotator = Rotator::new(
            Arc::clone(&store) as Arc<dyn SecretStore>,
            Arc::new(platform),
            inline_service_key.map(SecretValue::new),
        );

        Self {
            server,
            store,
            rotator,
        }
    }

    /// Seed a secret as `AWSCURRENT` and start a rotation
    pub async fn seed_and_begin(&self, name: &str, payload: &Value) -> Rotation {
        self.seed_with_stage_and_begin(name, payload, StageLabel::Current)
            .await
    }

    pub async fn seed_with_stage_and_begin(
        &self,
        name: &str,
        payload: &Value,
        stage: StageLabel,
    ) -> Rotation {
        let id = secret_id(name);
        let seed = self
            .store
            .seed(&id, &payload.to_string(), stage)
            .await
            .unwrap();
        let token = self.store.begin_rotation(&id).await.unwrap();
        Rotation { id, seed, token }
    }

    pub async fn step(
        &self,
        id: &SecretId,
        token: &VersionId,
        step: RotationStep,
    ) -> RotationResult<()> {
        self.rotator
            .handle(&RotationEvent::new(id.clone(), token.clone(), step))
            .await
    }

    /// Run all four steps in order, stopping at the first failure
    pub async fn rotate(&self, id: &SecretId, token: &VersionId) -> RotationResult<()> {
        for step in [
            RotationStep::CreateSecret,
            RotationStep::SetSecret,
            RotationStep::TestSecret,
            RotationStep::FinishSecret,
        ] {
            self.step(id, token, step).await?;
        }
        Ok(())
    }

    pub async fn stages(&self, id: &SecretId) -> VersionStages {
        self.store.describe(id).await.unwrap().versions
    }

    /// Labels per version, as strings
    pub async fn labels(&self, id: &SecretId) -> BTreeMap<String, Vec<String>> {
        self.stages(id)
            .await
            .iter()
            .map(|(version, labels)| {
                (
                    version.to_string(),
                    labels.iter().map(ToString::to_string).collect(),
                )
            })
            .collect()
    }

    /// Decoded value stored for a version
    pub async fn value_json(&self, id: &SecretId, version: &VersionId) -> Option<Value> {
        self.store
            .value_of(id, version)
            .await
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }
}

pub fn secret_id(name: &str) -> SecretId {
    SecretId::new(name).unwrap()
}

pub fn full_credentials() -> PlatformCredentials {
    PlatformCredentials::new()
        .with_api_token("admin-token")
        .with_global_key("ops@example.com", "global-key")
        .with_origin_ca_key("v1.0-origin-ca-key")
}

pub fn api_token_payload(token_id: Option<&str>) -> Value {
    let mut attributes = json!({
        "Name": "dns-edit",
        "ValidDays": 30,
        "Policies": [{
            "id": "f267e341f3dd4697bd3b9f71dd96247f",
            "effect": "allow",
            "permission_groups": [{"id": "4755a26eedb94da69e1066d98aa820be", "name": "DNS Write"}],
            "resources": {"com.cloudflare.api.account.zone.*": "*"}
        }]
    });
    if let Some(token_id) = token_id {
        attributes["TokenId"] = json!(token_id);
        attributes["TokenValue"] = json!("old-token-value");
    }
    json!({"Type": "apiToken", "Attributes": attributes})
}

pub fn tunnel_service_key_payload(key: &str) -> Value {
    json!({"Type": "tunnelServiceKey", "Attributes": {"KeyValue": key}})
}

pub fn argo_tunnel_payload(service_key_arn: Option<&str>) -> Value {
    let mut attributes = json!({
        "Hostname": HOSTNAME,
        "ValidityDays": 90,
        "ZoneId": ZONE_ID
    });
    if let Some(arn) = service_key_arn {
        attributes["TunnelServiceKeyArn"] = json!(arn);
    }
    json!({"Type": "argoTunnelToken", "Attributes": attributes})
}

pub fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result
    }))
}

pub fn failure(status: u16, code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "success": false,
        "errors": [{"code": code, "message": message}],
        "messages": [],
        "result": null
    }))
}

/// Self-signed certificate standing in for an origin CA response
pub fn origin_certificate_pem(hostname: &str) -> String {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let params = rcgen::CertificateParams::new(vec![hostname.to_string()]).unwrap();
    params.self_signed(&key_pair).unwrap().pem()
}
