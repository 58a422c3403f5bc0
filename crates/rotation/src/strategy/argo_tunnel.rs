//! Argo tunnel token strategy
//!
//! A rotation issues a new origin certificate for a freshly generated key and
//! bundles it with the tunnel service key in the format `cloudflared` reads.

use async_trait::async_trait;
use cfrotate_platform::{OriginCertificateRequest, PlatformApi};
use cfrotate_secret::{
    ArgoTunnelTokenAttributes, SecretId, SecretPayload, SecretStore, SecretValue, StageLabel,
    VersionSelector,
};
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_cert::Certificate;
use x509_cert::der::oid::AssociatedOid;
use x509_cert::der::{Decode, DecodePem};
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::pkix::name::GeneralName;

use super::{CredentialStrategy, Retirement};
use crate::bundle::ArgoTunnelBundle;
use crate::error::{RotationError, RotationResult};

pub struct ArgoTunnelStrategy {
    platform: Arc<dyn PlatformApi>,
    store: Arc<dyn SecretStore>,
    inline_service_key: Option<SecretValue>,
}

impl ArgoTunnelStrategy {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        store: Arc<dyn SecretStore>,
        inline_service_key: Option<SecretValue>,
    ) -> Self {
        Self {
            platform,
            store,
            inline_service_key,
        }
    }

    /// Tunnel service key to embed in a new bundle
    ///
    /// A `TunnelServiceKeyArn` on the secret always wins over the inline key.
    async fn service_key(
        &self,
        attrs: &ArgoTunnelTokenAttributes,
    ) -> RotationResult<SecretValue> {
        if let Some(arn) = &attrs.tunnel_service_key_arn {
            let id = SecretId::new(arn.as_str())
                .map_err(|e| RotationError::config(format!("TunnelServiceKeyArn: {e}")))?;
            let raw = self
                .store
                .get_value(&id, &VersionSelector::Stage(StageLabel::Current))
                .await?;

            return match SecretPayload::decode(&raw)? {
                SecretPayload::TunnelServiceKey(key) => {
                    tracing::debug!(source = %id, "Using referenced tunnel service key");
                    Ok(key.key_value)
                }
                other => Err(RotationError::config(format!(
                    "secret {id} referenced by TunnelServiceKeyArn holds a {} payload, expected tunnelServiceKey",
                    other.secret_type()
                ))),
            };
        }

        self.inline_service_key.clone().ok_or_else(|| {
            RotationError::config(
                "no tunnel service key: set TunnelServiceKeyArn on the secret or CF_TUNNEL_SERVICE_KEY",
            )
        })
    }
}

#[async_trait]
impl CredentialStrategy for ArgoTunnelStrategy {
    type Attributes = ArgoTunnelTokenAttributes;

    async fn mint(
        &self,
        current: &ArgoTunnelTokenAttributes,
    ) -> RotationResult<ArgoTunnelTokenAttributes> {
        let service_key = self.service_key(current).await?;
        let request = CertificateRequest::generate()?;

        let certificate = self
            .platform
            .create_origin_certificate(&OriginCertificateRequest::origin_ecc(
                current.hostname.as_str(),
                current.validity_days,
                request.csr_pem,
            ))
            .await?;

        tracing::info!(
            hostname = %current.hostname,
            certificate_id = certificate.id.as_deref().unwrap_or("unknown"),
            expires_on = certificate.expires_on.as_deref().unwrap_or("unknown"),
            "Built tunnel token bundle"
        );

        let bundle = ArgoTunnelBundle {
            private_key_pem: request.key_pem,
            certificate_pem: certificate.certificate,
            zone_id: current.zone_id.clone(),
            service_key,
        };

        Ok(ArgoTunnelTokenAttributes {
            token_value: Some(SecretValue::new(bundle.to_pem())),
            ..current.clone()
        })
    }

    async fn verify(&self, pending: &ArgoTunnelTokenAttributes) -> RotationResult<bool> {
        let Some(token) = &pending.token_value else {
            tracing::warn!(hostname = %pending.hostname, "Pending tunnel token has no TokenValue");
            return Ok(false);
        };

        let bundle = match ArgoTunnelBundle::parse(token.expose()) {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::warn!(
                    hostname = %pending.hostname,
                    error = %e,
                    "Pending tunnel token is not a valid bundle"
                );
                return Ok(false);
            }
        };

        if bundle.zone_id != pending.zone_id {
            tracing::warn!(
                expected = %pending.zone_id,
                found = %bundle.zone_id,
                "Tunnel token is bound to another zone"
            );
            return Ok(false);
        }

        if let Err(reason) =
            check_certificate(&bundle.certificate_pem, &pending.hostname, SystemTime::now())
        {
            tracing::warn!(hostname = %pending.hostname, %reason, "Origin certificate rejected");
            return Ok(false);
        }

        Ok(self
            .platform
            .probe_service_key(&bundle.service_key, Some(&bundle.zone_id))
            .await?)
    }

    async fn retire(
        &self,
        _superseded: &ArgoTunnelTokenAttributes,
    ) -> RotationResult<Retirement> {
        Ok(Retirement::Unsupported {
            reason: "a tunnel token bundle is not a revocable platform object",
        })
    }
}

/// Fresh P-256 key and the CSR sent to the origin CA
struct CertificateRequest {
    key_pem: String,
    csr_pem: String,
}

impl CertificateRequest {
    fn generate() -> RotationResult<Self> {
        let key_pair = KeyPair::generate()
            .map_err(|e| RotationError::key_generation(format!("key pair: {e}")))?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CountryName, DnValue::Utf8String("US".to_string()));
        dn.push(DnType::CommonName, DnValue::Utf8String("Cloudflare".to_string()));

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;

        let csr = params
            .serialize_request(&key_pair)
            .map_err(|e| RotationError::key_generation(format!("CSR: {e}")))?;
        let csr_pem = csr
            .pem()
            .map_err(|e| RotationError::key_generation(format!("CSR encoding: {e}")))?;

        Ok(Self {
            key_pem: key_pair.serialize_pem(),
            csr_pem,
        })
    }
}

/// Check that a PEM certificate covers `hostname` and is valid at `now`
///
/// Returns the reason on failure.
pub(crate) fn check_certificate(pem: &str, hostname: &str, now: SystemTime) -> Result<(), String> {
    let cert = Certificate::from_pem(pem.as_bytes())
        .map_err(|e| format!("unparseable certificate: {e}"))?;
    let tbs = &cert.tbs_certificate;

    let names: Vec<String> = tbs
        .extensions
        .iter()
        .flatten()
        .filter(|ext| ext.extn_id == SubjectAltName::OID)
        .map(|ext| SubjectAltName::from_der(ext.extn_value.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("unreadable subjectAltName: {e}"))?
        .into_iter()
        .flat_map(|san| san.0)
        .filter_map(|name| match name {
            GeneralName::DnsName(dns) => Some(dns.to_string()),
            _ => None,
        })
        .collect();

    if !names.iter().any(|name| hostname_matches(name, hostname)) {
        return Err(format!("subjectAltName {names:?} does not cover {hostname}"));
    }

    let now = now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let not_before = tbs.validity.not_before.to_unix_duration();
    let not_after = tbs.validity.not_after.to_unix_duration();
    if now < not_before {
        return Err(format!("not valid before {:?}", tbs.validity.not_before));
    }
    if now > not_after {
        return Err(format!("expired at {:?}", tbs.validity.not_after));
    }
    Ok(())
}

/// DNS name match with a single-label leading wildcard
fn hostname_matches(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.trim_end_matches('.');
    let hostname = hostname.trim_end_matches('.');

    if let Some(suffix) = pattern.strip_prefix("*.") {
        return hostname
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest.eq_ignore_ascii_case(suffix));
    }
    pattern.eq_ignore_ascii_case(hostname)
}
