//! Integration tests for the secret payload codec
//!
//! Covers decoding of every credential type, lossless re-encoding (including
//! attributes the engine does not know), and the schema failures that must
//! stop a rotation before anything is minted.

use cfrotate_secret::{SchemaError, SecretPayload, SecretType};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn api_token_payload() -> Value {
    json!({
        "Type": "apiToken",
        "Attributes": {
            "Name": "dns-edit",
            "ValidDays": 30,
            "TokenId": "ed17574386854bf78a67040be0a770b0",
            "TokenValue": "8M7wS6hCpXVc-DoRnPPY_UCWPgy8aea4Wy6kCe5T",
            "Policies": [{
                "id": "f267e341f3dd4697bd3b9f71dd96247f",
                "effect": "allow",
                "permission_groups": [{"id": "4755a26eedb94da69e1066d98aa820be", "name": "DNS Write"}],
                "resources": {"com.cloudflare.api.account.zone.eb78d65290b24279ba6f44721b3ea3c4": "*"}
            }],
            "Condition": {"request.ip": {"in": ["192.0.2.0/24"]}},
            "Owner": "platform-team"
        },
        "Comment": "top-level keys outside Type/Attributes are dropped"
    })
}

fn tunnel_key_payload() -> Value {
    json!({
        "Type": "tunnelServiceKey",
        "Attributes": {"KeyValue": "v1.0-abcdef", "Rotated": "by-hand"}
    })
}

fn argo_payload() -> Value {
    json!({
        "Type": "argoTunnelToken",
        "Attributes": {
            "Hostname": "tunnel.example.com",
            "ValidityDays": 90,
            "ZoneId": "023e105f4ecef8ad9ca31a8372d0c353",
            "TunnelServiceKeyArn": "arn:aws:secretsmanager:us-east-1:123456789012:secret:cf/tsk-AbCdEf",
            "Team": "edge"
        }
    })
}

fn reencoded(raw: &Value) -> Value {
    let payload = SecretPayload::decode(&raw.to_string()).unwrap();
    serde_json::from_str(&payload.encode().unwrap()).unwrap()
}

#[test]
fn test_api_token_round_trip_preserves_unknown_attributes() {
    // GIVEN: An apiToken payload with an attribute the engine does not know
    let raw = api_token_payload();

    // WHEN: It is decoded and encoded again
    let payload = SecretPayload::decode(&raw.to_string()).unwrap();
    let out = reencoded(&raw);

    // THEN: Every attribute survives unchanged
    assert_eq!(payload.secret_type(), SecretType::ApiToken);
    assert_eq!(out["Type"], "apiToken");
    assert_eq!(out["Attributes"], raw["Attributes"]);
    assert_eq!(SecretPayload::decode(&out.to_string()).unwrap(), payload);
}

#[test]
fn test_tunnel_service_key_round_trip() {
    let raw = tunnel_key_payload();
    let out = reencoded(&raw);

    assert_eq!(out, raw);
}

#[test]
fn test_argo_tunnel_token_round_trip() {
    let raw = argo_payload();

    let payload = SecretPayload::decode(&raw.to_string()).unwrap();
    let SecretPayload::ArgoTunnelToken(attrs) = &payload else {
        panic!("expected argoTunnelToken, got {payload:?}");
    };
    assert_eq!(attrs.validity_days, 90);
    assert_eq!(attrs.extra.get("Team"), Some(&json!("edge")));
    assert_eq!(reencoded(&raw), raw);
}

#[test]
fn test_debug_output_never_contains_secret_material() {
    let payload = SecretPayload::decode(&api_token_payload().to_string()).unwrap();
    let debug = format!("{payload:?}");

    assert!(!debug.contains("8M7wS6hCpXVc"));
    assert!(debug.contains("REDACTED"));
}

#[test]
fn test_missing_policies_is_a_schema_error() {
    // GIVEN: An apiToken payload without Policies
    let mut raw = api_token_payload();
    raw["Attributes"]
        .as_object_mut()
        .unwrap()
        .remove("Policies");

    // WHEN: It is decoded
    let err = SecretPayload::decode(&raw.to_string()).unwrap_err();

    // THEN: Decoding fails on the attributes
    assert!(
        matches!(err, SchemaError::InvalidAttributes { secret_type: "apiToken", .. }),
        "unexpected error: {err:?}"
    );
    assert!(err.to_string().contains("Policies"));
}

#[test]
fn test_empty_policies_is_rejected() {
    let mut raw = api_token_payload();
    raw["Attributes"]["Policies"] = json!([]);

    let err = SecretPayload::decode(&raw.to_string()).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::InvalidValue { field: "Policies", .. }
    ));
}

#[test]
fn test_policy_without_resources_is_rejected() {
    let mut raw = api_token_payload();
    raw["Attributes"]["Policies"][0]["resources"] = json!({});

    let err = SecretPayload::decode(&raw.to_string()).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::InvalidValue { field: "Policies", .. }
    ));
}

#[test]
fn test_blank_name_is_rejected() {
    let mut raw = api_token_payload();
    raw["Attributes"]["Name"] = json!("  ");

    let err = SecretPayload::decode(&raw.to_string()).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidValue { field: "Name", .. }));
}

#[test]
fn test_negative_valid_days_is_rejected() {
    let mut raw = api_token_payload();
    raw["Attributes"]["ValidDays"] = json!(-1);

    let err = SecretPayload::decode(&raw.to_string()).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidAttributes { .. }));
}

#[test]
fn test_unsupported_validity_days_is_rejected() {
    let mut raw = argo_payload();
    raw["Attributes"]["ValidityDays"] = json!(14);

    let err = SecretPayload::decode(&raw.to_string()).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::InvalidValue { field: "ValidityDays", .. }
    ));
}

#[test]
fn test_zone_id_must_be_a_zone_identifier() {
    for zone in [
        "",
        "zone-a&zone_id=zone-b",
        "023E105F4ECEF8AD9CA31A8372D0C353",
        "023e105f4ecef8ad9ca31a8372d0c35",
        "023e105f4ecef8ad9ca31a8372d0c353#",
    ] {
        let mut raw = argo_payload();
        raw["Attributes"]["ZoneId"] = json!(zone);

        let err = SecretPayload::decode(&raw.to_string()).unwrap_err();
        assert!(
            matches!(err, SchemaError::InvalidValue { field: "ZoneId", .. }),
            "{zone:?} was accepted"
        );
    }
}

#[test]
fn test_envelope_errors() {
    assert!(matches!(
        SecretPayload::decode("not json").unwrap_err(),
        SchemaError::Malformed { .. }
    ));
    assert!(matches!(
        SecretPayload::decode(r#"{"Attributes": {}}"#).unwrap_err(),
        SchemaError::MissingField { field: "Type" }
    ));
    assert!(matches!(
        SecretPayload::decode(r#"{"Type": "apiToken"}"#).unwrap_err(),
        SchemaError::MissingField { field: "Attributes" }
    ));
    assert!(matches!(
        SecretPayload::decode(r#"{"Type": "globalApiKey", "Attributes": {}}"#).unwrap_err(),
        SchemaError::UnknownType { tag } if tag == "globalApiKey"
    ));
}

#[test]
fn test_missing_key_value_is_rejected() {
    let err = SecretPayload::decode(r#"{"Type": "tunnelServiceKey", "Attributes": {}}"#)
        .unwrap_err();

    assert!(matches!(
        err,
        SchemaError::InvalidAttributes { secret_type: "tunnelServiceKey", .. }
    ));
}
