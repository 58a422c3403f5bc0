//! Re-delivery, admission, and label invariants of the rotation protocol

mod common;

use cfrotate_platform::PlatformCredentials;
use cfrotate_rotation::RotationStep;
use cfrotate_secret::{SecretStore, StageLabel, VersionId, VersionSelector, VersionStages};
use common::{Harness, api_token_payload, ok, secret_id, tunnel_service_key_payload};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer};

const ALL_STEPS: [RotationStep; 4] = [
    RotationStep::CreateSecret,
    RotationStep::SetSecret,
    RotationStep::TestSecret,
    RotationStep::FinishSecret,
];

/// Token creation, verification, and revocation that always succeed
async fn mount_api_token_platform(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/user/tokens"))
        .respond_with(ok(json!({"id": "new-id", "value": "new-token-value"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/tokens/verify"))
        .respond_with(ok(json!({"id": "new-id", "status": "active"})))
        .mount(server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/user/tokens/.+$"))
        .respond_with(ok(json!({})))
        .mount(server)
        .await;
}

fn assert_label_invariant(stages: &VersionStages) {
    assert_eq!(stages.count(&StageLabel::Current), 1);
    assert!(stages.count(&StageLabel::Pending) <= 1);
    assert!(stages.count(&StageLabel::Previous) <= 1);
    assert!(stages.count(&StageLabel::Verified) <= 1);
    if let Some(current) = stages.holder(&StageLabel::Current) {
        assert!(!stages.has(current, &StageLabel::Pending));
        assert!(!stages.has(current, &StageLabel::Previous));
    }
}

#[tokio::test]
async fn test_create_twice_mints_once() {
    // GIVEN: A rotation in progress
    let harness = Harness::new().await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;
    Mock::given(method("POST"))
        .and(path("/user/tokens"))
        .respond_with(ok(json!({"id": "new-id", "value": "new-token-value"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    // WHEN: createSecret is delivered twice
    for _ in 0..2 {
        harness
            .step(&rotation.id, &rotation.token, RotationStep::CreateSecret)
            .await
            .unwrap();
    }

    // THEN: One pending version holds the single minted token
    let stages = harness.stages(&rotation.id).await;
    assert_eq!(stages.count(&StageLabel::Pending), 1);
    assert_eq!(stages.holder(&StageLabel::Pending), Some(&rotation.token));
    let pending = harness.value_json(&rotation.id, &rotation.token).await.unwrap();
    assert_eq!(pending["Attributes"]["TokenId"], json!("new-id"));
}

#[tokio::test]
async fn test_every_step_is_safe_to_repeat() {
    // GIVEN: A rotation in progress
    let harness = Harness::new().await;
    mount_api_token_platform(&harness.server).await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;

    // WHEN: Each step is delivered twice in a row
    for step in ALL_STEPS {
        harness.step(&rotation.id, &rotation.token, step).await.unwrap();
        harness.step(&rotation.id, &rotation.token, step).await.unwrap();
    }

    // THEN: The rotation completed exactly once
    let stages = harness.stages(&rotation.id).await;
    assert!(stages.has(&rotation.token, &StageLabel::Current));
    assert!(stages.has(&rotation.seed, &StageLabel::Previous));
    assert_label_invariant(&stages);

    let requests = harness.server.received_requests().await.unwrap();
    let mints = requests.iter().filter(|r| r.method.as_str() == "POST").count();
    let revokes = requests.iter().filter(|r| r.method.as_str() == "DELETE").count();
    assert_eq!((mints, revokes), (1, 1));
}

#[tokio::test]
async fn test_finish_twice_leaves_labels_unchanged() {
    // GIVEN: A completed rotation
    let harness = Harness::new().await;
    mount_api_token_platform(&harness.server).await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;
    harness.rotate(&rotation.id, &rotation.token).await.unwrap();
    let after_first = harness.labels(&rotation.id).await;

    // WHEN: finishSecret is delivered again
    harness
        .step(&rotation.id, &rotation.token, RotationStep::FinishSecret)
        .await
        .unwrap();

    // THEN: Nothing moved
    assert_eq!(harness.labels(&rotation.id).await, after_first);
}

#[tokio::test]
async fn test_label_invariant_holds_across_rotations() {
    // GIVEN: A secret rotated three times
    let harness = Harness::new().await;
    mount_api_token_platform(&harness.server).await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;
    harness.rotate(&rotation.id, &rotation.token).await.unwrap();
    assert_label_invariant(&harness.stages(&rotation.id).await);

    let mut previous = rotation.token;
    for _ in 0..2 {
        let token = harness.store.begin_rotation(&rotation.id).await.unwrap();
        harness.rotate(&rotation.id, &token).await.unwrap();

        // THEN: One current, the last current demoted, CFVERIFIED followed the promotion
        let stages = harness.stages(&rotation.id).await;
        assert_label_invariant(&stages);
        assert_eq!(stages.holder(&StageLabel::Current), Some(&token));
        assert_eq!(stages.holder(&StageLabel::Previous), Some(&previous));
        assert_eq!(stages.holder(&StageLabel::Verified), Some(&token));
        previous = token;
    }
}

#[tokio::test]
async fn test_finish_refuses_unverified_pending_version() {
    // GIVEN: A pending value that never went through testSecret
    let harness = Harness::new().await;
    mount_api_token_platform(&harness.server).await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;
    harness
        .step(&rotation.id, &rotation.token, RotationStep::CreateSecret)
        .await
        .unwrap();
    let before = harness.labels(&rotation.id).await;

    // WHEN: finishSecret arrives early
    let err = harness
        .step(&rotation.id, &rotation.token, RotationStep::FinishSecret)
        .await
        .unwrap_err();

    // THEN: Rejected with nothing changed
    assert_eq!(err.kind(), "NotVerified");
    assert!(!err.is_retryable());
    assert_eq!(harness.labels(&rotation.id).await, before);
}

#[tokio::test]
async fn test_admission_rejects_events_that_do_not_fit() {
    let harness = Harness::new().await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;

    // Unknown secret
    let err = harness
        .step(&secret_id("cf/missing"), &rotation.token, RotationStep::SetSecret)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFoundError");

    // Unknown version
    let stranger = VersionId::new("ffffffff-0000-4000-8000-000000000000").unwrap();
    let err = harness
        .step(&rotation.id, &stranger, RotationStep::SetSecret)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidState");

    // Rotation disabled
    harness
        .store
        .set_rotation_enabled(&rotation.id, false)
        .await
        .unwrap();
    let err = harness
        .step(&rotation.id, &rotation.token, RotationStep::CreateSecret)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidState");
    assert!(err.to_string().contains("not enabled"));
    assert!(harness.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_version_that_is_neither_current_nor_pending_is_refused() {
    // GIVEN: A completed rotation, so the seed is AWSPREVIOUS
    let harness = Harness::new().await;
    mount_api_token_platform(&harness.server).await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;
    harness.rotate(&rotation.id, &rotation.token).await.unwrap();

    // WHEN: An event names the seed version
    let err = harness
        .step(&rotation.id, &rotation.seed, RotationStep::CreateSecret)
        .await
        .unwrap_err();

    // THEN
    assert_eq!(err.kind(), "InvalidState");
    assert!(err.to_string().contains("AWSPENDING"));
}

#[tokio::test]
async fn test_any_step_for_current_version_succeeds_without_side_effects() {
    // GIVEN: A completed rotation
    let harness = Harness::new().await;
    mount_api_token_platform(&harness.server).await;
    let rotation = harness
        .seed_and_begin("cf/dns-edit", &api_token_payload(Some("old-id")))
        .await;
    harness.rotate(&rotation.id, &rotation.token).await.unwrap();
    let labels = harness.labels(&rotation.id).await;
    let calls = harness.server.received_requests().await.unwrap().len();

    // WHEN: Every step is re-delivered for the now current version
    for step in ALL_STEPS {
        harness.step(&rotation.id, &rotation.token, step).await.unwrap();
    }

    // THEN: No platform calls, no label moves
    assert_eq!(harness.server.received_requests().await.unwrap().len(), calls);
    assert_eq!(harness.labels(&rotation.id).await, labels);
}

#[tokio::test]
async fn test_create_falls_back_to_init_seed() {
    // GIVEN: A secret seeded under CFINIT with no AWSCURRENT version
    let harness = Harness::new().await;
    mount_api_token_platform(&harness.server).await;
    let rotation = harness
        .seed_with_stage_and_begin("cf/dns-edit", &api_token_payload(None), StageLabel::Init)
        .await;

    // WHEN: The full rotation runs
    harness.rotate(&rotation.id, &rotation.token).await.unwrap();

    // THEN: The new version becomes the first AWSCURRENT
    let stages = harness.stages(&rotation.id).await;
    assert_eq!(stages.holder(&StageLabel::Current), Some(&rotation.token));
    assert!(stages.has(&rotation.seed, &StageLabel::Init));
    assert_eq!(stages.holder(&StageLabel::Previous), None);
}

#[tokio::test]
async fn test_create_without_current_or_init_is_not_found() {
    // GIVEN: A secret whose only value is labelled with a custom stage
    let harness = Harness::new().await;
    let rotation = harness
        .seed_with_stage_and_begin(
            "cf/dns-edit",
            &api_token_payload(None),
            StageLabel::Custom("MANUAL".into()),
        )
        .await;

    // WHEN
    let err = harness
        .step(&rotation.id, &rotation.token, RotationStep::CreateSecret)
        .await
        .unwrap_err();

    // THEN
    assert_eq!(err.kind(), "NotFoundError");
    assert!(err.to_string().contains("CFINIT"));
}

#[tokio::test]
async fn test_missing_platform_credentials_fail_before_any_call() {
    // GIVEN: Only a bearer token, which cannot issue tunnel service keys
    let credentials = PlatformCredentials::new().with_api_token("admin-token");
    let harness = Harness::with(credentials, None).await;
    let rotation = harness
        .seed_and_begin("cf/tunnel-key", &tunnel_service_key_payload("old-key"))
        .await;

    // WHEN
    let err = harness
        .step(&rotation.id, &rotation.token, RotationStep::CreateSecret)
        .await
        .unwrap_err();

    // THEN
    assert_eq!(err.kind(), "ConfigError");
    assert!(err.to_string().contains("CF_API_KEY") || err.to_string().contains("CF_API_EMAIL"));
    assert!(harness.server.received_requests().await.unwrap().is_empty());
    assert!(
        harness
            .store
            .get_value(&rotation.id, &VersionSelector::Version(rotation.token.clone()))
            .await
            .unwrap_err()
            .is_not_found()
    );
}
