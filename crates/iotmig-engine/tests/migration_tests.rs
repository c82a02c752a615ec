//! Migration Engine Tests
//!
//! End-to-end tests of the per-device state machine and the worker pool
//! driver against a recording fake destination, covering:
//! - Device upsert (create, conflict, repair on other create failures)
//! - Credential replacement
//! - Role provisioning and its idempotent fallbacks
//! - Pre-flight validation
//! - Fan-out/fan-in: one outcome per device and the concurrency bound
//! - Source fetch pagination and id batching

mod common;

use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use iotmig_connector::types::{DeviceCredential, KeyFormat, SourceDevice, TopicPermission};
use iotmig_engine::outcome::contexts;
use iotmig_engine::{
    fetch_all, fetch_by_ids, migrate_device, migrate_devices, ColumnMapping, MigrationError,
    NoopProgress,
};

use common::{config, context, devices, Call, FakePlatform, FakeRegistry, Failure, Op};

const DEVICE_EXISTS: &str = "Device already exists in system";

// =============================================================================
// Device Upsert
// =============================================================================

#[tokio::test]
async fn test_new_device_without_roles() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config().with_create_device_role(false), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;

    assert!(outcome.is_success());
    assert!(outcome.warnings.is_empty());
    assert_eq!(platform.calls(), vec![Call::CreateDevice("dev-1".to_string())]);
}

#[tokio::test]
async fn test_existing_device_is_updated_once() {
    let platform = Arc::new(
        FakePlatform::new().fail_device(Op::CreateDevice, "dev-2", Failure::Conflict(DEVICE_EXISTS)),
    );
    let ctx = context(config(), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-2")).await;

    assert!(outcome.is_success());
    assert!(outcome.warnings.is_empty(), "conflict is not a warning");

    let updates = platform.calls_for(Op::UpdateDevice);
    assert_eq!(updates.len(), 1);
    let Call::UpdateDevice(body) = &updates[0] else {
        unreachable!()
    };
    assert_eq!(
        serde_json::to_value(body).unwrap(),
        json!({
            "name": "dev-2",
            "enabled": true,
            "type": "sensor",
            "allow_key_auth": false,
            "allow_certificate_auth": true,
        })
    );
}

#[tokio::test]
async fn test_other_create_failure_is_warning_and_repaired() {
    let platform =
        Arc::new(FakePlatform::new().fail(Op::CreateDevice, Failure::Other("gateway timeout")));
    let ctx = context(config(), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].context, contexts::CREATE_DEVICE);
    assert_eq!(outcome.warnings[0].error, "HTTP 500: gateway timeout");
    assert_eq!(platform.count(Op::UpdateDevice), 1);
}

#[tokio::test]
async fn test_update_failure_stops_device() {
    let platform = Arc::new(
        FakePlatform::new()
            .fail(Op::CreateDevice, Failure::Conflict(DEVICE_EXISTS))
            .fail(Op::UpdateDevice, Failure::Other("patch rejected")),
    );
    let device = SourceDevice::new("dev-1").with_credential(DeviceCredential::new("RSA_PEM", "k"));
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &device).await;

    let failure = outcome.failure.expect("update failure is terminal");
    assert_eq!(failure.context, contexts::UPDATE_DEVICE);
    assert_eq!(failure.device_id, "dev-1");
    assert_eq!(platform.count(Op::DeleteCredentials), 0);
    assert_eq!(platform.count(Op::CreateRole), 0);
}

#[tokio::test]
async fn test_column_mapping_reaches_destination() {
    let platform = Arc::new(FakePlatform::new().fail(Op::CreateDevice, Failure::Conflict(DEVICE_EXISTS)));
    let mapping = ColumnMapping::from_rows([("numId", "serial"), ("Metadata.site", "site")]).unwrap();
    let ctx = context(config().with_column_mapping(mapping), platform.clone());

    let device = SourceDevice {
        num_id: "77".to_string(),
        ..SourceDevice::new("dev-1")
    }
    .with_metadata("site", "north");
    assert!(migrate_device(&ctx, &device).await.is_success());

    let updates = platform.calls_for(Op::UpdateDevice);
    let Call::UpdateDevice(body) = &updates[0] else {
        unreachable!()
    };
    assert_eq!(body.get("serial"), Some(&json!("77")));
    assert_eq!(body.get("site"), Some(&json!("north")));
}

// =============================================================================
// Credential Sync
// =============================================================================

#[tokio::test]
async fn test_delete_credentials_failure_skips_creates() {
    let platform =
        Arc::new(FakePlatform::new().fail(Op::DeleteCredentials, Failure::Other("locked")));
    let ctx = context(config().with_update_public_keys(true), platform.clone());
    let device = SourceDevice::new("dev-1")
        .with_credential(DeviceCredential::new("RSA_PEM", "k1"))
        .with_credential(DeviceCredential::new("ES256_PEM", "k2"));

    let outcome = migrate_device(&ctx, &device).await;

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.context, "Error when deleting device credentials");
    assert_eq!(platform.count(Op::CreateCredential), 0);
}

#[tokio::test]
async fn test_credentials_replaced_in_order() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config(), platform.clone());
    let expiry = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    let device = SourceDevice::new("dev-1")
        .with_credential(
            DeviceCredential::new("RSA_X509_PEM", "cert").with_expiration(expiry),
        )
        .with_credential(
            DeviceCredential::new("ES256_PEM", "ec").with_expiration(Utc.timestamp_opt(0, 0).unwrap()),
        );

    assert!(migrate_device(&ctx, &device).await.is_success());

    let calls = platform.calls();
    assert_eq!(calls[1], Call::DeleteCredentials("dev-1".to_string()));
    let created: Vec<_> = platform
        .calls_for(Op::CreateCredential)
        .into_iter()
        .map(|c| match c {
            Call::CreateCredential(_, cred) => (cred.public_key, cred.key_format, cred.expire_time),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(
        created,
        vec![
            ("cert".to_string(), KeyFormat::RsaX509Pem, "2030-01-01T00:00:00Z".to_string()),
            ("ec".to_string(), KeyFormat::Es256Pem, String::new()),
        ]
    );
}

#[tokio::test]
async fn test_first_credential_failure_stops_loop() {
    let platform =
        Arc::new(FakePlatform::new().fail(Op::CreateCredential, Failure::Other("bad key")));
    let ctx = context(config().with_create_device_role(true), platform.clone());
    let device = SourceDevice::new("dev-1")
        .with_credential(DeviceCredential::new("RSA_PEM", "k1"))
        .with_credential(DeviceCredential::new("RSA_PEM", "k2"));

    let outcome = migrate_device(&ctx, &device).await;

    assert_eq!(outcome.failure.unwrap().context, contexts::CREATE_CREDENTIAL);
    assert_eq!(platform.count(Op::CreateCredential), 1);
    assert_eq!(platform.count(Op::CreateRole), 0);
}

#[tokio::test]
async fn test_credentials_untouched_when_disabled() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config().with_update_public_keys(false), platform.clone());
    let device = SourceDevice::new("dev-1").with_credential(DeviceCredential::new("RSA_PEM", "k"));

    assert!(migrate_device(&ctx, &device).await.is_success());
    assert_eq!(platform.count(Op::DeleteCredentials), 0);
    assert_eq!(platform.count(Op::CreateCredential), 0);
}

#[tokio::test]
async fn test_device_without_credentials_skips_delete() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config(), platform.clone());

    assert!(migrate_device(&ctx, &SourceDevice::new("dev-1")).await.is_success());
    assert_eq!(platform.count(Op::DeleteCredentials), 0);
}

// =============================================================================
// Role Provisioning
// =============================================================================

#[tokio::test]
async fn test_role_provisioned_for_new_device() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config().with_create_device_role(true), platform.clone());

    assert!(migrate_device(&ctx, &SourceDevice::new("dev-1")).await.is_success());

    let topics: Vec<_> = platform
        .calls_for(Op::AddTopic)
        .into_iter()
        .map(|c| match c {
            Call::AddTopic {
                role_id,
                topic,
                permission,
            } => {
                assert_eq!(role_id, "role-dev-1");
                (topic, permission)
            }
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(
        topics,
        vec![
            ("/devices/dev-1/commands/#".to_string(), TopicPermission::Read),
            ("/devices/dev-1/config".to_string(), TopicPermission::Read),
            ("/devices/dev-1/errors".to_string(), TopicPermission::Read),
            ("/devices/dev-1/events/#".to_string(), TopicPermission::Create),
            ("/devices/dev-1/state".to_string(), TopicPermission::Create),
        ]
    );
    assert_eq!(
        platform.calls().last(),
        Some(&Call::AddDeviceToRole {
            device: "dev-1".to_string(),
            role: "dev-1".to_string()
        })
    );
    assert_eq!(platform.count(Op::GetRole), 0);
}

#[tokio::test]
async fn test_existing_role_is_fetched() {
    let platform = Arc::new(
        FakePlatform::new().fail(Op::CreateRole, Failure::Conflict("A role's name must be unique")),
    );
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;

    assert!(outcome.is_success());
    assert_eq!(platform.count(Op::GetRole), 1);
    assert_eq!(platform.count(Op::AddTopic), 5);
    for call in platform.calls_for(Op::AddTopic) {
        let Call::AddTopic { role_id, .. } = call else {
            unreachable!()
        };
        assert_eq!(role_id, "existing-dev-1");
    }
    assert_eq!(platform.count(Op::AddDeviceToRole), 1);
}

#[tokio::test]
async fn test_role_create_failure_does_not_fetch() {
    let platform =
        Arc::new(FakePlatform::new().fail(Op::CreateRole, Failure::Other("quota exceeded")));
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;

    assert_eq!(outcome.failure.unwrap().context, contexts::CREATE_ROLE);
    assert_eq!(platform.count(Op::GetRole), 0);
    assert_eq!(platform.count(Op::AddTopic), 0);
}

#[tokio::test]
async fn test_role_fetch_failure() {
    let platform = Arc::new(
        FakePlatform::new()
            .fail(Op::CreateRole, Failure::Conflict("A role's name must be unique"))
            .fail(Op::GetRole, Failure::Other("not visible")),
    );
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;
    assert_eq!(outcome.failure.unwrap().context, contexts::GET_ROLE);
}

#[tokio::test]
async fn test_role_without_id() {
    let platform = Arc::new(FakePlatform::new().with_role_body(json!({"name": "dev-1"})));
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;
    assert_eq!(outcome.failure.unwrap().context, contexts::RESOLVE_ROLE_ID);
    assert_eq!(platform.count(Op::AddTopic), 0);
}

#[tokio::test]
async fn test_topic_failure_aborts_remaining_bindings() {
    let platform = Arc::new(FakePlatform::new().fail(Op::AddTopic, Failure::Other("denied")));
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;

    assert_eq!(outcome.failure.unwrap().context, contexts::ADD_TOPIC);
    assert_eq!(platform.count(Op::AddTopic), 1);
    assert_eq!(platform.count(Op::AddDeviceToRole), 0);
}

#[tokio::test]
async fn test_duplicate_membership_is_success() {
    let platform = Arc::new(FakePlatform::new().fail(
        Op::AddDeviceToRole,
        Failure::Conflict("duplicate key value violates unique constraint"),
    ));
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;
    assert!(outcome.is_success());
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn test_membership_failure() {
    let platform =
        Arc::new(FakePlatform::new().fail(Op::AddDeviceToRole, Failure::Other("no such device")));
    let ctx = context(config().with_create_device_role(true), platform.clone());

    let outcome = migrate_device(&ctx, &SourceDevice::new("dev-1")).await;
    assert_eq!(outcome.failure.unwrap().context, contexts::ADD_DEVICE_TO_ROLE);
}

#[tokio::test]
async fn test_role_skipped_after_credential_failure() {
    let platform =
        Arc::new(FakePlatform::new().fail(Op::DeleteCredentials, Failure::Other("locked")));
    let ctx = context(config().with_create_device_role(true), platform.clone());
    let device = SourceDevice::new("dev-1").with_credential(DeviceCredential::new("RSA_PEM", "k"));

    assert!(!migrate_device(&ctx, &device).await.is_success());
    assert_eq!(platform.count(Op::CreateRole), 0);
}

// =============================================================================
// Driver: Pre-flight
// =============================================================================

#[tokio::test]
async fn test_unknown_key_format_aborts_run_before_any_call() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config(), platform.clone());
    let mut input = devices(5);
    input[3] = SourceDevice::new("dev-3").with_credential(DeviceCredential::new("ED25519_PEM", "k"));

    let err = migrate_devices(ctx, input, Arc::new(NoopProgress))
        .await
        .unwrap_err();

    match err {
        MigrationError::UnsupportedKeyFormat { device_id, format } => {
            assert_eq!(device_id, "dev-3");
            assert_eq!(format, "ED25519_PEM");
        }
        other => panic!("expected UnsupportedKeyFormat, got {other:?}"),
    }
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_key_format_ignored_without_key_update() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config().with_update_public_keys(false), platform.clone());
    let input = vec![SourceDevice::new("dev-1").with_credential(DeviceCredential::new("ED25519_PEM", "k"))];

    let summary = migrate_devices(ctx, input, Arc::new(NoopProgress))
        .await
        .unwrap();
    assert!(summary.is_complete());
}

// =============================================================================
// Driver: Fan-out / Fan-in
// =============================================================================

#[tokio::test]
async fn test_one_outcome_per_device_with_mixed_failures() {
    let mut platform = FakePlatform::new();
    for i in (0..50).step_by(7) {
        platform = platform.fail_device(Op::UpdateDevice, &format!("dev-{i}"), Failure::Other("rejected"));
    }
    for i in (0..50).step_by(5) {
        platform = platform.fail_device(Op::CreateDevice, &format!("dev-{i}"), Failure::Other("flaky"));
    }
    let platform = Arc::new(platform);
    let ctx = context(config().with_workers(4), platform.clone());

    let summary = migrate_devices(ctx, devices(50), Arc::new(NoopProgress))
        .await
        .unwrap();

    // Updates only run when create fails, so only devices in both sets fail.
    let failed: Vec<usize> = (0..50).filter(|i| i % 7 == 0 && i % 5 == 0).collect();
    assert_eq!(summary.total, 50);
    assert_eq!(summary.failed(), failed.len());
    assert_eq!(summary.succeeded, 50 - failed.len());
    assert_eq!(summary.errors.len(), failed.len() + 10);
    assert_eq!(platform.count(Op::CreateDevice), 50);
}

#[tokio::test]
async fn test_empty_device_list() {
    let platform = Arc::new(FakePlatform::new());
    let ctx = context(config(), platform.clone());

    let summary = migrate_devices(ctx, Vec::new(), Arc::new(NoopProgress))
        .await
        .unwrap();
    assert_eq!(summary.total, 0);
    assert!(summary.is_complete());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thousand_devices_bounded_by_pool_size() {
    let platform = Arc::new(FakePlatform::new().with_delay(Duration::from_millis(1)));
    let ctx = context(
        config().with_workers(10).with_create_device_role(true),
        platform.clone(),
    );

    let summary = migrate_devices(ctx, devices(1000), Arc::new(NoopProgress))
        .await
        .unwrap();

    assert_eq!(summary.total, 1000);
    assert_eq!(summary.succeeded, 1000);
    assert!(
        platform.max_in_flight() <= 10,
        "max in flight was {}",
        platform.max_in_flight()
    );
    assert_eq!(platform.count(Op::CreateDevice), 1000);
    assert_eq!(platform.count(Op::AddDeviceToRole), 1000);
}

// =============================================================================
// Source Fetch
// =============================================================================

#[tokio::test]
async fn test_fetch_all_follows_pages_and_keeps_last() {
    let registry = FakeRegistry::with_pages(vec![devices(3), vec![SourceDevice::new("x")], vec![
        SourceDevice::new("last"),
    ]]);

    let fetched = fetch_all(&registry, 3, &NoopProgress).await.unwrap();

    let ids: Vec<_> = fetched.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["dev-0", "dev-1", "dev-2", "x", "last"]);
    assert_eq!(
        registry.page_requests(),
        vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
    );
}

#[tokio::test]
async fn test_fetch_by_ids_batches_without_gaps() {
    let registry = FakeRegistry::with_pages(vec![devices(240)]);
    let mut ids: Vec<String> = (0..250).map(|i| format!("dev-{i}")).collect();
    ids.push("dev-5".to_string());

    let fetched = fetch_by_ids(&registry, &ids, 100, &NoopProgress).await.unwrap();

    let batches = registry.id_batches();
    assert_eq!(
        batches.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![100, 100, 50]
    );
    let flattened: Vec<String> = batches.into_iter().flatten().collect();
    assert_eq!(flattened, ids[..250].to_vec());

    assert_eq!(fetched.devices.len(), 240);
    assert_eq!(
        fetched.missing_ids,
        (240..250).map(|i| format!("dev-{i}")).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_fetch_rejects_zero_page_size() {
    let registry = FakeRegistry::default();
    let err = fetch_all(&registry, 0, &NoopProgress).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONFIG");
}
