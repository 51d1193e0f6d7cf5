//! ServerRegistry reconciliation tests

use std::time::Duration;

use mcpgate_core::{AuthKind, BackendStatus};
use mcpgate_gateway::{GatewayError, ReconcileReport, API_KEY_HEADER};
use pretty_assertions::assert_eq;
use tests::fixtures::{backend, tamper};
use tests::harness::GatewayHarness;

#[tokio::test]
async fn test_reconcile_connects_enabled_backends_only() {
    let h = GatewayHarness::new();
    h.add(backend("calc"));
    h.add(backend("off").with_enabled(false));

    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.connected, 1);
    assert_eq!(h.registry.len(), 1);
    assert!(h.registry.by_alias("calc").is_some());
    assert!(h.registry.by_alias("off").is_none());
    assert_eq!(h.connector.connect_count(), 1);
}

#[tokio::test]
async fn test_repeated_reconcile_does_not_reconnect() {
    let h = GatewayHarness::new();
    h.add(backend("calc"));
    h.add(backend("weather"));

    h.registry.reconcile().await.unwrap();
    let second = h.registry.reconcile().await.unwrap();

    assert_eq!(
        second,
        ReconcileReport {
            updated: 2,
            ..Default::default()
        }
    );
    assert_eq!(h.connector.connect_count(), 2);
}

#[tokio::test]
async fn test_url_change_reconnects() {
    let h = GatewayHarness::new();
    let mut record = h.add(backend("calc"));
    h.registry.reconcile().await.unwrap();
    let old_client = h.connector.client("calc").unwrap();

    record.url = "http://calc-v2.test/mcp".to_string();
    h.repo.put(record);
    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.reconnected, 1);
    assert_eq!(old_client.close_count(), 1);
    assert_eq!(h.connector.connect_count(), 2);
    let conn = h.registry.by_alias("calc").unwrap();
    assert_eq!(conn.record().url, "http://calc-v2.test/mcp");
}

#[tokio::test(start_paused = true)]
async fn test_alias_stays_resolvable_while_url_change_reconnects() {
    let h = GatewayHarness::new();
    let mut record = h.add(backend("calc"));
    h.registry.reconcile().await.unwrap();

    record.url = "http://calc-v2.test/mcp".to_string();
    h.repo.put(record);
    h.connector
        .delay_url("http://calc-v2.test/mcp", Duration::from_secs(5));

    let registry = h.registry.clone();
    let task = tokio::spawn(async move { registry.reconcile().await });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let during = h.registry.by_alias("calc").expect("alias mapped mid-reconnect");
    assert_eq!(during.record().url, "http://calc.test/mcp");

    let report = task.await.unwrap().unwrap();
    assert_eq!(report.reconnected, 1);
    let after = h.registry.by_alias("calc").unwrap();
    assert_eq!(after.record().url, "http://calc-v2.test/mcp");
    assert_eq!(h.registry.len(), 1);
}

#[tokio::test]
async fn test_failed_url_change_drops_alias_and_marks_down() {
    let h = GatewayHarness::new();
    let mut record = h.add(backend("calc"));
    h.registry.reconcile().await.unwrap();
    let old_client = h.connector.client("calc").unwrap();

    record.url = "http://calc-v2.test/mcp".to_string();
    h.repo.put(record.clone());
    h.connector.fail_alias("calc", true);
    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(old_client.close_count(), 1);
    assert!(h.registry.by_alias("calc").is_none());
    assert_eq!(h.repo.record(&record.id).unwrap().status, BackendStatus::Down);
}

#[tokio::test]
async fn test_connect_over_live_alias_closes_previous_session() {
    let h = GatewayHarness::new();
    let record = backend("calc");

    h.registry.connect(record.clone()).await.unwrap();
    let first = h.connector.client("calc").unwrap();
    let second = h.registry.connect(record).await.unwrap();

    assert_eq!(first.close_count(), 1);
    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.connector.connect_count(), 2);
    assert!(std::sync::Arc::ptr_eq(
        &h.registry.by_alias("calc").unwrap(),
        &second
    ));
}

#[tokio::test]
async fn test_metadata_change_refreshes_snapshot_only() {
    let h = GatewayHarness::new();
    let mut record = h.add(backend("calc"));
    h.registry.reconcile().await.unwrap();

    record.name = "Calculator".to_string();
    record.description = Some("Arithmetic".to_string());
    h.repo.put(record);
    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.opened(), 0);
    assert_eq!(h.connector.client("calc").unwrap().close_count(), 0);
    assert_eq!(h.registry.by_alias("calc").unwrap().record().name, "Calculator");
}

#[tokio::test]
async fn test_removed_and_disabled_backends_are_closed() {
    let h = GatewayHarness::new();
    let gone = h.add(backend("gone"));
    let off = h.add(backend("off"));
    h.registry.reconcile().await.unwrap();
    let gone_client = h.connector.client("gone").unwrap();
    let off_client = h.connector.client("off").unwrap();

    h.repo.remove(&gone.id);
    h.repo.put(off.with_enabled(false));
    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.removed, 2);
    assert!(h.registry.is_empty());
    assert_eq!(gone_client.close_count(), 1);
    assert_eq!(off_client.close_count(), 1);
}

#[tokio::test]
async fn test_bearer_credential_is_attached() {
    let h = GatewayHarness::new();
    let blob = h.vault.encrypt("tok-123").unwrap();
    h.add(backend("github").with_credential(AuthKind::Bearer, blob));

    h.registry.reconcile().await.unwrap();

    let headers = h.connector.headers_for("github").unwrap();
    assert_eq!(headers.get("authorization").unwrap(), "Bearer tok-123");
}

#[tokio::test]
async fn test_api_key_credential_is_attached() {
    let h = GatewayHarness::new();
    let blob = h.vault.encrypt("key-456").unwrap();
    h.add(backend("search").with_credential(AuthKind::ApiKey, blob));

    h.registry.reconcile().await.unwrap();

    let headers = h.connector.headers_for("search").unwrap();
    assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "key-456");
    assert!(headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_missing_credential_connects_without_auth() {
    let h = GatewayHarness::new();
    let mut record = backend("github");
    record.auth_kind = AuthKind::Bearer;
    h.add(record);

    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.connected, 1);
    assert!(h.connector.headers_for("github").unwrap().is_empty());
}

#[tokio::test]
async fn test_tampered_credential_fails_and_marks_down() {
    let h = GatewayHarness::new();
    let blob = h.vault.encrypt("tok-123").unwrap();
    let record = h.add(backend("github").with_credential(AuthKind::Bearer, tamper(&blob)));

    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(h.registry.by_alias("github").is_none());
    // Never reached the transport
    assert_eq!(h.connector.connect_count(), 0);
    let stored = h.repo.record(&record.id).unwrap();
    assert_eq!(stored.status, BackendStatus::Down);
    assert!(stored.last_checked_at.is_some());
}

#[tokio::test]
async fn test_connect_error_is_typed() {
    let h = GatewayHarness::new();
    let record = backend("calc");
    h.connector.fail_alias("calc", true);

    let err = h.registry.connect(record).await.unwrap_err();

    assert!(matches!(err, GatewayError::Connection { ref alias, .. } if alias == "calc"));
}

#[tokio::test]
async fn test_failed_connect_is_retried_on_next_reconcile() {
    let h = GatewayHarness::new();
    let record = h.add(backend("calc"));
    h.connector.fail_alias("calc", true);

    let first = h.registry.reconcile().await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(h.repo.record(&record.id).unwrap().status, BackendStatus::Down);

    h.connector.fail_alias("calc", false);
    let second = h.registry.reconcile().await.unwrap();

    assert_eq!(second.connected, 1);
    assert!(h.registry.by_alias("calc").is_some());
}

#[tokio::test]
async fn test_new_connection_starts_unknown_and_active() {
    let h = GatewayHarness::new();
    h.add(backend("calc").with_status(BackendStatus::Down));

    h.registry.reconcile().await.unwrap();

    let conn = h.registry.by_alias("calc").unwrap();
    assert_eq!(conn.status(), BackendStatus::Unknown);
    assert!(conn.is_active());
    assert_eq!(h.registry.active_connections().len(), 1);
}

#[tokio::test]
async fn test_store_failure_leaves_live_set_untouched() {
    let h = GatewayHarness::new();
    h.add(backend("calc"));
    h.registry.reconcile().await.unwrap();

    h.repo.fail_list(true);
    let result = h.registry.reconcile().await;

    assert!(result.is_err());
    assert!(h.registry.by_alias("calc").is_some());
}
