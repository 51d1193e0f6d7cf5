//! Startup and shutdown tests

use std::sync::Arc;
use std::time::Duration;

use mcpgate_gateway::{Gateway, GatewayDependencies};
use pretty_assertions::assert_eq;
use tests::fixtures::backend;
use tests::harness::GatewayHarness;
use tests::mocks::{MockBackendRepository, MockConnector, MockRequestLogRepository};

#[tokio::test]
async fn test_shutdown_closes_everything_once() {
    let h = GatewayHarness::new();
    h.add(backend("calc"));
    h.add(backend("weather"));
    h.registry.reconcile().await.unwrap();
    let calc = h.connector.client("calc").unwrap();
    let weather = h.connector.client("weather").unwrap();

    h.registry.shutdown().await;
    h.registry.shutdown().await;

    assert!(h.registry.is_empty());
    assert_eq!(calc.close_count(), 1);
    assert_eq!(weather.close_count(), 1);
}

#[tokio::test]
async fn test_reconcile_after_shutdown_is_inert() {
    let h = GatewayHarness::new();
    h.registry.shutdown().await;
    h.add(backend("calc"));

    let report = h.registry.reconcile().await.unwrap();

    assert_eq!(report.opened(), 0);
    assert_eq!(h.connector.connect_count(), 0);
    assert!(h.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_timer_picks_up_new_backends() {
    let h = GatewayHarness::new();
    h.registry.start_reconcile_timer(Duration::from_secs(60));

    h.add(backend("late"));
    assert!(h.registry.by_alias("late").is_none());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(h.registry.by_alias("late").is_some());

    h.registry.shutdown().await;
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_gateway_start_and_shutdown() {
    let repo = Arc::new(MockBackendRepository::new().with_record(backend("calc")));
    let logs = Arc::new(MockRequestLogRepository::new());
    let connector = Arc::new(MockConnector::new());
    let deps = GatewayDependencies::new(repo, logs, Arc::new(tests::fixtures::vault()))
        .with_connector(connector.clone());
    let gateway = Gateway::new(deps);

    let report = gateway
        .start(Duration::from_secs(60), Duration::from_secs(30))
        .await;

    assert_eq!(report.connected, 1);
    assert!(gateway.registry().by_alias("calc").is_some());
    assert!(gateway.proxy().invoke("calc__add", None).await.is_ok());

    gateway.shutdown().await;
    gateway.shutdown().await;

    assert!(gateway.registry().is_empty());
    assert_eq!(connector.client("calc").unwrap().close_count(), 1);
}
