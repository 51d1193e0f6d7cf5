//! Gateway runtime - wires the engine components and owns their lifecycle

use std::sync::Arc;
use std::time::Duration;

use mcpgate_core::config::CONNECT_TIMEOUT;
use mcpgate_core::{BackendRepository, RepoResult, RequestLogRepository};
use mcpgate_storage::CredentialVault;
use tracing::{error, info};

use crate::aggregator::ToolAggregator;
use crate::health::HealthChecker;
use crate::mcp::McpGateHandler;
use crate::metrics::GatewayMetrics;
use crate::pool::{BackendConnector, HttpBackendConnector, ReconcileReport, ServerRegistry};
use crate::proxy::Proxy;

/// Dependency container for the gateway engine.
#[derive(Clone)]
pub struct GatewayDependencies {
    pub backend_repo: Arc<dyn BackendRepository>,
    pub request_log_repo: Arc<dyn RequestLogRepository>,
    pub vault: Arc<CredentialVault>,
    pub connector: Arc<dyn BackendConnector>,
}

impl GatewayDependencies {
    /// Dependencies using the Streamable HTTP connector.
    pub fn new(
        backend_repo: Arc<dyn BackendRepository>,
        request_log_repo: Arc<dyn RequestLogRepository>,
        vault: Arc<CredentialVault>,
    ) -> Self {
        Self {
            backend_repo,
            request_log_repo,
            vault,
            connector: Arc::new(HttpBackendConnector::new(CONNECT_TIMEOUT)),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn BackendConnector>) -> Self {
        self.connector = connector;
        self
    }
}

/// The assembled engine: registry, aggregator, proxy and health checker.
pub struct Gateway {
    registry: Arc<ServerRegistry>,
    aggregator: Arc<ToolAggregator>,
    proxy: Arc<Proxy>,
    health: Arc<HealthChecker>,
    metrics: Arc<GatewayMetrics>,
}

impl Gateway {
    pub fn new(dependencies: GatewayDependencies) -> Self {
        let metrics = Arc::new(GatewayMetrics::new());
        let registry = Arc::new(ServerRegistry::new(
            dependencies.backend_repo,
            dependencies.vault,
            dependencies.connector,
        ));
        let aggregator = Arc::new(ToolAggregator::new(registry.clone()));
        let proxy = Arc::new(Proxy::new(
            aggregator.clone(),
            dependencies.request_log_repo,
            metrics.clone(),
        ));
        let health = Arc::new(HealthChecker::new(registry.clone(), metrics.clone()));

        Self {
            registry,
            aggregator,
            proxy,
            health,
            metrics,
        }
    }

    /// Run the first reconcile, then start both background loops.
    ///
    /// A failed first pass is logged; the timer retries on the next tick.
    pub async fn start(&self, reload_interval: Duration, health_interval: Duration) -> ReconcileReport {
        let report = match self.registry.reconcile().await {
            Ok(report) => {
                info!(
                    connected = report.connected,
                    failed = report.failed,
                    "[Gateway] Initial reconcile complete"
                );
                report
            }
            Err(e) => {
                error!(error = %e, "[Gateway] Initial reconcile failed");
                ReconcileReport::default()
            }
        };

        self.registry.start_reconcile_timer(reload_interval);
        self.health.start(health_interval);
        info!(
            reload_interval_ms = reload_interval.as_millis() as u64,
            health_interval_ms = health_interval.as_millis() as u64,
            "[Gateway] Background loops started"
        );
        report
    }

    /// Reconcile immediately, outside the timer.
    pub async fn reconcile(&self) -> RepoResult<ReconcileReport> {
        self.registry.reconcile().await
    }

    /// MCP handler for the inbound endpoint.
    pub fn handler(&self) -> McpGateHandler {
        McpGateHandler::new(self.aggregator.clone(), self.proxy.clone())
    }

    pub fn registry(&self) -> Arc<ServerRegistry> {
        self.registry.clone()
    }

    pub fn aggregator(&self) -> Arc<ToolAggregator> {
        self.aggregator.clone()
    }

    pub fn proxy(&self) -> Arc<Proxy> {
        self.proxy.clone()
    }

    pub fn health_checker(&self) -> Arc<HealthChecker> {
        self.health.clone()
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        self.metrics.clone()
    }

    /// Stop the health loop, then the reconcile loop, then close every
    /// connection. Idempotent.
    pub async fn shutdown(&self) {
        self.health.stop().await;
        self.registry.shutdown().await;
    }
}
