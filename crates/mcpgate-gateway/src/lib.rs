//! McpGate Gateway
//!
//! MCP gateway that fronts many backend MCP servers behind one endpoint:
//! - Live connection registry reconciled against persisted backend records
//! - Aggregated, alias-namespaced tool catalog with a short-lived cache
//! - Call proxy with routing, request logging and metrics
//! - Periodic liveness probing of every backend

pub mod aggregator;
pub mod error;
pub mod gateway;
pub mod health;
pub mod mcp;
pub mod metrics;
pub mod pool;
pub mod proxy;
pub mod server;

pub use aggregator::{ResolvedTool, ToolAggregator, ToolCacheEntry, TOOL_SEPARATOR};
pub use error::GatewayError;
pub use gateway::{Gateway, GatewayDependencies};
pub use health::{HealthChecker, HealthReport};
pub use mcp::McpGateHandler;
pub use metrics::{CallLabels, GatewayMetrics, HistogramSnapshot, MetricsSnapshot, LATENCY_BUCKETS_MS};
pub use pool::{
    auth_headers, gather_settled, ActiveConnection, BackendClient, BackendConnector, BackendError,
    HttpBackendConnector, Liveness, McpClientHandler, ReconcileReport, RmcpBackendClient,
    ServerRegistry, API_KEY_HEADER,
};
pub use proxy::{Proxy, TOOL_CALL_TIMEOUT};
pub use server::{build_router, BackendHealth, GatewayServer, HealthResponse};
