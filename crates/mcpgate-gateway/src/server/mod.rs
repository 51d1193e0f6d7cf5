//! Gateway Server
//!
//! HTTP server exposing the aggregated MCP endpoint over Streamable HTTP,
//! plus the gateway and backend health routes.

mod handlers;

pub use handlers::{BackendHealth, HealthResponse};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderValue, routing::get, Router};
use mcpgate_core::CorsOrigins;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::gateway::Gateway;

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(origin = %origin, error = %e, "[Gateway] Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the Axum router.
///
/// The MCP service is stateful: each client gets an `Mcp-Session-Id` at
/// initialize, and `cancel` tears down all sessions.
pub fn build_router(gateway: Arc<Gateway>, cors: &CorsOrigins, cancel: CancellationToken) -> Router {
    let handler = gateway.handler();

    let mcp_service = StreamableHttpService::new(
        move || {
            debug!("[Gateway] Creating handler instance for MCP session");
            Ok(handler.clone())
        },
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(30)),
            sse_retry: Some(Duration::from_secs(3)),
            cancellation_token: cancel,
        },
    );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/admin/health", get(handlers::admin_health))
        .with_state(gateway)
        .nest_service("/mcp", mcp_service)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
}

/// MCP Gateway Server
pub struct GatewayServer {
    addr: SocketAddr,
    cors: CorsOrigins,
    gateway: Arc<Gateway>,
    cancel: CancellationToken,
}

impl GatewayServer {
    pub fn new(addr: SocketAddr, cors: CorsOrigins, gateway: Arc<Gateway>) -> Self {
        Self {
            addr,
            cors,
            gateway,
            cancel: CancellationToken::new(),
        }
    }

    /// Serve until `shutdown` resolves, then close every MCP session.
    ///
    /// The engine itself is not shut down here; call [`Gateway::shutdown`]
    /// afterwards.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.gateway.clone(), &self.cors, self.cancel.clone());
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("[Gateway] Listening on {}", listener.local_addr()?);

        let cancel = self.cancel.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("[Gateway] Shutdown signal received, closing MCP sessions");
                cancel.cancel();
            })
            .await?;

        Ok(())
    }
}
