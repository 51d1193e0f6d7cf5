//! Backend client capability
//!
//! Every backend is reached through [`BackendClient`]; the aggregator, proxy
//! and health checker depend only on this trait. [`RmcpBackendClient`] is the
//! Streamable HTTP implementation built on rmcp.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, ClientRequest,
    Implementation, JsonObject, Tool,
};
use rmcp::service::{NotificationContext, Peer, RunningService, ServiceError};
use rmcp::RoleClient;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Type alias for the MCP client service
pub type McpClient = RunningService<RoleClient, McpClientHandler>;

/// Errors raised by a backend client.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with an MCP error or the session failed
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Transport setup or MCP handshake failed
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend connection is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Capability shared by every backend connection.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// List every tool the backend exposes (all pages).
    async fn list_tools(&self) -> Result<Vec<Tool>, BackendError>;

    /// Invoke a tool by its original (un-prefixed) name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, BackendError>;

    /// Liveness probe (MCP `ping`).
    async fn ping(&self) -> Result<(), BackendError>;

    /// Close the session. Calling twice is a no-op.
    async fn close(&self) -> Result<(), BackendError>;
}

/// Client handler for outbound MCP connections
#[derive(Clone)]
pub struct McpClientHandler {
    info: ClientInfo,
    alias: String,
}

impl std::fmt::Debug for McpClientHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClientHandler")
            .field("alias", &self.alias)
            .finish()
    }
}

impl McpClientHandler {
    pub fn new(alias: &str) -> Self {
        Self {
            info: ClientInfo {
                protocol_version: Default::default(),
                capabilities: ClientCapabilities::default(),
                client_info: Implementation {
                    name: format!("mcpgate-{}", alias),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: Some("McpGate Gateway".to_string()),
                    ..Default::default()
                },
                meta: None,
            },
            alias: alias.to_string(),
        }
    }
}

impl rmcp::ClientHandler for McpClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }

    fn on_tool_list_changed(
        &self,
        _context: NotificationContext<RoleClient>,
    ) -> impl std::future::Future<Output = ()> + Send + '_ {
        let alias = self.alias.clone();
        async move {
            // The aggregated catalog expires on its own; nothing to invalidate.
            info!(alias = %alias, "[McpClientHandler] Backend sent tools/list_changed");
        }
    }
}

/// Streamable HTTP backend client.
///
/// Requests go through a cloned [`Peer`]; the running service is kept only
/// so that `close` can cancel it.
pub struct RmcpBackendClient {
    alias: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<McpClient>>,
}

impl RmcpBackendClient {
    pub fn new(alias: impl Into<String>, client: McpClient) -> Self {
        let peer = client.peer().clone();
        Self {
            alias: alias.into(),
            peer,
            service: Mutex::new(Some(client)),
        }
    }
}

#[async_trait]
impl BackendClient for RmcpBackendClient {
    async fn list_tools(&self) -> Result<Vec<Tool>, BackendError> {
        Ok(self.peer.list_all_tools().await?)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, BackendError> {
        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments,
            task: None,
            meta: None,
        };
        Ok(self.peer.call_tool(params).await?)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.peer
            .send_request(ClientRequest::PingRequest(Default::default()))
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };
        debug!(alias = %self.alias, "[RmcpBackendClient] Closing session");
        service
            .cancel()
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Other(format!("close failed: {}", e)))
    }
}
