//! McpGate MCP Handler
//!
//! Implements the MCP ServerHandler trait: `tools/list` is served from the
//! aggregated catalog and `tools/call` is routed through the proxy.

use std::sync::Arc;

use rmcp::{
    model::*, service::RequestContext, service::ServiceError, ErrorData as McpError, RoleServer,
    ServerHandler,
};
use tracing::{debug, info};

use crate::aggregator::ToolAggregator;
use crate::error::GatewayError;
use crate::pool::BackendError;
use crate::proxy::Proxy;

/// Inbound MCP handler shared by every session.
#[derive(Clone)]
pub struct McpGateHandler {
    aggregator: Arc<ToolAggregator>,
    proxy: Arc<Proxy>,
}

impl McpGateHandler {
    pub fn new(aggregator: Arc<ToolAggregator>, proxy: Arc<Proxy>) -> Self {
        Self { aggregator, proxy }
    }
}

/// Map a gateway error to the MCP error returned to the client.
pub fn to_mcp_error(error: GatewayError) -> McpError {
    match error {
        GatewayError::OperationNotFound(name) => {
            McpError::invalid_params(format!("Tool '{}' not found in any active server", name), None)
        }
        // Backend MCP errors pass through unchanged
        GatewayError::Downstream(BackendError::Service(ServiceError::McpError(data))) => data,
        other => McpError::internal_error(other.to_string(), None),
    }
}

impl ServerHandler for McpGateHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "mcpgate".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "McpGate aggregates multiple MCP servers. Tools are named <alias>__<tool>."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let catalog = self.aggregator.catalog().await;
        debug!(count = catalog.tools.len(), "list_tools");
        Ok(ListToolsResult::with_all_items(catalog.tools.clone()))
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = %params.name, "call_tool");

        self.proxy
            .invoke(&params.name, params.arguments)
            .await
            .map_err(to_mcp_error)
    }
}
