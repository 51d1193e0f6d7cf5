//! Proxy - routes a namespaced tool call to its backend
//!
//! Every routed call records metrics and a request log row before the
//! result is returned or the backend error is re-raised.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mcpgate_core::{CallOutcome, CallStatus, RequestLog, RequestLogRepository};
use rmcp::model::{CallToolResult, JsonObject};
use tracing::{debug, info, warn};

use crate::aggregator::ToolAggregator;
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::pool::BackendError;

/// Default timeout for a routed tool call.
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Proxy {
    aggregator: Arc<ToolAggregator>,
    logs: Arc<dyn RequestLogRepository>,
    metrics: Arc<GatewayMetrics>,
    call_timeout: Duration,
}

impl Proxy {
    pub fn new(
        aggregator: Arc<ToolAggregator>,
        logs: Arc<dyn RequestLogRepository>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            aggregator,
            logs,
            metrics,
            call_timeout: TOOL_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Call `<alias>__<tool>` with the given arguments.
    pub async fn invoke(
        &self,
        prefixed_name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, GatewayError> {
        let resolved = self
            .aggregator
            .resolve(prefixed_name)
            .ok_or_else(|| GatewayError::OperationNotFound(prefixed_name.to_string()))?;

        let alias = resolved.alias.as_str();
        let tool = resolved.original_name.as_str();
        let backend_id = resolved.connection.id();
        let client = resolved.connection.client();

        debug!(alias = %alias, tool = %tool, "[Proxy] Routing call");

        let start = Instant::now();
        let result = match tokio::time::timeout(
            self.call_timeout,
            client.call_tool(tool, Some(arguments.unwrap_or_default())),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.call_timeout)),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                self.metrics.increment_call(alias, tool, CallStatus::Success);
                self.metrics.observe_latency(alias, latency_ms);
                self.append_log(CallOutcome::success(tool, alias, backend_id, latency_ms))
                    .await;
                info!(alias = %alias, tool = %tool, latency_ms, "[Proxy] Call succeeded");
                Ok(output)
            }
            Err(e) => {
                self.metrics.increment_call(alias, tool, CallStatus::Error);
                self.append_log(CallOutcome::error(
                    tool,
                    alias,
                    backend_id,
                    latency_ms,
                    e.to_string(),
                ))
                .await;
                warn!(alias = %alias, tool = %tool, latency_ms, error = %e, "[Proxy] Call failed");
                Err(GatewayError::Downstream(e))
            }
        }
    }

    /// Log persistence never masks the call result.
    async fn append_log(&self, outcome: CallOutcome) {
        if let Err(e) = self.logs.append(&RequestLog::from_outcome(&outcome)).await {
            warn!(
                alias = %outcome.alias,
                tool = %outcome.tool_name,
                error = %e,
                "[Proxy] Failed to append request log"
            );
        }
    }
}
