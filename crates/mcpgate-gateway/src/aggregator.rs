//! Tool aggregator - the merged, alias-namespaced tool catalog
//!
//! Every tool is published as `<alias>__<tool>` with its description
//! prefixed by `[<alias>]`. The merged list is cached for a fixed TTL and
//! replaced whole on rebuild, so readers see either the previous complete
//! catalog or the new one.

use std::sync::Arc;
use std::time::Duration;

use mcpgate_core::config::TOOL_CACHE_TTL;
use parking_lot::RwLock;
use rmcp::model::Tool;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::pool::{gather_settled, ActiveConnection, BackendError, ServerRegistry};

/// Separator between alias and original tool name.
pub const TOOL_SEPARATOR: &str = "__";

/// Upper bound on a single backend's tools/list.
pub const LIST_TOOLS_TIMEOUT: Duration = Duration::from_secs(30);

/// One aggregated catalog with its expiry.
#[derive(Debug)]
pub struct ToolCacheEntry {
    pub tools: Vec<Tool>,
    pub expires_at: Instant,
}

impl ToolCacheEntry {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// A namespaced tool name resolved to its backend.
#[derive(Debug, Clone)]
pub struct ResolvedTool {
    pub alias: String,
    pub original_name: String,
    pub connection: Arc<ActiveConnection>,
}

/// Split `<alias>__<tool>` on the first separator.
pub fn split_prefixed(prefixed: &str) -> Option<(&str, &str)> {
    prefixed.split_once(TOOL_SEPARATOR)
}

/// Namespace one backend tool under its alias.
pub fn namespace_tool(alias: &str, mut tool: Tool) -> Tool {
    let description = format!(
        "[{}] {}",
        alias,
        tool.description.as_deref().unwrap_or_default()
    );
    tool.name = format!("{}{}{}", alias, TOOL_SEPARATOR, tool.name).into();
    tool.description = Some(description.trim().to_string().into());
    tool
}

pub struct ToolAggregator {
    registry: Arc<ServerRegistry>,
    ttl: Duration,
    list_timeout: Duration,
    cache: RwLock<Option<Arc<ToolCacheEntry>>>,
    /// Single-flight guard for rebuilds
    rebuild: tokio::sync::Mutex<()>,
}

impl ToolAggregator {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self::with_timing(registry, TOOL_CACHE_TTL, LIST_TOOLS_TIMEOUT)
    }

    pub fn with_timing(registry: Arc<ServerRegistry>, ttl: Duration, list_timeout: Duration) -> Self {
        Self {
            registry,
            ttl,
            list_timeout,
            cache: RwLock::new(None),
            rebuild: tokio::sync::Mutex::new(()),
        }
    }

    fn fresh_entry(&self) -> Option<Arc<ToolCacheEntry>> {
        self.cache
            .read()
            .as_ref()
            .filter(|entry| entry.is_fresh())
            .cloned()
    }

    /// The merged catalog, rebuilt if the cached one has expired.
    pub async fn catalog(&self) -> Arc<ToolCacheEntry> {
        if let Some(entry) = self.fresh_entry() {
            return entry;
        }

        let _guard = self.rebuild.lock().await;
        // Another caller may have rebuilt while we waited
        if let Some(entry) = self.fresh_entry() {
            return entry;
        }

        let entry = Arc::new(self.build().await);
        *self.cache.write() = Some(entry.clone());
        entry
    }

    async fn build(&self) -> ToolCacheEntry {
        let connections = self.registry.active_connections();
        let list_timeout = self.list_timeout;

        let results = gather_settled(connections, |conn| {
            let client = conn.client();
            async move {
                match tokio::time::timeout(list_timeout, client.list_tools()).await {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::Timeout(list_timeout)),
                }
            }
        })
        .await;

        let mut tools = Vec::new();
        for (conn, result) in results {
            match result {
                Ok(listed) => {
                    let alias = conn.alias();
                    tools.extend(listed.into_iter().map(|tool| namespace_tool(alias, tool)));
                }
                Err(e) => {
                    warn!(
                        alias = %conn.alias(),
                        error = %e,
                        "[Aggregator] Failed to list tools from backend"
                    );
                }
            }
        }

        debug!(count = tools.len(), "[Aggregator] Catalog rebuilt");

        ToolCacheEntry {
            tools,
            expires_at: Instant::now() + self.ttl,
        }
    }

    /// Resolve `<alias>__<tool>` to its live connection.
    pub fn resolve(&self, prefixed_name: &str) -> Option<ResolvedTool> {
        let (alias, original_name) = split_prefixed(prefixed_name)?;
        let connection = self.registry.by_alias(alias)?;
        Some(ResolvedTool {
            alias: alias.to_string(),
            original_name: original_name.to_string(),
            connection,
        })
    }
}
