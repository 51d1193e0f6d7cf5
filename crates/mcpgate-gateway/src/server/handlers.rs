//! HTTP handlers outside the MCP endpoint

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use mcpgate_core::BackendStatus;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::gateway::Gateway;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Gateway liveness.
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// One row of the backend health report.
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub id: Uuid,
    pub name: String,
    pub alias: String,
    pub url: String,
    pub status: BackendStatus,
    pub enabled: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Liveness of every live backend connection, ordered by alias.
pub async fn admin_health(State(gateway): State<Arc<Gateway>>) -> Json<Vec<BackendHealth>> {
    let mut rows: Vec<BackendHealth> = gateway
        .registry()
        .all_connections()
        .iter()
        .map(|conn| {
            let record = conn.record();
            let liveness = conn.liveness();
            BackendHealth {
                id: record.id,
                name: record.name.clone(),
                alias: record.alias.clone(),
                url: record.url.clone(),
                status: liveness.status,
                enabled: record.enabled,
                last_checked_at: liveness.checked_at.or(record.last_checked_at),
            }
        })
        .collect();
    rows.sort_by(|a, b| a.alias.cmp(&b.alias));
    Json(rows)
}
