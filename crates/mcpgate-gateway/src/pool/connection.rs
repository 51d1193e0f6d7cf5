//! Active connection - a live client paired with its record snapshot

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mcpgate_core::{BackendRecord, BackendStatus};
use parking_lot::RwLock;
use uuid::Uuid;

use super::client::BackendClient;

/// Last probe result held in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub status: BackendStatus,
    pub checked_at: Option<DateTime<Utc>>,
}

/// One live backend session, keyed by alias in the registry.
///
/// The record snapshot is replaced whole by reconciliation; liveness is
/// written only by connect and the health checker.
pub struct ActiveConnection {
    alias: String,
    record: RwLock<Arc<BackendRecord>>,
    liveness: RwLock<Liveness>,
    client: Arc<dyn BackendClient>,
}

impl std::fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConnection")
            .field("alias", &self.alias)
            .field("liveness", &*self.liveness.read())
            .finish_non_exhaustive()
    }
}

impl ActiveConnection {
    /// A fresh connection starts `Unknown` until its first probe.
    pub fn new(record: BackendRecord, client: Arc<dyn BackendClient>) -> Self {
        Self {
            alias: record.alias.clone(),
            record: RwLock::new(Arc::new(record)),
            liveness: RwLock::new(Liveness {
                status: BackendStatus::Unknown,
                checked_at: None,
            }),
            client,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn id(&self) -> Uuid {
        self.record.read().id
    }

    /// Current record snapshot.
    pub fn record(&self) -> Arc<BackendRecord> {
        self.record.read().clone()
    }

    /// Swap in a new record snapshot without touching the session.
    pub fn replace_record(&self, record: BackendRecord) {
        *self.record.write() = Arc::new(record);
    }

    pub fn client(&self) -> Arc<dyn BackendClient> {
        self.client.clone()
    }

    pub fn liveness(&self) -> Liveness {
        *self.liveness.read()
    }

    pub fn status(&self) -> BackendStatus {
        self.liveness.read().status
    }

    pub fn set_status(&self, status: BackendStatus, checked_at: Option<DateTime<Utc>>) {
        *self.liveness.write() = Liveness { status, checked_at };
    }

    /// Whether the connection is eligible for listing and calls.
    pub fn is_active(&self) -> bool {
        self.status() != BackendStatus::Down
    }
}
