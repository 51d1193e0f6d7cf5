//! Server registry - the live set of backend connections
//!
//! Reconciles persisted backend records against live sessions:
//! - Removed or disabled aliases are closed then dropped
//! - A changed url closes the old session then connects a fresh one; the
//!   alias stays mapped to the old entry until the new one replaces it
//! - New aliases are connected
//! - Unchanged aliases only get their record snapshot refreshed
//!
//! Reconciliation is the only path that (re)connects a backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use mcpgate_core::{BackendRecord, BackendRepository, BackendStatus, RepoResult};
use mcpgate_storage::CredentialVault;
use reqwest::header::HeaderMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::BackendClient;
use super::connection::ActiveConnection;
use super::settled::gather_settled;
use super::transport::{auth_headers, BackendConnector};
use crate::error::GatewayError;

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub connected: usize,
    pub reconnected: usize,
    pub removed: usize,
    pub updated: usize,
    pub failed: usize,
}

impl ReconcileReport {
    /// Number of sessions opened in this pass.
    pub fn opened(&self) -> usize {
        self.connected + self.reconnected
    }
}

/// Owns the live connections, keyed by alias.
pub struct ServerRegistry {
    repo: Arc<dyn BackendRepository>,
    vault: Arc<CredentialVault>,
    connector: Arc<dyn BackendConnector>,
    connections: DashMap<String, Arc<ActiveConnection>>,
    /// Serializes reconcile passes and shutdown
    reconcile_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    timer: parking_lot::Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl ServerRegistry {
    pub fn new(
        repo: Arc<dyn BackendRepository>,
        vault: Arc<CredentialVault>,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        Self {
            repo,
            vault,
            connector,
            connections: DashMap::new(),
            reconcile_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            timer: parking_lot::Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Bring the live set in line with the enabled persisted records.
    pub async fn reconcile(&self) -> RepoResult<ReconcileReport> {
        let _guard = self.reconcile_lock.lock().await;
        let mut report = ReconcileReport::default();

        if self.shut_down.load(Ordering::SeqCst) {
            return Ok(report);
        }

        let records = self.repo.list_enabled().await?;
        let mut desired: HashMap<String, BackendRecord> = records
            .into_iter()
            .map(|record| (record.alias.clone(), record))
            .collect();

        // Removed or disabled
        let stale: Vec<String> = self
            .connections
            .iter()
            .filter(|entry| !desired.contains_key(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for alias in stale {
            if let Some((_, conn)) = self.connections.remove(&alias) {
                close_quietly(&conn).await;
                report.removed += 1;
                info!(alias = %alias, "[Registry] Disconnected removed backend");
            }
        }

        // Stable order keeps logs readable
        let mut aliases: Vec<String> = desired.keys().cloned().collect();
        aliases.sort();

        for alias in aliases {
            let Some(record) = desired.remove(&alias) else {
                continue;
            };
            let existing = self.connections.get(&alias).map(|e| e.value().clone());

            match existing {
                Some(conn) if conn.record().url == record.url => {
                    conn.replace_record(record);
                    report.updated += 1;
                }
                Some(conn) => {
                    info!(
                        alias = %alias,
                        old_url = %conn.record().url,
                        new_url = %record.url,
                        "[Registry] Backend url changed, reconnecting"
                    );
                    match self.connect(record).await {
                        Ok(_) => report.reconnected += 1,
                        Err(_) => report.failed += 1,
                    }
                }
                None => match self.connect(record).await {
                    Ok(_) => report.connected += 1,
                    Err(_) => report.failed += 1,
                },
            }
        }

        debug!(
            connected = report.connected,
            reconnected = report.reconnected,
            removed = report.removed,
            updated = report.updated,
            failed = report.failed,
            "[Registry] Reconcile complete"
        );

        Ok(report)
    }

    /// Connect one backend and install it under its alias.
    ///
    /// A session already mapped under the alias is closed first but stays
    /// mapped until the new one overwrites it. If the new connect fails the
    /// old entry is dropped and the persisted record is marked `Down`;
    /// nothing is retried until the next reconciliation.
    pub async fn connect(
        &self,
        record: BackendRecord,
    ) -> Result<Arc<ActiveConnection>, GatewayError> {
        let alias = record.alias.clone();

        let previous = self.by_alias(&alias);
        if let Some(previous) = &previous {
            close_quietly(previous).await;
        }

        let error = match self.open(&record).await {
            Ok(client) if self.shut_down.load(Ordering::SeqCst) => {
                let _ = client.close().await;
                GatewayError::Connection {
                    alias: alias.clone(),
                    reason: "registry is shut down".to_string(),
                }
            }
            Ok(client) => {
                let conn = Arc::new(ActiveConnection::new(record, client));
                self.connections.insert(alias.clone(), conn.clone());
                info!(alias = %alias, url = %conn.record().url, "[Registry] Connected to backend");
                return Ok(conn);
            }
            Err(e) => e,
        };

        if let Some(previous) = previous {
            self.connections
                .remove_if(&alias, |_, mapped| Arc::ptr_eq(mapped, &previous));
        }

        error!(alias = %alias, error = %error, "[Registry] Failed to connect to backend");
        if let Err(persist_err) = self
            .repo
            .update_status(&record.id, BackendStatus::Down, Some(Utc::now()))
            .await
        {
            warn!(
                alias = %alias,
                error = %persist_err,
                "[Registry] Failed to persist DOWN status"
            );
        }
        Err(error)
    }

    async fn open(&self, record: &BackendRecord) -> Result<Arc<dyn BackendClient>, GatewayError> {
        let headers = self.credential_headers(record)?;
        self.connector
            .connect(record, headers)
            .await
            .map_err(|e| GatewayError::Connection {
                alias: record.alias.clone(),
                reason: e.to_string(),
            })
    }

    /// Decrypt the stored credential into its auth header.
    fn credential_headers(&self, record: &BackendRecord) -> Result<HeaderMap, GatewayError> {
        let Some(blob) = record.encrypted_credential.as_deref() else {
            if record.requires_credential() {
                warn!(
                    alias = %record.alias,
                    auth_kind = record.auth_kind.as_str(),
                    "[Registry] No stored credential, connecting without auth"
                );
            }
            return Ok(HeaderMap::new());
        };
        if !record.requires_credential() {
            return Ok(HeaderMap::new());
        }

        let secret = self.vault.decrypt(blob).map_err(|source| GatewayError::Credential {
            alias: record.alias.clone(),
            source,
        })?;
        auth_headers(record.auth_kind, &secret).map_err(|e| GatewayError::Connection {
            alias: record.alias.clone(),
            reason: e.to_string(),
        })
    }

    /// Connections whose last known status is not `Down`.
    pub fn active_connections(&self) -> Vec<Arc<ActiveConnection>> {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Every live connection regardless of status.
    pub fn all_connections(&self) -> Vec<Arc<ActiveConnection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn by_alias(&self, alias: &str) -> Option<Arc<ActiveConnection>> {
        self.connections.get(alias).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Persist a liveness result and mirror it in memory.
    pub async fn record_status(&self, conn: &ActiveConnection, status: BackendStatus) {
        let now = Utc::now();
        conn.set_status(status, Some(now));
        if let Err(e) = self.repo.update_status(&conn.id(), status, Some(now)).await {
            warn!(
                alias = %conn.alias(),
                status = status.as_str(),
                error = %e,
                "[Registry] Failed to persist status"
            );
        }
    }

    /// Start the periodic reconcile loop.
    pub fn start_reconcile_timer(self: &Arc<Self>, period: Duration) {
        let registry = Arc::clone(self);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = registry.reconcile().await {
                    error!(error = %e, "[Registry] Reconcile failed");
                }
            }
            debug!("[Registry] Reconcile timer stopped");
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the reconcile timer, then close every live connection.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let timer = self.timer.lock().take();
        if let Some(handle) = timer {
            let _ = handle.await;
        }

        let _guard = self.reconcile_lock.lock().await;
        let aliases: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let drained: Vec<Arc<ActiveConnection>> = aliases
            .iter()
            .filter_map(|alias| self.connections.remove(alias).map(|(_, conn)| conn))
            .collect();

        let count = drained.len();
        gather_settled(drained, |conn| {
            let conn = Arc::clone(conn);
            async move {
                close_quietly(&conn).await;
                Ok::<_, ()>(())
            }
        })
        .await;

        info!(closed = count, "[Registry] Shut down");
    }
}

/// Close a session, logging and swallowing any error.
async fn close_quietly(conn: &ActiveConnection) {
    if let Err(e) = conn.client().close().await {
        debug!(alias = %conn.alias(), error = %e, "[Registry] Close failed (ignored)");
    }
}
