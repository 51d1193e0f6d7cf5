//! Health checker - periodic liveness probing of every live backend

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mcpgate_core::config::PROBE_TIMEOUT;
use mcpgate_core::BackendStatus;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::GatewayMetrics;
use crate::pool::{gather_settled, BackendError, ServerRegistry};

/// Result of one probe cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub up: usize,
    pub down: usize,
}

pub struct HealthChecker {
    registry: Arc<ServerRegistry>,
    metrics: Arc<GatewayMetrics>,
    probe_timeout: Duration,
    cancel: CancellationToken,
    timer: parking_lot::Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl HealthChecker {
    pub fn new(registry: Arc<ServerRegistry>, metrics: Arc<GatewayMetrics>) -> Self {
        Self::with_probe_timeout(registry, metrics, PROBE_TIMEOUT)
    }

    pub fn with_probe_timeout(
        registry: Arc<ServerRegistry>,
        metrics: Arc<GatewayMetrics>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metrics,
            probe_timeout,
            cancel: CancellationToken::new(),
            timer: parking_lot::Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    /// Probe every live connection once.
    ///
    /// The ping runs on its own task so a timed-out probe is abandoned, not
    /// cancelled mid-request.
    pub async fn run_checks(&self) -> HealthReport {
        let connections = self.registry.all_connections();
        let probe_timeout = self.probe_timeout;

        let results = gather_settled(connections, |conn| {
            let client = conn.client();
            async move {
                let probe = tokio::spawn(async move { client.ping().await });
                match tokio::time::timeout(probe_timeout, probe).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => Err(BackendError::Other(format!("probe task failed: {}", join_err))),
                    Err(_) => Err(BackendError::Timeout(probe_timeout)),
                }
            }
        })
        .await;

        let mut report = HealthReport::default();
        for (conn, result) in results {
            match result {
                Ok(()) => {
                    self.registry.record_status(&conn, BackendStatus::Up).await;
                    report.up += 1;
                }
                Err(e) => {
                    warn!(alias = %conn.alias(), error = %e, "[HealthChecker] Health check failed");
                    self.registry.record_status(&conn, BackendStatus::Down).await;
                    report.down += 1;
                }
            }
        }

        self.metrics.set_healthy_backends(report.up as u64);
        debug!(up = report.up, down = report.down, "[HealthChecker] Cycle complete");
        report
    }

    /// Start the periodic probe loop.
    pub fn start(self: &Arc<Self>, period: Duration) {
        let checker = Arc::clone(self);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                checker.run_checks().await;
            }
            debug!("[HealthChecker] Timer stopped");
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the probe loop and wait for an in-flight cycle. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let timer = self.timer.lock().take();
        if let Some(handle) = timer {
            let _ = handle.await;
        }
    }
}
