//! Gateway metrics
//!
//! In-process counters, a per-alias latency histogram and the healthy
//! backends gauge. Export formatting is left to callers of [`GatewayMetrics::snapshot`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use mcpgate_core::CallStatus;

/// Latency histogram upper bounds (ms).
pub const LATENCY_BUCKETS_MS: [u64; 8] = [10, 50, 100, 250, 500, 1000, 2500, 5000];

/// Label set of the call counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallLabels {
    pub alias: String,
    pub tool: String,
    pub status: CallStatus,
}

impl CallLabels {
    pub fn new(alias: impl Into<String>, tool: impl Into<String>, status: CallStatus) -> Self {
        Self {
            alias: alias.into(),
            tool: tool.into(),
            status,
        }
    }
}

#[derive(Default)]
struct LatencyHistogram {
    /// Non-cumulative counts; the last slot is the overflow bucket
    buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
    count: AtomicU64,
    sum_ms: AtomicU64,
}

impl LatencyHistogram {
    fn observe(&self, latency_ms: u64) {
        let slot = LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| latency_ms <= *bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let mut cumulative = 0;
        let buckets = LATENCY_BUCKETS_MS
            .iter()
            .zip(self.buckets.iter())
            .map(|(bound, slot)| {
                cumulative += slot.load(Ordering::Relaxed);
                (*bound, cumulative)
            })
            .collect();
        HistogramSnapshot {
            buckets,
            count: self.count.load(Ordering::Relaxed),
            sum_ms: self.sum_ms.load(Ordering::Relaxed),
        }
    }
}

/// Cumulative histogram view: `(upper_bound_ms, observations <= bound)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistogramSnapshot {
    pub buckets: Vec<(u64, u64)>,
    pub count: u64,
    pub sum_ms: u64,
}

/// Point-in-time copy of every metric.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls: BTreeMap<CallLabels, u64>,
    pub latency: BTreeMap<String, HistogramSnapshot>,
    pub healthy_backends: u64,
}

impl MetricsSnapshot {
    pub fn call_count(&self, alias: &str, tool: &str, status: CallStatus) -> u64 {
        self.calls
            .get(&CallLabels::new(alias, tool, status))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Default)]
pub struct GatewayMetrics {
    calls: DashMap<CallLabels, AtomicU64>,
    latency: DashMap<String, LatencyHistogram>,
    healthy_backends: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_call(&self, alias: &str, tool: &str, status: CallStatus) {
        let labels = CallLabels::new(alias, tool, status);
        if let Some(counter) = self.calls.get(&labels) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.calls
            .entry(labels)
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, alias: &str, latency_ms: u64) {
        if let Some(histogram) = self.latency.get(alias) {
            histogram.observe(latency_ms);
            return;
        }
        self.latency
            .entry(alias.to_string())
            .or_default()
            .observe(latency_ms);
    }

    pub fn set_healthy_backends(&self, count: u64) {
        self.healthy_backends.store(count, Ordering::Relaxed);
    }

    pub fn healthy_backends(&self) -> u64 {
        self.healthy_backends.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self
                .calls
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
            latency: self
                .latency
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().snapshot()))
                .collect(),
            healthy_backends: self.healthy_backends(),
        }
    }
}
