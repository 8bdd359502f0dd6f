//! Safety metrics
//!
//! Counters sit behind [`SafetyMetrics`] so the storage is swappable
//! (in-memory atomics here; an exported registry elsewhere). The in-memory
//! implementation also mirrors every increment to the `metrics` facade for
//! an external collector.
//!
//! Invariant: `blocked + successful == total` at every point in the
//! gateway's lifetime, which holds because each recorded operation bumps
//! `total` and exactly one of the other two.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the safety counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTotals {
    pub total_ops: u64,
    pub blocked_ops: u64,
    pub successful_ops: u64,
}

impl MetricsTotals {
    /// Fraction of operations admitted past the gate. 1.0 when idle.
    #[must_use]
    pub fn safety_rate(&self) -> f64 {
        if self.total_ops == 0 {
            1.0
        } else {
            self.successful_ops as f64 / self.total_ops as f64
        }
    }
}

/// Counter seam for the gateway.
pub trait SafetyMetrics: Send + Sync {
    /// Record an operation admitted past the gate.
    fn record_successful(&self, operation: &str);

    /// Record an operation the gate refused (block or unconfirmed warn).
    fn record_blocked(&self, operation: &str);

    /// Current totals.
    fn totals(&self) -> MetricsTotals;

    /// The `n` most frequently blocked operations, descending by count.
    fn top_blocked(&self, n: usize) -> Vec<(String, u64)>;
}

/// Atomic in-memory counters plus the blocked-operations registry.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    total: AtomicU64,
    blocked: AtomicU64,
    successful: AtomicU64,
    blocked_registry: DashMap<String, u64>,
}

impl InMemoryMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SafetyMetrics for InMemoryMetrics {
    fn record_successful(&self, _operation: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.successful.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("gateway_ops_total").increment(1);
        metrics::counter!("gateway_ops_successful").increment(1);
    }

    fn record_blocked(&self, operation: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.blocked.fetch_add(1, Ordering::Relaxed);
        *self
            .blocked_registry
            .entry(operation.to_string())
            .or_insert(0) += 1;
        metrics::counter!("gateway_ops_total").increment(1);
        metrics::counter!("gateway_ops_blocked").increment(1);
    }

    fn totals(&self) -> MetricsTotals {
        // Blocked and successful are read first so a concurrent increment
        // can only make `total` larger, never break the invariant downward.
        let blocked = self.blocked.load(Ordering::Relaxed);
        let successful = self.successful.load(Ordering::Relaxed);
        MetricsTotals {
            total_ops: blocked + successful,
            blocked_ops: blocked,
            successful_ops: successful,
        }
    }

    fn top_blocked(&self, n: usize) -> Vec<(String, u64)> {
        let mut entries: Vec<(String, u64)> = self
            .blocked_registry
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }
}
