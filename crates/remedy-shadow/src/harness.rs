//! Session lifecycle management

use crate::session::{MirroredInput, SessionId, ShadowConfig, ShadowReport, ShadowSession};
use chrono::Utc;
use dashmap::DashMap;
use remedy_core::ComplianceScore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Read-only view of the production compliance index, sampled at session
/// start and end to verify the isolation invariant.
pub trait ComplianceProbe: Send + Sync {
    /// Current production compliance.
    fn current(&self) -> ComplianceScore;
}

impl<F> ComplianceProbe for F
where
    F: Fn() -> ComplianceScore + Send + Sync,
{
    fn current(&self) -> ComplianceScore {
        self()
    }
}

/// Creates and tears down isolated trial sessions.
///
/// Sessions run fully in parallel with the production control loop and
/// with each other; the only thing they share with production is the
/// read-only probe and the mirrored inputs.
pub struct ShadowHarness {
    probe: Arc<dyn ComplianceProbe>,
}

impl ShadowHarness {
    /// Harness over the given production probe.
    #[must_use]
    pub fn new(probe: Arc<dyn ComplianceProbe>) -> Self {
        Self { probe }
    }

    /// Start an isolated session.
    #[must_use]
    pub fn begin_session(&self, config: ShadowConfig) -> ShadowSession {
        let (tx, mut rx) = mpsc::channel::<MirroredInput>(config.queue_depth);
        let id = SessionId::new();

        // The session's entire mutable state lives inside this task.
        let consumer = tokio::spawn(async move {
            let mut store: HashMap<u64, Value> = HashMap::new();
            let mut processed = 0u64;
            while let Some(input) = rx.recv().await {
                store.insert(input.sequence, input.payload);
                processed += 1;
            }
            (store, processed)
        });

        tracing::info!(session = %id, label = %config.label, "shadow session started");
        ShadowSession {
            id,
            label: config.label,
            tx: Some(tx),
            consumer,
            accepted: DashMap::new(),
            mirrored: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            baseline: self.probe.current(),
            degrade: config.degrade_compliance_by,
            started_at: Utc::now(),
        }
    }

    /// Drain the mirror queue, tear down the isolated store and report.
    pub async fn end_session(&self, mut session: ShadowSession) -> ShadowReport {
        // Closing the sender lets the consumer drain and exit.
        session.tx.take();
        let (store, processed) = session
            .consumer
            .await
            .unwrap_or_else(|_| (HashMap::new(), 0));

        let divergence_count = session
            .accepted
            .iter()
            .filter(|entry| store.get(entry.key()) != Some(entry.value()))
            .count() as u64
            + store
                .iter()
                .filter(|(sequence, _)| !session.accepted.contains_key(sequence))
                .count() as u64;

        let production_after = self.probe.current();
        let session_compliance = session.baseline.apply_delta(-session.degrade);
        let report = ShadowReport {
            session_id: session.id,
            label: session.label.clone(),
            started_at: session.started_at,
            ended_at: Utc::now(),
            mirrored: session.mirrored.load(std::sync::atomic::Ordering::Relaxed),
            dropped: session.dropped.load(std::sync::atomic::Ordering::Relaxed),
            processed,
            divergence_count,
            session_compliance,
            compliance_delta: session_compliance.value() - session.baseline.value(),
            production_compliance_before: session.baseline,
            production_compliance_after: production_after,
            production_compliance_unchanged: production_after == session.baseline,
        };
        tracing::info!(
            session = %report.session_id,
            mirrored = report.mirrored,
            dropped = report.dropped,
            divergence = report.divergence_count,
            "shadow session ended"
        );
        report
    }
}
