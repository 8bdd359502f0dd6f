//! Shadow sessions and their reports

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use remedy_core::ComplianceScore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One production input copied into a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirroredInput {
    /// Production-assigned sequence number
    pub sequence: u64,
    pub payload: Value,
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct ShadowConfig {
    /// Operator-facing label for the trial
    pub label: String,
    /// Mirror queue depth; overflow is dropped, never blocked on
    pub queue_depth: usize,
    /// Known-bad configuration: how far the trialed config is expected to
    /// depress the compliance index inside the session. Zero for a
    /// faithful mirror.
    pub degrade_compliance_by: f64,
}

impl ShadowConfig {
    /// Faithful-mirror config with the given queue depth.
    #[must_use]
    pub fn new(label: impl Into<String>, queue_depth: usize) -> Self {
        Self {
            label: label.into(),
            queue_depth: queue_depth.max(1),
            degrade_compliance_by: 0.0,
        }
    }

    /// Load a known-bad configuration into the session.
    #[inline]
    #[must_use]
    pub fn with_degradation(mut self, degrade_compliance_by: f64) -> Self {
        self.degrade_compliance_by = degrade_compliance_by;
        self
    }
}

/// Isolated trial execution context.
///
/// The session's state store lives inside its consumer task; nothing the
/// session does can reach production state.
pub struct ShadowSession {
    pub(crate) id: SessionId,
    pub(crate) label: String,
    pub(crate) tx: Option<mpsc::Sender<MirroredInput>>,
    pub(crate) consumer: JoinHandle<(HashMap<u64, Value>, u64)>,
    /// Production-side record of inputs actually handed to the queue
    pub(crate) accepted: DashMap<u64, Value>,
    pub(crate) mirrored: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) baseline: ComplianceScore,
    pub(crate) degrade: f64,
    pub(crate) started_at: DateTime<Utc>,
}

impl ShadowSession {
    /// Session identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Mirror one production input into the session, best-effort.
    ///
    /// Never blocks and never fails the production path: a full (or
    /// already-closed) queue drops the input and bumps the drop counter.
    pub fn mirror(&self, input: MirroredInput) {
        let Some(tx) = &self.tx else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match tx.try_send(input.clone()) {
            Ok(()) => {
                self.accepted.insert(input.sequence, input.payload);
                self.mirrored.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Inputs accepted so far.
    #[must_use]
    pub fn mirrored_count(&self) -> u64 {
        self.mirrored.load(Ordering::Relaxed)
    }

    /// Inputs dropped on overflow so far.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Label the session was started with.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// What a finished trial observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowReport {
    pub session_id: SessionId,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub mirrored: u64,
    pub dropped: u64,
    pub processed: u64,
    /// Mirrored entries that differ from production's record; zero under
    /// correct mirroring
    pub divergence_count: u64,
    /// Compliance index as measured inside the session
    pub session_compliance: ComplianceScore,
    /// Session compliance minus the production baseline
    pub compliance_delta: f64,
    pub production_compliance_before: ComplianceScore,
    pub production_compliance_after: ComplianceScore,
    /// The isolation invariant: production compliance did not move during
    /// the session's lifetime
    pub production_compliance_unchanged: bool,
}
