//! Core types for the remediation control plane
//!
//! Defines the fundamental types shared across the workspace:
//! - The compliance index and observation snapshots
//! - Constraint tiers
//! - Actions, plans and their predicted effects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Unique action identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    /// Generate new action ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique candidate-plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    /// Generate new plan ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite 0-100 safety/quality index (the Ihsan index).
///
/// This is the H0 gating signal: the control plane compares it against the
/// configured hard floor before anything else is considered.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplianceScore(f64);

impl ComplianceScore {
    /// Construct a score, clamping into the valid 0-100 range.
    #[inline]
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 100.0))
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether the score satisfies the given hard floor.
    #[inline]
    #[must_use]
    pub fn meets_floor(self, floor: ComplianceScore) -> bool {
        self.0 >= floor.0
    }

    /// Apply a predicted delta, clamping the result.
    #[inline]
    #[must_use]
    pub fn apply_delta(self, delta: f64) -> Self {
        Self::new(self.0 + delta)
    }
}

impl std::fmt::Display for ComplianceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Raw service metrics carried by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// p95 request latency in milliseconds
    pub latency_ms: f64,
    /// Requests per second
    pub throughput_rps: f64,
    /// Fraction of requests failing, 0.0-1.0
    pub error_rate: f64,
}

impl Default for MetricsSample {
    fn default() -> Self {
        Self {
            latency_ms: 0.0,
            throughput_rps: 0.0,
            error_rate: 0.0,
        }
    }
}

/// Immutable per-tick bundle of observed metrics plus the compliance index.
///
/// `degraded` is set when any telemetry source was missing or stale; the
/// sources that failed are listed in `stale_sources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSnapshot {
    /// When the snapshot was assembled
    pub observed_at: DateTime<Utc>,
    /// Raw service metrics
    pub metrics: MetricsSample,
    /// Composite compliance index
    pub compliance: ComplianceScore,
    /// True when any source was missing or stale
    pub degraded: bool,
    /// Names of sources that failed or timed out this tick
    pub stale_sources: Vec<String>,
}

impl ObservationSnapshot {
    /// Construct a healthy (non-degraded) snapshot.
    #[must_use]
    pub fn healthy(compliance: ComplianceScore, metrics: MetricsSample) -> Self {
        Self {
            observed_at: Utc::now(),
            metrics,
            compliance,
            degraded: false,
            stale_sources: Vec::new(),
        }
    }

    /// Construct a degraded snapshot naming the failed sources.
    #[must_use]
    pub fn degraded(
        compliance: ComplianceScore,
        metrics: MetricsSample,
        stale_sources: Vec<String>,
    ) -> Self {
        Self {
            observed_at: Utc::now(),
            metrics,
            compliance,
            degraded: true,
            stale_sources,
        }
    }
}

/// Bounded history of snapshots retained for trend analysis.
///
/// Oldest entries are evicted once capacity is reached.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    entries: VecDeque<ObservationSnapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    /// Create a history retaining at most `capacity` snapshots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Record a snapshot, evicting the oldest if at capacity.
    pub fn push(&mut self, snapshot: ObservationSnapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Most recent snapshot
    #[must_use]
    pub fn latest(&self) -> Option<&ObservationSnapshot> {
        self.entries.back()
    }

    /// Number of retained snapshots
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Average compliance delta per tick over the retained window.
    ///
    /// Positive means the service is recovering, negative means it is
    /// degrading. Returns 0.0 with fewer than two samples.
    #[must_use]
    pub fn compliance_trend(&self) -> f64 {
        if self.entries.len() < 2 {
            return 0.0;
        }
        let first = self.entries.front().map(|s| s.compliance.value()).unwrap_or(0.0);
        let last = self.entries.back().map(|s| s.compliance.value()).unwrap_or(0.0);
        (last - first) / (self.entries.len() - 1) as f64
    }
}

/// Constraint tiers, highest priority first.
///
/// H0 is the non-negotiable safety floor and is evaluated and enforced
/// before H1/H2 are ever compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintTier {
    /// Hard safety floor (e.g. compliance >= 95)
    H0,
    /// Soft preference
    H1,
    /// Performance objective
    H2,
}

impl ConstraintTier {
    /// Priority rank, 0 = highest.
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            ConstraintTier::H0 => 0,
            ConstraintTier::H1 => 1,
            ConstraintTier::H2 => 2,
        }
    }
}

/// What kind of remediation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Deliberate no-op: hold current state because nothing safe can be done
    SafeHold,
    /// Adjust a runtime parameter (cache size, timeout, pool size)
    Tune,
    /// Add or remove capacity
    Scale,
    /// Restart a component
    Restart,
    /// Revert a deploy to the previous version
    RollbackDeploy,
}

/// Predicted effect model attached to every action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedEffect {
    /// Expected change to the compliance index
    pub compliance_delta: f64,
    /// Expected change to the performance objective (positive = better)
    pub performance_delta: f64,
}

impl PredictedEffect {
    /// Effect model that changes nothing.
    #[inline]
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            compliance_delta: 0.0,
            performance_delta: 0.0,
        }
    }
}

/// Atomic remediation operation.
///
/// `operation` is the concrete command text submitted to the Safety Gateway;
/// `idempotency_key` lets a retried action be deduplicated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub kind: ActionKind,
    /// Concrete operation text, classified by the gateway before execution
    pub operation: String,
    /// What the operation acts on (service, deployment, config key)
    pub target: String,
    pub idempotency_key: String,
    /// Irreversible steps require an attested snapshot before execution
    pub irreversible: bool,
    pub predicted: PredictedEffect,
}

impl Action {
    /// Construct an action with a fresh id and derived idempotency key.
    #[must_use]
    pub fn new(kind: ActionKind, operation: impl Into<String>, target: impl Into<String>) -> Self {
        let id = ActionId::new();
        let operation = operation.into();
        let target = target.into();
        Self {
            id,
            kind,
            idempotency_key: format!("{}:{}", id, target),
            operation,
            target,
            irreversible: false,
            predicted: PredictedEffect::neutral(),
        }
    }

    /// Mark the action irreversible.
    #[inline]
    #[must_use]
    pub fn irreversible(mut self) -> Self {
        self.irreversible = true;
        self
    }

    /// Attach a predicted effect model.
    #[inline]
    #[must_use]
    pub fn with_effect(mut self, compliance_delta: f64, performance_delta: f64) -> Self {
        self.predicted = PredictedEffect {
            compliance_delta,
            performance_delta,
        };
        self
    }

    /// The deliberate no-op hold action the control loop falls back to when
    /// no plan is feasible or the snapshot is degraded.
    #[must_use]
    pub fn safe_hold() -> Self {
        Self::new(ActionKind::SafeHold, "hold --steady", "control-plane")
    }
}

/// One step of a candidate plan, carrying its own predicted compliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: Action,
    /// Compliance index predicted to hold after this step executes
    pub predicted_compliance: ComplianceScore,
}

/// Ordered sequence of actions over a fixed horizon.
///
/// Plans are created by the planner each tick and discarded after the tick
/// unless selected and executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePlan {
    pub id: PlanId,
    pub steps: Vec<PlanStep>,
    pub horizon: usize,
}

impl CandidatePlan {
    /// Build a plan from steps; horizon is the step count.
    #[must_use]
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            id: PlanId::new(),
            horizon: steps.len(),
            steps,
        }
    }

    /// A plan is H0-feasible iff every step's predicted compliance meets
    /// the floor.
    #[must_use]
    pub fn is_h0_feasible(&self, floor: ComplianceScore) -> bool {
        self.steps
            .iter()
            .all(|s| s.predicted_compliance.meets_floor(floor))
    }

    /// H1 objective: total predicted compliance improvement.
    #[must_use]
    pub fn h1_objective(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.action.predicted.compliance_delta)
            .sum()
    }

    /// H2 objective: total predicted performance improvement.
    #[must_use]
    pub fn h2_objective(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| s.action.predicted.performance_delta)
            .sum()
    }

    /// Whether any step is flagged irreversible.
    #[must_use]
    pub fn has_irreversible_step(&self) -> bool {
        self.steps.iter().any(|s| s.action.irreversible)
    }
}

/// Outcome of executing a chosen plan, recorded into the knowledge store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
    /// All steps executed
    Succeeded,
    /// A step failed at the gateway or in the runner
    Failed,
    /// Remaining steps were cancelled by the watchdog or shutdown
    Aborted,
}
