//! Error taxonomy for the remediation control plane
//!
//! Covers:
//! - Telemetry failures (degrade, never crash the loop)
//! - Infeasible plans (fall back to safe hold)
//! - Action execution failures (rollback, retry, escalate)
//! - Attestation/integrity violations (fatal for the restore, CRITICAL alert)

use crate::types::ActionId;

/// Top-level error type for the control plane
#[derive(Debug, thiserror::Error)]
pub enum RemedyError {
    /// Telemetry could not be fetched; the snapshot degrades instead
    #[error("telemetry unavailable: {0}")]
    Telemetry(#[from] TelemetryError),

    /// No H0-feasible plan exists this tick
    #[error("plan infeasible: {0}")]
    Plan(#[from] PlanError),

    /// An action failed at the gateway or in the runner
    #[error("action execution failed: {0}")]
    Execution(#[from] ExecutionError),

    /// Snapshot or audit chain failed verification
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityError),

    /// Invalid runtime configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Autonomous execution halted; manual intervention required
    #[error("control loop paused: {reason}")]
    Paused { reason: String },

    /// Loop state machine rejected a transition
    #[error("illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

impl RemedyError {
    /// Whether the next tick can proceed without operator involvement.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            RemedyError::Telemetry(_) | RemedyError::Plan(_) => true,
            RemedyError::Execution(e) => !e.retries_exhausted(),
            RemedyError::Integrity(_) => false,
            RemedyError::Config(_) => false,
            RemedyError::Paused { .. } => false,
            RemedyError::IllegalTransition { .. } => false,
        }
    }

    /// Whether the error must surface to the operator.
    #[must_use]
    pub fn should_escalate(&self) -> bool {
        !self.is_recoverable()
    }
}

/// Telemetry-side failures. Locally recovered: the snapshot is marked
/// degraded and the tick continues.
///
/// `Display`/`Error` are implemented by hand: the `source` field names the
/// telemetry source, which collides with thiserror's implicit error-source
/// field detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    Timeout { source: String, timeout_ms: u64 },

    Stale { source: String },

    Fetch { source: String, message: String },

    NoSources,
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryError::Timeout { source, timeout_ms } => {
                write!(f, "source '{source}' timed out after {timeout_ms}ms")
            }
            TelemetryError::Stale { source } => {
                write!(f, "source '{source}' returned stale data")
            }
            TelemetryError::Fetch { source, message } => {
                write!(f, "source '{source}' failed: {message}")
            }
            TelemetryError::NoSources => write!(f, "no telemetry sources configured"),
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Planner-side failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("no candidate satisfies the H0 floor")]
    NoFeasibleCandidate,

    #[error("planning budget of {budget_ms}ms exhausted before any candidate was verified")]
    BudgetExhausted { budget_ms: u64 },
}

/// Execution-side failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("operation blocked by safety gateway: {reason}")]
    Blocked { reason: String },

    #[error("operation requires confirmation: {reason}")]
    NeedsConfirmation { reason: String },

    #[error("action {action_id} failed: {message}")]
    RunnerFailed { action_id: ActionId, message: String },

    #[error("action {action_id} failed {attempts} consecutive times; autonomous execution halted")]
    RetriesExhausted { action_id: ActionId, attempts: u32 },

    #[error("execution cancelled: compliance fell below the H0 floor")]
    WatchdogCancelled,

    #[error("irreversible step {action_id} has no attested snapshot for target '{target}'")]
    SnapshotRequired { action_id: ActionId, target: String },
}

impl ExecutionError {
    /// True once the per-action retry budget is spent.
    #[must_use]
    pub fn retries_exhausted(&self) -> bool {
        matches!(self, ExecutionError::RetriesExhausted { .. })
    }
}

/// Integrity failures. Never auto-retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("attestation mismatch for snapshot {snapshot_id}: stored digest does not match state")]
    AttestationMismatch { snapshot_id: String },

    #[error("attestation chain broken at index {index}")]
    ChainBroken { index: usize },

    #[error("audit log integrity violation")]
    AuditChainBroken,

    #[error("snapshot {snapshot_id} not found")]
    SnapshotNotFound { snapshot_id: String },
}

/// Configuration failures, raised once at startup
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("h0_floor must be within 0-100, got {0}")]
    FloorOutOfRange(f64),

    #[error("{field} must be non-zero")]
    ZeroInterval { field: &'static str },

    #[error("horizon must be at least 1")]
    EmptyHorizon,

    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_errors_are_recoverable() {
        let err = RemedyError::from(TelemetryError::Timeout {
            source: "latency".into(),
            timeout_ms: 250,
        });
        assert!(err.is_recoverable());
        assert!(!err.should_escalate());
    }

    #[test]
    fn integrity_errors_escalate() {
        let err = RemedyError::from(IntegrityError::AttestationMismatch {
            snapshot_id: "snap-1".into(),
        });
        assert!(!err.is_recoverable());
        assert!(err.should_escalate());
    }

    #[test]
    fn exhausted_retries_escalate() {
        let err = RemedyError::from(ExecutionError::RetriesExhausted {
            action_id: ActionId::new(),
            attempts: 3,
        });
        assert!(err.should_escalate());

        let err = RemedyError::from(ExecutionError::Blocked {
            reason: "destructive operation".into(),
        });
        assert!(err.is_recoverable());
    }
}
