//! Safety verdicts

use serde::{Deserialize, Serialize};

/// The gate decision for one requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Operation may execute
    Allow,
    /// High-risk but reversible; executes only with explicit confirmation
    WarnNeedsConfirmation,
    /// Operation must not execute
    Block,
}

/// How severe the matched rule considers the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    High,
    Critical,
}

/// Result of classifying one requested operation.
///
/// Verdicts are never persisted beyond the audit record they produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub decision: Verdict,
    pub severity: Severity,
    /// Human-readable reason, surfaced on every block/escalation
    pub reason: String,
}

impl SafetyVerdict {
    /// An allow verdict with the default (low) severity.
    #[must_use]
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            decision: Verdict::Allow,
            severity: Severity::Low,
            reason: reason.into(),
        }
    }

    /// A block verdict at the given severity.
    #[must_use]
    pub fn block(severity: Severity, reason: impl Into<String>) -> Self {
        Self {
            decision: Verdict::Block,
            severity,
            reason: reason.into(),
        }
    }

    /// A warn verdict requiring confirmation.
    #[must_use]
    pub fn warn(reason: impl Into<String>) -> Self {
        Self {
            decision: Verdict::WarnNeedsConfirmation,
            severity: Severity::High,
            reason: reason.into(),
        }
    }

    /// Whether the verdict admits the operation past the gate.
    #[inline]
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.decision == Verdict::Allow
    }
}
