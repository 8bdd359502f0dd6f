//! Analyze phase
//!
//! Derives the tick's feasibility verdict from the fresh snapshot and the
//! bounded history. A degraded snapshot or a
//! compliance index below the H0 floor short-circuits the tick straight to
//! the safe hold action; planning never runs on unverifiable input.

use remedy_core::{ComplianceScore, ObservationSnapshot, SnapshotHistory};

/// What Analyze concluded about this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Whether planning may run at all
    pub feasible: bool,
    /// Why the tick short-circuits, when it does
    pub hold_reason: Option<String>,
    /// Average compliance delta per tick over the retained history
    pub trend: f64,
}

/// Stateless analyzer parameterized by the H0 floor.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    floor: ComplianceScore,
}

impl Analyzer {
    /// Analyzer for the given floor.
    #[must_use]
    pub fn new(floor: ComplianceScore) -> Self {
        Self { floor }
    }

    /// Analyze the fresh snapshot.
    #[must_use]
    pub fn analyze(&self, snapshot: &ObservationSnapshot, history: &SnapshotHistory) -> Analysis {
        let trend = history.compliance_trend();

        if snapshot.degraded {
            return Analysis {
                feasible: false,
                hold_reason: Some(format!(
                    "degraded snapshot (stale: {})",
                    snapshot.stale_sources.join(", ")
                )),
                trend,
            };
        }
        if !snapshot.compliance.meets_floor(self.floor) {
            return Analysis {
                feasible: false,
                hold_reason: Some(format!(
                    "compliance {} below H0 floor {}",
                    snapshot.compliance, self.floor
                )),
                trend,
            };
        }
        Analysis {
            feasible: true,
            hold_reason: None,
            trend,
        }
    }
}
