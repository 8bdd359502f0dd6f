//! Operator-facing safety report
//!
//! Assembled on demand; a dashboard or CLI collaborator renders it.

use crate::audit::AuditRecord;
use crate::metrics::MetricsTotals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate safety posture for the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    pub generated_at: DateTime<Utc>,
    pub totals: MetricsTotals,
    pub safety_rate: f64,
    /// Most recent audit records, oldest first
    pub recent_records: Vec<AuditRecord>,
    /// Most frequently blocked operations, descending by count
    pub top_blocked: Vec<(String, u64)>,
}

impl SafetyReport {
    /// Assemble a report from the gateway's current state.
    #[must_use]
    pub fn assemble(
        totals: MetricsTotals,
        recent_records: Vec<AuditRecord>,
        top_blocked: Vec<(String, u64)>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            safety_rate: totals.safety_rate(),
            totals,
            recent_records,
            top_blocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_for_external_sinks() {
        let report = SafetyReport::assemble(
            MetricsTotals {
                total_ops: 3,
                blocked_ops: 1,
                successful_ops: 2,
            },
            Vec::new(),
            vec![("rm -rf /data".to_string(), 1)],
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("safety_rate"));
        assert!(json.contains("rm -rf /data"));
    }
}
