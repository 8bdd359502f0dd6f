//! Knowledge store
//!
//! Per-operation outcome statistics recorded after every Execute phase and
//! consumed by the next Analyze for confidence weighting.

use dashmap::DashMap;
use remedy_core::{CandidatePlan, PlanOutcome};
use serde::{Deserialize, Serialize};

/// Lifetime outcome counts for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub succeeded: u64,
    pub failed: u64,
    pub aborted: u64,
}

impl OutcomeStats {
    /// Laplace-smoothed success estimate; 0.5 with no history.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        let total = self.succeeded + self.failed + self.aborted;
        (self.succeeded + 1) as f64 / (total + 2) as f64
    }
}

/// Shared outcome memory, keyed by operation text.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    stats: DashMap<String, OutcomeStats>,
}

impl KnowledgeStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome for an operation.
    pub fn record(&self, operation: &str, outcome: PlanOutcome) {
        let mut stats = self.stats.entry(operation.to_string()).or_default();
        match outcome {
            PlanOutcome::Succeeded => stats.succeeded += 1,
            PlanOutcome::Failed => stats.failed += 1,
            PlanOutcome::Aborted => stats.aborted += 1,
        }
    }

    /// Record a plan's outcome against each of its steps.
    pub fn record_plan(&self, plan: &CandidatePlan, outcome: PlanOutcome) {
        for step in &plan.steps {
            self.record(&step.action.operation, outcome);
        }
    }

    /// Stats for one operation, if any history exists.
    #[must_use]
    pub fn stats(&self, operation: &str) -> Option<OutcomeStats> {
        self.stats.get(operation).map(|s| *s)
    }

    /// Confidence for an operation; 0.5 with no history.
    #[must_use]
    pub fn confidence(&self, operation: &str) -> f64 {
        self.stats(operation).unwrap_or_default().confidence()
    }

    /// Mean confidence across a plan's steps.
    #[must_use]
    pub fn plan_confidence(&self, plan: &CandidatePlan) -> f64 {
        if plan.steps.is_empty() {
            return 0.5;
        }
        let sum: f64 = plan
            .steps
            .iter()
            .map(|s| self.confidence(&s.action.operation))
            .sum();
        sum / plan.steps.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_starts_neutral_and_moves_with_outcomes() {
        let store = KnowledgeStore::new();
        assert_eq!(store.confidence("restart service api"), 0.5);

        for _ in 0..8 {
            store.record("restart service api", PlanOutcome::Succeeded);
        }
        assert!(store.confidence("restart service api") > 0.8);

        for _ in 0..20 {
            store.record("restart service api", PlanOutcome::Failed);
        }
        assert!(store.confidence("restart service api") < 0.5);
    }

    #[test]
    fn aborted_counts_against_confidence() {
        let store = KnowledgeStore::new();
        store.record("tune cache --size 512", PlanOutcome::Aborted);
        let stats = store.stats("tune cache --size 512").unwrap();
        assert_eq!(stats.aborted, 1);
        assert!(stats.confidence() < 0.5);
    }
}
