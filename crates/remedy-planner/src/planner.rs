//! Constraint-tiered plan selection

use crate::library::CandidateSource;
use remedy_core::{CandidatePlan, ComplianceScore, ObservationSnapshot};
use remedy_gateway::RuleSet;
use std::time::{Duration, Instant};

/// Selects one plan per tick under strict H0 > H1 > H2 tiering.
pub struct LexicographicPlanner {
    source: Box<dyn CandidateSource>,
    rules: RuleSet,
    floor: ComplianceScore,
    budget: Duration,
}

impl LexicographicPlanner {
    /// Planner over the given candidate source.
    ///
    /// `rules` is the Safety Gateway's classification table, used to
    /// pre-filter candidates the gate would refuse anyway.
    #[must_use]
    pub fn new(
        source: Box<dyn CandidateSource>,
        rules: RuleSet,
        floor: ComplianceScore,
        budget: Duration,
    ) -> Self {
        Self {
            source,
            rules,
            floor,
            budget,
        }
    }

    /// Select the best H0-feasible candidate, or `None` if there is none
    /// (the control loop substitutes its safe hold action).
    ///
    /// The H0 filter is a hard partition applied strictly before any
    /// H1/H2 comparison; infeasible candidates never reach the optimizer.
    /// If the wall-clock budget runs out mid-scan, the best candidate
    /// verified so far wins.
    #[must_use]
    pub fn plan(&self, snapshot: &ObservationSnapshot, horizon: usize) -> Option<CandidatePlan> {
        let deadline = Instant::now() + self.budget;
        let candidates = self.source.generate(snapshot, horizon);
        let generated = candidates.len();

        let mut best: Option<CandidatePlan> = None;
        let mut verified = 0usize;
        for candidate in candidates {
            if self.admissible(&candidate) {
                verified += 1;
                let better = match &best {
                    Some(current) => lex_better(&candidate, current),
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    generated,
                    verified,
                    "planning budget exhausted, returning best verified candidate"
                );
                break;
            }
        }

        match &best {
            Some(plan) => tracing::debug!(
                plan = %plan.id,
                generated,
                verified,
                h1 = plan.h1_objective(),
                h2 = plan.h2_objective(),
                "plan selected"
            ),
            None => tracing::info!(generated, "no H0-feasible candidate this tick"),
        }
        best
    }

    /// H0 feasibility plus the gateway pre-filter.
    fn admissible(&self, candidate: &CandidatePlan) -> bool {
        if !candidate.is_h0_feasible(self.floor) {
            return false;
        }
        !candidate
            .steps
            .iter()
            .any(|step| self.rules.would_block(&step.action.operation))
    }
}

/// `a` beats `b` lexicographically: higher H1 wins, ties fall to H2.
fn lex_better(a: &CandidatePlan, b: &CandidatePlan) -> bool {
    match a.h1_objective().total_cmp(&b.h1_objective()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => a.h2_objective() > b.h2_objective(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ActionLibrary, ActionTemplate};
    use pretty_assertions::assert_eq;
    use remedy_core::{Action, ActionKind, MetricsSample, PlanStep};

    fn snapshot(compliance: f64) -> ObservationSnapshot {
        ObservationSnapshot::healthy(ComplianceScore::new(compliance), MetricsSample::default())
    }

    fn step(operation: &str, predicted: f64, h1: f64, h2: f64) -> PlanStep {
        PlanStep {
            action: Action::new(ActionKind::Tune, operation, "svc").with_effect(h1, h2),
            predicted_compliance: ComplianceScore::new(predicted),
        }
    }

    struct FixedSource(Vec<CandidatePlan>);

    impl CandidateSource for FixedSource {
        fn generate(&self, _snapshot: &ObservationSnapshot, _horizon: usize) -> Vec<CandidatePlan> {
            self.0.clone()
        }
    }

    fn planner_over(plans: Vec<CandidatePlan>, floor: f64) -> LexicographicPlanner {
        LexicographicPlanner::new(
            Box::new(FixedSource(plans)),
            RuleSet::builtin(),
            ComplianceScore::new(floor),
            Duration::from_millis(1_000),
        )
    }

    #[test]
    fn floor_partitions_before_optimization() {
        // Scores [98, 99, 94] against a floor of 95: exactly two survive,
        // and the 94 plan can never be selected no matter its objectives.
        let sub_floor = CandidatePlan::new(vec![step("tune a", 94.0, 100.0, 100.0)]);
        let plans = vec![
            CandidatePlan::new(vec![step("tune b", 98.0, 1.0, 0.0)]),
            CandidatePlan::new(vec![step("tune c", 99.0, 2.0, 0.0)]),
            sub_floor.clone(),
        ];
        let planner = planner_over(plans, 95.0);
        let chosen = planner.plan(&snapshot(96.0), 1).unwrap();
        assert_ne!(chosen.id, sub_floor.id);
        assert_eq!(chosen.h1_objective(), 2.0);
    }

    #[test]
    fn h1_wins_before_h2_is_considered() {
        let high_h1 = CandidatePlan::new(vec![step("tune a", 97.0, 5.0, -10.0)]);
        let high_h2 = CandidatePlan::new(vec![step("tune b", 97.0, 1.0, 100.0)]);
        let planner = planner_over(vec![high_h2, high_h1.clone()], 95.0);
        assert_eq!(planner.plan(&snapshot(96.0), 1).unwrap().id, high_h1.id);
    }

    #[test]
    fn h2_breaks_h1_ties() {
        let low_h2 = CandidatePlan::new(vec![step("tune a", 97.0, 3.0, 1.0)]);
        let high_h2 = CandidatePlan::new(vec![step("tune b", 97.0, 3.0, 9.0)]);
        let planner = planner_over(vec![low_h2, high_h2.clone()], 95.0);
        assert_eq!(planner.plan(&snapshot(96.0), 1).unwrap().id, high_h2.id);
    }

    #[test]
    fn infeasible_set_returns_none() {
        let plans = vec![
            CandidatePlan::new(vec![step("tune a", 80.0, 5.0, 5.0)]),
            CandidatePlan::new(vec![step("tune b", 90.0, 5.0, 5.0)]),
        ];
        assert!(planner_over(plans, 95.0).plan(&snapshot(85.0), 1).is_none());
    }

    #[test]
    fn gateway_blocked_operations_are_never_proposed() {
        let dangerous = CandidatePlan::new(vec![step("rm -rf /data", 99.0, 50.0, 50.0)]);
        let safe = CandidatePlan::new(vec![step("tune cache --size 512", 97.0, 1.0, 1.0)]);
        let planner = planner_over(vec![dangerous, safe.clone()], 95.0);
        assert_eq!(planner.plan(&snapshot(96.0), 1).unwrap().id, safe.id);
    }

    #[test]
    fn exhausted_budget_returns_best_verified_so_far() {
        let first = CandidatePlan::new(vec![step("tune a", 97.0, 1.0, 0.0)]);
        let better_but_unseen = CandidatePlan::new(vec![step("tune b", 97.0, 9.0, 0.0)]);
        let planner = LexicographicPlanner::new(
            Box::new(FixedSource(vec![first.clone(), better_but_unseen])),
            RuleSet::builtin(),
            ComplianceScore::new(95.0),
            Duration::ZERO,
        );
        // Zero budget: the deadline trips after the first verification.
        assert_eq!(planner.plan(&snapshot(96.0), 1).unwrap().id, first.id);
    }

    #[test]
    fn standard_library_end_to_end() {
        let planner = LexicographicPlanner::new(
            Box::new(ActionLibrary::standard()),
            RuleSet::builtin(),
            ComplianceScore::new(95.0),
            Duration::from_millis(1_000),
        );
        let plan = planner.plan(&snapshot(96.0), 2).unwrap();
        assert!(plan.is_h0_feasible(ComplianceScore::new(95.0)));
        assert!(!plan.steps.is_empty());
    }

    #[test]
    fn custom_template_below_floor_is_filtered() {
        let library = ActionLibrary::new().with_template(
            ActionTemplate::new(ActionKind::Restart, "restart service api", "api")
                .with_effect(-10.0, 50.0),
        );
        let planner = LexicographicPlanner::new(
            Box::new(library),
            RuleSet::builtin(),
            ComplianceScore::new(95.0),
            Duration::from_millis(1_000),
        );
        // 96 - 10 = 86 predicted: below the floor, nothing to select.
        assert!(planner.plan(&snapshot(96.0), 1).is_none());
    }
}
