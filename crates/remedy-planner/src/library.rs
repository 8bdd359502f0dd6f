//! Candidate generation
//!
//! The generation algorithm is pluggable; the default [`ActionLibrary`]
//! enumerates bounded plan sequences over a fixed set of remediation
//! templates, predicting each step's compliance from the snapshot.

use remedy_core::{Action, ActionKind, CandidatePlan, ObservationSnapshot, PlanStep};

/// Pluggable candidate-plan generator.
pub trait CandidateSource: Send + Sync {
    /// Generate a bounded candidate set for the current snapshot.
    fn generate(&self, snapshot: &ObservationSnapshot, horizon: usize) -> Vec<CandidatePlan>;
}

/// One remediation the library knows how to propose.
#[derive(Debug, Clone)]
pub struct ActionTemplate {
    pub kind: ActionKind,
    pub operation: String,
    pub target: String,
    /// Expected change to the compliance index per application
    pub compliance_delta: f64,
    /// Expected change to the performance objective per application
    pub performance_delta: f64,
    pub irreversible: bool,
}

impl ActionTemplate {
    /// Template with a neutral effect model.
    #[must_use]
    pub fn new(kind: ActionKind, operation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            target: target.into(),
            compliance_delta: 0.0,
            performance_delta: 0.0,
            irreversible: false,
        }
    }

    /// Attach a predicted effect.
    #[inline]
    #[must_use]
    pub fn with_effect(mut self, compliance_delta: f64, performance_delta: f64) -> Self {
        self.compliance_delta = compliance_delta;
        self.performance_delta = performance_delta;
        self
    }

    /// Mark applications of this template irreversible.
    #[inline]
    #[must_use]
    pub fn irreversible(mut self) -> Self {
        self.irreversible = true;
        self
    }

    fn instantiate(&self) -> Action {
        let action = Action::new(self.kind, self.operation.clone(), self.target.clone())
            .with_effect(self.compliance_delta, self.performance_delta);
        if self.irreversible {
            action.irreversible()
        } else {
            action
        }
    }
}

/// Fixed-library enumeration over single steps and ordered pairs.
///
/// The candidate count stays bounded at `n + n*(n-1)` for `n` templates,
/// comfortably inside the planner's sub-second budget.
#[derive(Debug, Clone, Default)]
pub struct ActionLibrary {
    templates: Vec<ActionTemplate>,
}

impl ActionLibrary {
    /// Empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with the standard remediation set.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            templates: vec![
                ActionTemplate::new(ActionKind::Tune, "tune cache --size 512", "cache")
                    .with_effect(1.0, 3.0),
                ActionTemplate::new(ActionKind::Scale, "scale workers --to 8", "worker-pool")
                    .with_effect(2.0, 5.0),
                ActionTemplate::new(ActionKind::Restart, "restart service api", "api")
                    .with_effect(3.0, -1.0),
                ActionTemplate::new(
                    ActionKind::RollbackDeploy,
                    "deploy revert --to-previous",
                    "api",
                )
                .with_effect(4.0, -2.0)
                .irreversible(),
            ],
        }
    }

    /// Add a template.
    #[must_use]
    pub fn with_template(mut self, template: ActionTemplate) -> Self {
        self.templates.push(template);
        self
    }

    fn plan_from(&self, snapshot: &ObservationSnapshot, sequence: &[&ActionTemplate]) -> CandidatePlan {
        let mut running = snapshot.compliance;
        let steps = sequence
            .iter()
            .map(|template| {
                running = running.apply_delta(template.compliance_delta);
                PlanStep {
                    action: template.instantiate(),
                    predicted_compliance: running,
                }
            })
            .collect();
        CandidatePlan::new(steps)
    }
}

impl CandidateSource for ActionLibrary {
    fn generate(&self, snapshot: &ObservationSnapshot, horizon: usize) -> Vec<CandidatePlan> {
        let mut candidates = Vec::new();
        for first in &self.templates {
            candidates.push(self.plan_from(snapshot, &[first]));
            if horizon < 2 {
                continue;
            }
            for second in &self.templates {
                if std::ptr::eq(first, second) {
                    continue;
                }
                candidates.push(self.plan_from(snapshot, &[first, second]));
            }
        }
        candidates
    }
}
