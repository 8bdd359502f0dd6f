//! Execute phase
//!
//! Dispatches the chosen plan's actions sequentially through the Safety
//! Gateway. Cancellation is cooperative: the watchdog flag is checked
//! between steps, never mid-action. Irreversible steps execute only after
//! a snapshot of their target has been captured and attested this tick. A
//! failed step triggers restore-to-latest-snapshot and is retried next
//! tick; repeated failures of the same action escalate.

use dashmap::DashMap;
use remedy_core::error::ExecutionError;
use remedy_core::{CandidatePlan, PlanOutcome};
use remedy_gateway::{GatewayError, OperationContext, OperationRunner, SafetyGateway};
use remedy_rollback::RollbackManager;
use std::sync::Arc;
use tokio::sync::watch;

/// What one Execute phase did.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub outcome: PlanOutcome,
    pub steps_completed: usize,
    /// The failure that stopped the plan, if any
    pub error: Option<ExecutionError>,
    /// True once an action's retry budget is exhausted; the loop pauses
    pub escalate: bool,
}

/// Executes plans through the gateway with rollback protection.
pub struct PlanExecutor {
    gateway: Arc<SafetyGateway>,
    rollback: Arc<RollbackManager>,
    runner: Arc<dyn OperationRunner>,
    /// Consecutive-failure counts, keyed by operation + target
    failures: DashMap<String, u32>,
    max_failures: u32,
}

impl PlanExecutor {
    /// Executor wired to the gateway, rollback manager and side-effect
    /// runner.
    #[must_use]
    pub fn new(
        gateway: Arc<SafetyGateway>,
        rollback: Arc<RollbackManager>,
        runner: Arc<dyn OperationRunner>,
        max_failures: u32,
    ) -> Self {
        Self {
            gateway,
            rollback,
            runner,
            failures: DashMap::new(),
            max_failures: max_failures.max(1),
        }
    }

    /// Forget the consecutive-failure history. Called on manual resume.
    pub fn reset_failures(&self) {
        self.failures.clear();
    }

    /// Run the plan's steps in order until completion, failure, or
    /// watchdog cancellation.
    pub async fn execute_plan(
        &self,
        plan: &CandidatePlan,
        cancel: &watch::Receiver<bool>,
    ) -> ExecutionReport {
        let context = OperationContext::new("control-loop");
        let mut completed = 0usize;

        for step in &plan.steps {
            // Cooperative cancellation point, between actions only.
            if *cancel.borrow() {
                tracing::warn!(
                    plan = %plan.id,
                    completed,
                    "watchdog requested cancellation; aborting remaining steps"
                );
                return ExecutionReport {
                    outcome: PlanOutcome::Aborted,
                    steps_completed: completed,
                    error: Some(ExecutionError::WatchdogCancelled),
                    escalate: false,
                };
            }

            let action = &step.action;
            if action.irreversible {
                if let Err(err) = self.rollback.snapshot(&action.target).await {
                    tracing::error!(
                        action = %action.id,
                        target = %action.target,
                        error = %err,
                        "snapshot before irreversible step failed; aborting plan"
                    );
                    return ExecutionReport {
                        outcome: PlanOutcome::Failed,
                        steps_completed: completed,
                        error: Some(ExecutionError::SnapshotRequired {
                            action_id: action.id,
                            target: action.target.clone(),
                        }),
                        escalate: false,
                    };
                }
            }

            match self
                .gateway
                .execute(&action.operation, &context, self.runner.as_ref())
                .await
            {
                Ok(()) => {
                    completed += 1;
                    self.failures.remove(&failure_key(action));
                }
                Err(err) => {
                    return self.handle_step_failure(plan, action, completed, err).await;
                }
            }
        }

        ExecutionReport {
            outcome: PlanOutcome::Succeeded,
            steps_completed: completed,
            error: None,
            escalate: false,
        }
    }

    async fn handle_step_failure(
        &self,
        plan: &CandidatePlan,
        action: &remedy_core::Action,
        completed: usize,
        err: GatewayError,
    ) -> ExecutionReport {
        let key = failure_key(action);
        let attempts = {
            let mut entry = self.failures.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };

        let error = match err {
            GatewayError::Blocked { reason, .. } => ExecutionError::Blocked { reason },
            GatewayError::NeedsConfirmation { reason } => {
                ExecutionError::NeedsConfirmation { reason }
            }
            GatewayError::Runner(message) => ExecutionError::RunnerFailed {
                action_id: action.id,
                message,
            },
        };
        tracing::warn!(
            plan = %plan.id,
            action = %action.id,
            attempts,
            error = %error,
            "plan step failed; aborting remaining steps"
        );

        // Undo what we can before the retry next tick.
        if let Some(snapshot) = self.rollback.latest(&action.target) {
            if let Err(restore_err) = self.rollback.restore(snapshot.id).await {
                tracing::error!(
                    target = %action.target,
                    error = %restore_err,
                    "rollback after failed step did not complete"
                );
            }
        }

        if attempts >= self.max_failures {
            tracing::error!(
                action = %action.id,
                attempts,
                "action exhausted its retry budget; escalating to Paused"
            );
            return ExecutionReport {
                outcome: PlanOutcome::Failed,
                steps_completed: completed,
                error: Some(ExecutionError::RetriesExhausted {
                    action_id: action.id,
                    attempts,
                }),
                escalate: true,
            };
        }

        ExecutionReport {
            outcome: PlanOutcome::Failed,
            steps_completed: completed,
            error: Some(error),
            escalate: false,
        }
    }
}

/// Retried actions come from fresh plan instances each tick, so failure
/// counting keys on what the action does, not its per-tick id.
fn failure_key(action: &remedy_core::Action) -> String {
    format!("{}@{}", action.operation, action.target)
}
