//! End-to-end ticks through the wired control loop.

use remedy_core::{
    Action, ActionKind, CandidatePlan, ComplianceScore, ObservationSnapshot, PlanOutcome, PlanStep,
    RemedyConfig,
};
use pretty_assertions::assert_eq;
use remedy_gateway::{OperationContext, OperationRunner};
use remedy_kernel::{ControlLoopBuilder, LoopState};
use remedy_planner::CandidateSource;
use remedy_rollback::InMemoryStateStore;
use remedy_test_utils::{HangingTelemetry, RecordingRunner, ScriptedTelemetry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct FailAllRunner;

#[async_trait::async_trait]
impl OperationRunner for FailAllRunner {
    async fn run(&self, operation: &str, _context: &OperationContext) -> Result<(), String> {
        Err(format!("actuator unavailable for {operation}"))
    }
}

struct SlowRunner {
    delay: Duration,
}

#[async_trait::async_trait]
impl OperationRunner for SlowRunner {
    async fn run(&self, _operation: &str, _context: &OperationContext) -> Result<(), String> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Always proposes the same two reversible tuning steps.
struct TwoStepSource;

impl CandidateSource for TwoStepSource {
    fn generate(&self, snapshot: &ObservationSnapshot, _horizon: usize) -> Vec<CandidatePlan> {
        let first = snapshot.compliance.apply_delta(1.0);
        let second = first.apply_delta(1.0);
        vec![CandidatePlan::new(vec![
            PlanStep {
                action: Action::new(ActionKind::Tune, "tune cache --size 512", "cache")
                    .with_effect(1.0, 2.0),
                predicted_compliance: first,
            },
            PlanStep {
                action: Action::new(ActionKind::Tune, "tune gc --interval 30", "cache")
                    .with_effect(1.0, 1.0),
                predicted_compliance: second,
            },
        ])]
    }
}

/// Single irreversible step, as a deploy revert would be.
struct IrreversibleSource;

impl CandidateSource for IrreversibleSource {
    fn generate(&self, snapshot: &ObservationSnapshot, _horizon: usize) -> Vec<CandidatePlan> {
        vec![CandidatePlan::new(vec![PlanStep {
            action: Action::new(ActionKind::RollbackDeploy, "deploy revert --to-previous", "api")
                .with_effect(4.0, -2.0)
                .irreversible(),
            predicted_compliance: snapshot.compliance.apply_delta(4.0),
        }])]
    }
}

#[tokio::test]
async fn healthy_tick_plans_and_executes() {
    let runner = Arc::new(RecordingRunner::new());
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(ScriptedTelemetry::new("compliance", [98.0])))
        .with_runner(runner.clone())
        .build();

    let report = control.tick().await.unwrap();

    assert!(!report.held, "healthy telemetry must not force a hold");
    assert_eq!(report.execution.outcome, PlanOutcome::Succeeded);
    assert!(!runner.executed().is_empty());
    assert_eq!(report.state_after, LoopState::Idle);

    // Every admitted operation is accounted for by the gateway.
    let totals = control.gateway().metrics().totals();
    assert_eq!(totals.blocked_ops + totals.successful_ops, totals.total_ops);
    assert!(control.gateway().audit().verify_integrity().is_ok());
}

#[tokio::test(start_paused = true)]
async fn degraded_telemetry_short_circuits_to_safe_hold() {
    let runner = Arc::new(RecordingRunner::new());
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(HangingTelemetry::new("latency")))
        .with_runner(runner.clone())
        .build();

    let report = control.tick().await.unwrap();

    assert!(report.held);
    assert!(report.hold_reason.unwrap().contains("degraded"));
    assert_eq!(report.planned_operations, vec!["hold --steady".to_string()]);
    // The hold itself still flows through the gateway and the runner.
    assert_eq!(runner.executed(), vec!["hold --steady".to_string()]);
}

#[tokio::test]
async fn sub_floor_compliance_forces_safe_hold() {
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(ScriptedTelemetry::new("compliance", [90.0])))
        .build();

    let report = control.tick().await.unwrap();

    assert!(report.held);
    assert!(report.hold_reason.unwrap().contains("below H0 floor"));
    assert_eq!(report.execution.outcome, PlanOutcome::Succeeded);
}

#[tokio::test]
async fn repeated_failures_pause_the_loop_until_resume() {
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(ScriptedTelemetry::new("compliance", [98.0])))
        .with_runner(Arc::new(FailAllRunner))
        .with_candidate_source(Box::new(TwoStepSource))
        .build();

    // The same action fails on three consecutive ticks.
    for attempt in 0..2 {
        let report = control.tick().await.unwrap();
        assert_eq!(report.execution.outcome, PlanOutcome::Failed, "attempt {attempt}");
        assert!(!report.execution.escalate);
        assert_eq!(report.state_after, LoopState::Idle);
    }
    let report = control.tick().await.unwrap();
    assert!(report.execution.escalate);
    assert_eq!(report.state_after, LoopState::Paused);

    // Paused means no autonomous ticks until an operator intervenes.
    assert!(control.tick().await.is_err());
    control.resume().unwrap();
    assert_eq!(control.state(), LoopState::Idle);
    assert!(control.tick().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn watchdog_cancels_between_steps_on_floor_violation() {
    // Monitor sees 98 at tick start; the watchdog's next poll sees 80.
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(ScriptedTelemetry::new("compliance", [98.0, 80.0])))
        .with_runner(Arc::new(SlowRunner {
            delay: Duration::from_secs(10),
        }))
        .with_candidate_source(Box::new(TwoStepSource))
        .build();

    let report = control.tick().await.unwrap();

    assert_eq!(report.execution.outcome, PlanOutcome::Aborted);
    assert_eq!(report.execution.steps_completed, 1);
    assert!(matches!(
        report.execution.error,
        Some(remedy_core::error::ExecutionError::WatchdogCancelled)
    ));
    // Cancellation is not a failure; the loop stays autonomous.
    assert_eq!(report.state_after, LoopState::Idle);
}

#[tokio::test]
async fn irreversible_step_snapshots_and_extends_attestation_chain() {
    let store = Arc::new(InMemoryStateStore::new());
    store.seed("api", json!({"deployment": "v42", "replicas": 3}));
    let runner = Arc::new(RecordingRunner::new());
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(ScriptedTelemetry::new("compliance", [96.0])))
        .with_runner(runner.clone())
        .with_state_store(store)
        .with_candidate_source(Box::new(IrreversibleSource))
        .build();

    let report = control.tick().await.unwrap();

    assert!(!report.held, "a clean shadow trial must not forfeit the plan");
    assert_eq!(report.execution.outcome, PlanOutcome::Succeeded);
    assert_eq!(
        runner.executed(),
        vec!["deploy revert --to-previous".to_string()]
    );
    assert_eq!(control.rollback().attestation_export().len(), 1);
    assert!(control.rollback().verify_chain().is_ok());
}

#[tokio::test]
async fn knowledge_confidence_tracks_plan_outcomes() {
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(ScriptedTelemetry::new("compliance", [98.0])))
        .with_candidate_source(Box::new(TwoStepSource))
        .build();

    let neutral = control.knowledge().confidence("tune cache --size 512");
    assert!((neutral - 0.5).abs() < f64::EPSILON);

    control.tick().await.unwrap();
    control.tick().await.unwrap();

    assert!(control.knowledge().confidence("tune cache --size 512") > 0.5);
}

#[tokio::test]
async fn run_loop_shuts_down_on_signal() {
    let mut control = ControlLoopBuilder::new(RemedyConfig::default())
        .with_source(Arc::new(ScriptedTelemetry::new("compliance", [98.0])))
        .build();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    shutdown_tx.send(true).unwrap();
    control.run(shutdown_rx).await;

    assert_eq!(control.state(), LoopState::ShutDown);
}
