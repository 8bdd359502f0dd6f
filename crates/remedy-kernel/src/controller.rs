//! The control loop
//!
//! One instance runs on a fixed-interval ticker; iterations are
//! serialized. Each tick walks Monitor -> Analyze -> Plan -> Execute ->
//! Knowledge-update through the loop state machine, preferring inaction
//! (the safe hold) over anything unverifiable.

use crate::analyze::Analyzer;
use crate::execute::{ExecutionReport, PlanExecutor};
use crate::knowledge::KnowledgeStore;
use crate::monitor::Monitor;
use crate::state::{validate_transition, LoopState};
use parking_lot::RwLock;
use remedy_core::{
    Action, CandidatePlan, ComplianceScore, ObservationSnapshot, PlanId, PlanStep, RemedyConfig,
    RemedyError, SnapshotHistory, TelemetrySource,
};
use remedy_gateway::{OperationContext, OperationRunner, SafetyGateway};
use remedy_planner::{ActionLibrary, CandidateSource, LexicographicPlanner};
use remedy_rollback::{InMemoryStateStore, RollbackManager, StateStore};
use remedy_shadow::{ComplianceProbe, ShadowConfig, ShadowHarness};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Plans whose historical success confidence falls below this are held.
/// Fresh operations start at 0.5; consecutive-failure escalation fires
/// before this gate can, so it only catches long-run repeat offenders.
const MIN_PLAN_CONFIDENCE: f64 = 0.2;

/// Runner that logs admitted operations without real side effects.
///
/// The default wiring for demos and the binary; production deployments
/// supply a real actuator.
pub struct LoggingRunner;

#[async_trait::async_trait]
impl OperationRunner for LoggingRunner {
    async fn run(&self, operation: &str, context: &OperationContext) -> Result<(), String> {
        tracing::info!(operation, caller = %context.caller, "executing remediation");
        Ok(())
    }
}

/// What one tick did, for tests and operator logs.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub snapshot: ObservationSnapshot,
    pub plan_id: PlanId,
    pub planned_operations: Vec<String>,
    /// True when the tick fell back to the safe hold
    pub held: bool,
    pub hold_reason: Option<String>,
    pub execution: ExecutionReport,
    pub state_after: LoopState,
}

/// Builder for a wired control loop.
pub struct ControlLoopBuilder {
    config: RemedyConfig,
    sources: Vec<Arc<dyn TelemetrySource>>,
    runner: Arc<dyn OperationRunner>,
    state_store: Arc<dyn StateStore>,
    candidate_source: Option<Box<dyn CandidateSource>>,
    enable_shadow: bool,
}

impl ControlLoopBuilder {
    /// Start from a validated configuration.
    #[must_use]
    pub fn new(config: RemedyConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            runner: Arc::new(LoggingRunner),
            state_store: Arc::new(InMemoryStateStore::new()),
            candidate_source: None,
            enable_shadow: true,
        }
    }

    /// Add a telemetry source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn TelemetrySource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Replace the side-effect runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn OperationRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the rollback storage backend.
    #[must_use]
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = store;
        self
    }

    /// Replace the candidate generator (default: the standard library).
    #[must_use]
    pub fn with_candidate_source(mut self, source: Box<dyn CandidateSource>) -> Self {
        self.candidate_source = Some(source);
        self
    }

    /// Disable shadow trials for irreversible plans.
    #[must_use]
    pub fn without_shadow(mut self) -> Self {
        self.enable_shadow = false;
        self
    }

    /// Wire everything together.
    #[must_use]
    pub fn build(self) -> ControlLoop {
        let gateway = Arc::new(SafetyGateway::new());
        let floor = self.config.floor();
        let monitor = Arc::new(Monitor::new(
            self.sources,
            self.config.telemetry_timeout(),
        ));
        let planner = LexicographicPlanner::new(
            self.candidate_source
                .unwrap_or_else(|| Box::new(ActionLibrary::standard())),
            gateway.rules().clone(),
            floor,
            self.config.planner_budget(),
        );
        let rollback = Arc::new(RollbackManager::new(
            self.state_store,
            self.config.snapshot_retention,
        ));
        let executor = PlanExecutor::new(
            gateway.clone(),
            rollback.clone(),
            self.runner,
            self.config.max_action_failures,
        );
        let current_compliance = Arc::new(RwLock::new(ComplianceScore::new(100.0)));
        let shadow = self.enable_shadow.then(|| {
            let probe = current_compliance.clone();
            let probe: Arc<dyn ComplianceProbe> = Arc::new(move || *probe.read());
            Arc::new(ShadowHarness::new(probe))
        });

        ControlLoop {
            history: SnapshotHistory::new(self.config.snapshot_history),
            config: self.config,
            state: LoopState::Idle,
            monitor,
            analyzer: Analyzer::new(floor),
            planner,
            executor,
            gateway,
            rollback,
            shadow,
            knowledge: Arc::new(KnowledgeStore::new()),
            current_compliance,
        }
    }
}

/// The MAPE-K control loop.
pub struct ControlLoop {
    config: RemedyConfig,
    state: LoopState,
    monitor: Arc<Monitor>,
    analyzer: Analyzer,
    planner: LexicographicPlanner,
    executor: PlanExecutor,
    gateway: Arc<SafetyGateway>,
    rollback: Arc<RollbackManager>,
    shadow: Option<Arc<ShadowHarness>>,
    knowledge: Arc<KnowledgeStore>,
    history: SnapshotHistory,
    /// Latest production compliance, shared read-only with shadow probes
    current_compliance: Arc<RwLock<ComplianceScore>>,
}

impl ControlLoop {
    /// Run one serialized tick.
    pub async fn tick(&mut self) -> Result<TickReport, RemedyError> {
        if self.state == LoopState::Paused {
            return Err(RemedyError::Paused {
                reason: "autonomous execution halted; call resume() after intervention".into(),
            });
        }

        // Monitor
        self.transition(LoopState::Monitoring)?;
        let snapshot = self.monitor.observe().await;
        *self.current_compliance.write() = snapshot.compliance;
        self.history.push(snapshot.clone());

        // Analyze
        self.transition(LoopState::Analyzing)?;
        let analysis = self.analyzer.analyze(&snapshot, &self.history);

        // Plan (skipped entirely on short-circuit)
        let (mut plan, mut held, mut hold_reason) = if analysis.feasible {
            self.transition(LoopState::Planning)?;
            match self.planner.plan(&snapshot, self.config.horizon) {
                Some(plan) => (plan, false, None),
                None => (
                    safe_hold_plan(&snapshot),
                    true,
                    Some("no H0-feasible candidate".to_string()),
                ),
            }
        } else {
            let reason = analysis.hold_reason.clone();
            tracing::info!(reason = reason.as_deref(), "tick short-circuits to safe hold");
            (safe_hold_plan(&snapshot), true, reason)
        };

        // Knowledge gate: operations with a long failure history are held.
        if !held {
            let confidence = self.knowledge.plan_confidence(&plan);
            if confidence < MIN_PLAN_CONFIDENCE {
                tracing::warn!(plan = %plan.id, confidence, "plan confidence below threshold");
                plan = safe_hold_plan(&snapshot);
                held = true;
                hold_reason = Some(format!("plan confidence {confidence:.2} too low"));
            }
        }

        // Irreversible plans get a shadow trial first; a trial that moves
        // production compliance or diverges forfeits the plan.
        if !held && plan.has_irreversible_step() {
            if let Some(reason) = self.shadow_trial(&plan).await {
                tracing::warn!(plan = %plan.id, reason = %reason, "shadow trial failed");
                plan = safe_hold_plan(&snapshot);
                held = true;
                hold_reason = Some(reason);
            }
        }

        // Execute under the watchdog
        self.transition(LoopState::Executing)?;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let watchdog = spawn_watchdog(
            self.monitor.clone(),
            self.config.floor(),
            self.config.tick_interval() / 4,
            cancel_tx,
        );
        let execution = self.executor.execute_plan(&plan, &cancel_rx).await;
        watchdog.abort();

        // Knowledge update
        self.knowledge.record_plan(&plan, execution.outcome);
        if execution.escalate {
            self.transition(LoopState::Paused)?;
            tracing::error!(
                plan = %plan.id,
                "ALERT: retries exhausted, control loop paused pending manual intervention"
            );
        } else {
            self.transition(LoopState::Updating)?;
            self.transition(LoopState::Idle)?;
        }

        Ok(TickReport {
            snapshot,
            plan_id: plan.id,
            planned_operations: plan
                .steps
                .iter()
                .map(|s| s.action.operation.clone())
                .collect(),
            held,
            hold_reason,
            execution,
            state_after: self.state,
        })
    }

    /// Run until shutdown flips, ticking at the configured interval.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if self.state == LoopState::Paused {
                        continue;
                    }
                    if let Err(err) = self.tick().await {
                        tracing::error!(error = %err, "tick failed");
                    }
                }
            }
        }
        self.state = LoopState::ShutDown;
        tracing::info!("control loop shut down");
    }

    /// Clear the Paused escalation after manual intervention.
    pub fn resume(&mut self) -> Result<(), RemedyError> {
        validate_transition(self.state, LoopState::Idle)?;
        self.executor.reset_failures();
        self.state = LoopState::Idle;
        tracing::info!("control loop resumed");
        Ok(())
    }

    /// Current loop state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The safety gateway, for operator reports.
    #[must_use]
    pub fn gateway(&self) -> &SafetyGateway {
        &self.gateway
    }

    /// The rollback manager, for attestation export.
    #[must_use]
    pub fn rollback(&self) -> &RollbackManager {
        &self.rollback
    }

    /// The knowledge store.
    #[must_use]
    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    async fn shadow_trial(&self, plan: &CandidatePlan) -> Option<String> {
        let shadow = self.shadow.as_ref()?;
        let expected_dip: f64 = plan
            .steps
            .iter()
            .map(|s| s.action.predicted.compliance_delta)
            .filter(|d| *d < 0.0)
            .sum::<f64>()
            .abs();
        let session = shadow.begin_session(
            ShadowConfig::new(
                format!("preflight-{}", plan.id),
                self.config.mirror_queue_depth,
            )
            .with_degradation(expected_dip),
        );
        let report = shadow.end_session(session).await;
        if !report.production_compliance_unchanged {
            return Some("shadow trial moved production compliance".to_string());
        }
        if report.divergence_count != 0 {
            return Some(format!(
                "shadow trial diverged on {} inputs",
                report.divergence_count
            ));
        }
        tracing::debug!(
            plan = %plan.id,
            session_compliance = %report.session_compliance,
            "shadow trial passed"
        );
        None
    }

    fn transition(&mut self, to: LoopState) -> Result<(), RemedyError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }
}

/// Hold plan substituted whenever nothing safe can be planned.
fn safe_hold_plan(snapshot: &ObservationSnapshot) -> CandidatePlan {
    CandidatePlan::new(vec![PlanStep {
        action: Action::safe_hold(),
        predicted_compliance: snapshot.compliance,
    }])
}

/// Concurrent H0 watchdog.
///
/// Polls telemetry in parallel with Execute and requests cancellation the
/// moment compliance falls below the floor. Read-only: it never mutates
/// state, only flips the watch flag.
fn spawn_watchdog(
    monitor: Arc<Monitor>,
    floor: ComplianceScore,
    poll_interval: Duration,
    cancel: watch::Sender<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(poll_interval).await;
            if cancel.is_closed() {
                return;
            }
            let observation = monitor.observe().await;
            if !observation.compliance.meets_floor(floor) {
                tracing::warn!(
                    compliance = %observation.compliance,
                    floor = %floor,
                    "watchdog observed H0 violation; requesting cancellation"
                );
                let _ = cancel.send(true);
                return;
            }
        }
    })
}
