//! Testing utilities for the Remedy workspace
//!
//! Shared fixtures: scripted telemetry sources, recording operation
//! runners, and snapshot/plan builders.

#![allow(missing_docs)]

use chrono::Utc;
use parking_lot::Mutex;
use remedy_core::error::TelemetryError;
use remedy_core::{
    Action, ActionKind, CandidatePlan, ComplianceScore, MetricsSample, ObservationSnapshot,
    PlanStep, SourceReading, TelemetrySource,
};
use remedy_gateway::{OperationContext, OperationRunner};
use std::collections::VecDeque;
use std::time::Duration;

/// Telemetry source that replays a scripted sequence of compliance values,
/// repeating the last one once the script runs out.
pub struct ScriptedTelemetry {
    name: String,
    script: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl ScriptedTelemetry {
    pub fn new(name: impl Into<String>, script: impl IntoIterator<Item = f64>) -> Self {
        let script: VecDeque<f64> = script.into_iter().collect();
        let last = script.back().copied().unwrap_or(100.0);
        Self {
            name: name.into(),
            script: Mutex::new(script),
            last: Mutex::new(last),
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for ScriptedTelemetry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<SourceReading, TelemetryError> {
        let value = match self.script.lock().pop_front() {
            Some(v) => {
                *self.last.lock() = v;
                v
            }
            None => *self.last.lock(),
        };
        Ok(SourceReading {
            compliance: Some(ComplianceScore::new(value)),
            latency_ms: Some(40.0),
            throughput_rps: Some(1_200.0),
            error_rate: Some(0.002),
            sampled_at: Utc::now(),
        })
    }
}

/// Telemetry source that never answers inside any reasonable timeout.
pub struct HangingTelemetry {
    name: String,
}

impl HangingTelemetry {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for HangingTelemetry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<SourceReading, TelemetryError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Err(TelemetryError::Stale {
            source: self.name.clone(),
        })
    }
}

/// Runner that records every operation the gateway admits.
#[derive(Default)]
pub struct RecordingRunner {
    executed: Mutex<Vec<String>>,
    /// Operations that should fail after admission
    fail_on: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(self, operation: impl Into<String>) -> Self {
        self.fail_on.lock().push(operation.into());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait::async_trait]
impl OperationRunner for RecordingRunner {
    async fn run(&self, operation: &str, _context: &OperationContext) -> Result<(), String> {
        if self.fail_on.lock().iter().any(|op| op == operation) {
            return Err(format!("scripted failure for {operation}"));
        }
        self.executed.lock().push(operation.to_string());
        Ok(())
    }
}

/// Healthy snapshot at the given compliance.
pub fn snapshot_at(compliance: f64) -> ObservationSnapshot {
    ObservationSnapshot::healthy(
        ComplianceScore::new(compliance),
        MetricsSample {
            latency_ms: 40.0,
            throughput_rps: 1_200.0,
            error_rate: 0.002,
        },
    )
}

/// Single-step plan with the given operation and predicted compliance.
pub fn plan_with(operation: &str, predicted: f64, h1: f64, h2: f64) -> CandidatePlan {
    CandidatePlan::new(vec![PlanStep {
        action: Action::new(ActionKind::Tune, operation, "svc").with_effect(h1, h2),
        predicted_compliance: ComplianceScore::new(predicted),
    }])
}
