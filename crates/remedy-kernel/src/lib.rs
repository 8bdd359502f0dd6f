//! Remedy Kernel - the MAPE-K control loop
//!
//! Orchestrates Monitor -> Analyze -> Plan -> Execute -> Knowledge-update:
//! - Monitor fans out to telemetry sources concurrently, each bounded by a
//!   timeout; partial failure degrades the snapshot instead of aborting
//! - Analyze short-circuits to the safe hold action when the snapshot is
//!   degraded or compliance is below the H0 floor
//! - Plan delegates to the lexicographic planner
//! - Execute submits steps one at a time through the Safety Gateway under
//!   a concurrent watchdog that requests cancellation on H0 violations
//! - Outcomes feed the knowledge store consumed by the next Analyze
//!
//! Loop iterations are serialized; tick *n* never overlaps tick *n+1*.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod analyze;
pub mod controller;
pub mod execute;
pub mod knowledge;
pub mod monitor;
pub mod state;

pub use analyze::{Analysis, Analyzer};
pub use controller::{ControlLoop, ControlLoopBuilder, LoggingRunner, TickReport};
pub use execute::{ExecutionReport, PlanExecutor};
pub use knowledge::{KnowledgeStore, OutcomeStats};
pub use monitor::Monitor;
pub use state::{allowed_transitions, validate_transition, LoopState};
