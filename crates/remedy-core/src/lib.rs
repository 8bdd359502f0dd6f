//! Remedy Core - shared data model for the remediation control plane
//!
//! Defines the types every other crate speaks:
//! - Observation snapshots and the compliance index
//! - Constraint tiers (H0 hard floor, H1 preference, H2 performance)
//! - Actions and candidate plans
//! - Runtime configuration and the error taxonomy
//! - The telemetry-source seam consumed by the Monitor phase

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::RemedyConfig;
pub use error::{
    ConfigError, ExecutionError, IntegrityError, PlanError, RemedyError, TelemetryError,
};
pub use telemetry::{SourceReading, TelemetrySource};
pub use types::{
    Action, ActionId, ActionKind, CandidatePlan, ComplianceScore, ConstraintTier, MetricsSample,
    ObservationSnapshot, PlanId, PlanOutcome, PlanStep, PredictedEffect, SnapshotHistory,
};
