//! Remedy Safety Gateway
//!
//! Mediates every requested operation in the control plane:
//! - Pure, deterministic rule-based classification (fail-closed)
//! - Execution gated on the verdict
//! - Hash-chained append-only audit log
//! - Safety metrics and the blocked-operations registry
//! - Operator-facing safety report
//!
//! The gateway is a leaf: it depends on nothing else in the workspace, and
//! `classify` is safe for concurrent invocation from any number of callers.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod audit;
pub mod gateway;
pub mod metrics;
pub mod report;
pub mod rules;
pub mod verdict;

pub use audit::{AuditLog, AuditRecord};
pub use gateway::{GatewayError, OperationContext, OperationRunner, SafetyGateway};
pub use metrics::{InMemoryMetrics, MetricsTotals, SafetyMetrics};
pub use report::SafetyReport;
pub use rules::{ClassificationRule, RuleCategory, RuleSet};
pub use verdict::{SafetyVerdict, Severity, Verdict};
