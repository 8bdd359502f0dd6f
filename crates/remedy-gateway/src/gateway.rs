//! The Safety Gateway
//!
//! `classify` is pure and deterministic over the immutable rule set;
//! `execute` only proceeds past an allow (or confirmed warn) verdict. Every
//! call appends one audit record and bumps the safety counters, whatever
//! the verdict.

use crate::audit::AuditLog;
use crate::metrics::{InMemoryMetrics, SafetyMetrics};
use crate::report::SafetyReport;
use crate::rules::{RuleCategory, RuleSet};
use crate::verdict::{SafetyVerdict, Severity, Verdict};
use std::sync::Arc;

/// Caller-supplied context for one operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    /// Who is requesting the operation (control loop, operator, shadow)
    pub caller: String,
    /// Explicit confirmation for high-risk reversible operations
    pub confirmed: bool,
}

impl OperationContext {
    /// Context for an unconfirmed request from the named caller.
    #[must_use]
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            confirmed: false,
        }
    }

    /// With explicit confirmation.
    #[inline]
    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }
}

/// Gateway-side failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("operation blocked ({severity:?}): {reason}")]
    Blocked { severity: Severity, reason: String },

    #[error("operation requires confirmation: {reason}")]
    NeedsConfirmation { reason: String },

    #[error("runner failed: {0}")]
    Runner(String),
}

/// The seam that actually performs an admitted operation's side effect.
///
/// The gateway itself touches nothing beyond the audit log and counters.
#[async_trait::async_trait]
pub trait OperationRunner: Send + Sync {
    /// Perform the operation. `Err` means the side effect failed after
    /// the gate admitted it.
    async fn run(&self, operation: &str, context: &OperationContext) -> Result<(), String>;
}

/// Mediates every actuation in the control plane.
pub struct SafetyGateway {
    rules: RuleSet,
    audit: AuditLog,
    metrics: Arc<dyn SafetyMetrics>,
}

impl SafetyGateway {
    /// Gateway over the builtin rule set with in-memory counters.
    #[must_use]
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(InMemoryMetrics::new()))
    }

    /// Gateway with a caller-supplied metrics backend.
    #[must_use]
    pub fn with_metrics(metrics: Arc<dyn SafetyMetrics>) -> Self {
        Self {
            rules: RuleSet::builtin(),
            audit: AuditLog::new(),
            metrics,
        }
    }

    /// The rule set, shared with the planner for pre-filtering.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Classify one requested operation.
    ///
    /// Pure and deterministic: identical `(operation, context)` always
    /// yields the same verdict, and the rule set never changes after
    /// startup, so concurrent callers are safe.
    #[must_use]
    pub fn classify(&self, operation: &str, context: &OperationContext) -> SafetyVerdict {
        // Unrecognizable input fails closed, never open.
        if operation.trim().is_empty() || operation.chars().any(char::is_control) {
            return SafetyVerdict::block(
                Severity::High,
                "ambiguous operation: empty or unparseable command text",
            );
        }

        match self.rules.first_match(operation) {
            Some(rule) if rule.category == RuleCategory::HighRisk => {
                if context.confirmed {
                    SafetyVerdict::allow(format!("{} (confirmed)", rule.message))
                } else {
                    SafetyVerdict::warn(rule.message)
                }
            }
            Some(rule) => SafetyVerdict::block(rule.severity, rule.message),
            None => SafetyVerdict::allow("no classification rule matched"),
        }
    }

    /// Classify, audit, and (only past the gate) perform the operation.
    pub async fn execute(
        &self,
        operation: &str,
        context: &OperationContext,
        runner: &dyn OperationRunner,
    ) -> Result<(), GatewayError> {
        let verdict = self.classify(operation, context);
        self.audit.append(operation, verdict.clone(), &context.caller);

        match verdict.decision {
            Verdict::Allow => {
                self.metrics.record_successful(operation);
                tracing::debug!(operation, caller = %context.caller, "operation admitted");
                runner
                    .run(operation, context)
                    .await
                    .map_err(GatewayError::Runner)
            }
            Verdict::WarnNeedsConfirmation => {
                self.metrics.record_blocked(operation);
                tracing::warn!(
                    operation,
                    caller = %context.caller,
                    reason = %verdict.reason,
                    "operation held for confirmation"
                );
                Err(GatewayError::NeedsConfirmation {
                    reason: verdict.reason,
                })
            }
            Verdict::Block => {
                self.metrics.record_blocked(operation);
                tracing::warn!(
                    operation,
                    caller = %context.caller,
                    severity = ?verdict.severity,
                    reason = %verdict.reason,
                    "operation blocked"
                );
                Err(GatewayError::Blocked {
                    severity: verdict.severity,
                    reason: verdict.reason,
                })
            }
        }
    }

    /// Append-only audit log.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Safety counters.
    #[must_use]
    pub fn metrics(&self) -> &dyn SafetyMetrics {
        self.metrics.as_ref()
    }

    /// On-demand operator safety report.
    #[must_use]
    pub fn report(&self, recent: usize, top_blocked: usize) -> SafetyReport {
        SafetyReport::assemble(
            self.metrics.totals(),
            self.audit.recent(recent),
            self.metrics.top_blocked(top_blocked),
        )
    }
}

impl Default for SafetyGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct NoopRunner;

    #[async_trait::async_trait]
    impl OperationRunner for NoopRunner {
        async fn run(&self, _operation: &str, _context: &OperationContext) -> Result<(), String> {
            Ok(())
        }
    }

    struct FailingRunner;

    #[async_trait::async_trait]
    impl OperationRunner for FailingRunner {
        async fn run(&self, _operation: &str, _context: &OperationContext) -> Result<(), String> {
            Err("runner exploded".to_string())
        }
    }

    #[test]
    fn destructive_delete_blocks_critical() {
        let gateway = SafetyGateway::new();
        let verdict = gateway.classify("rm -rf /data", &OperationContext::new("test"));
        assert_eq!(verdict.decision, Verdict::Block);
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.reason.contains("destructive"));
    }

    #[test]
    fn permission_widening_warns_then_allows_confirmed() {
        let gateway = SafetyGateway::new();
        let unconfirmed = gateway.classify("chmod 777 f", &OperationContext::new("test"));
        assert_eq!(unconfirmed.decision, Verdict::WarnNeedsConfirmation);
        assert_eq!(unconfirmed.severity, Severity::High);

        let confirmed = gateway.classify("chmod 777 f", &OperationContext::new("test").confirmed());
        assert_eq!(confirmed.decision, Verdict::Allow);
    }

    #[test]
    fn empty_operation_fails_closed() {
        let gateway = SafetyGateway::new();
        let verdict = gateway.classify("   ", &OperationContext::new("test"));
        assert_eq!(verdict.decision, Verdict::Block);
    }

    #[test]
    fn protected_manifest_write_blocks_read_allows() {
        let gateway = SafetyGateway::new();
        let ctx = OperationContext::new("test");
        assert_eq!(
            gateway.classify("sed -i s/0.1/0.2/ Cargo.toml", &ctx).decision,
            Verdict::Block
        );
        assert_eq!(gateway.classify("cat Cargo.toml", &ctx).decision, Verdict::Allow);
    }

    #[tokio::test]
    async fn execute_audits_every_call() {
        let gateway = SafetyGateway::new();
        let ctx = OperationContext::new("test");

        assert!(gateway.execute("restart service api", &ctx, &NoopRunner).await.is_ok());
        assert!(gateway.execute("rm -rf /data", &ctx, &NoopRunner).await.is_err());

        assert_eq!(gateway.audit().len(), 2);
        assert!(gateway.audit().verify_integrity().is_ok());

        let totals = gateway.metrics().totals();
        assert_eq!(totals.total_ops, 2);
        assert_eq!(totals.blocked_ops, 1);
        assert_eq!(totals.successful_ops, 1);
    }

    #[tokio::test]
    async fn runner_failure_still_counts_admitted() {
        let gateway = SafetyGateway::new();
        let ctx = OperationContext::new("test");
        let result = gateway.execute("restart service api", &ctx, &FailingRunner).await;
        assert!(matches!(result, Err(GatewayError::Runner(_))));

        // The gate admitted the operation; the counter reflects the gate,
        // not the runner.
        let totals = gateway.metrics().totals();
        assert_eq!(totals.successful_ops, 1);
        assert_eq!(totals.blocked_ops, 0);
    }

    #[tokio::test]
    async fn unconfirmed_warn_does_not_execute() {
        let gateway = SafetyGateway::new();
        let result = gateway
            .execute("chmod 777 f", &OperationContext::new("test"), &NoopRunner)
            .await;
        assert!(matches!(result, Err(GatewayError::NeedsConfirmation { .. })));

        let confirmed = gateway
            .execute("chmod 777 f", &OperationContext::new("test").confirmed(), &NoopRunner)
            .await;
        assert!(confirmed.is_ok());
    }
}
