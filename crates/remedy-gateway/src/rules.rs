//! Command classification rules
//!
//! The rule set is a data-driven table of `(category, pattern, severity,
//! message)` tuples evaluated in a fixed priority order, loaded once at
//! startup. Evaluation is pure: the first matching rule of the highest
//! priority category wins.

use crate::verdict::Severity;
use once_cell::sync::Lazy;
use regex::Regex;

/// Priority-ordered rule categories. Earlier categories are checked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleCategory {
    /// Destructive-operation signatures (recursive delete, db drop, format)
    Destructive,
    /// Command-injection / subshell-chaining patterns
    Injection,
    /// Path traversal or absolute system-path targets
    PathTraversal,
    /// Writes to version-control metadata or dependency manifests
    ProtectedPath,
    /// High-risk but reversible operations; warn unless confirmed
    HighRisk,
}

/// One classification rule.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub category: RuleCategory,
    pub pattern: Regex,
    pub severity: Severity,
    pub message: &'static str,
}

impl ClassificationRule {
    fn new(
        category: RuleCategory,
        pattern: &str,
        severity: Severity,
        message: &'static str,
    ) -> Self {
        Self {
            category,
            // Patterns ship with the binary; a malformed one is a build defect.
            pattern: Regex::new(pattern).unwrap_or_else(|e| {
                panic!("invalid builtin classification pattern {pattern:?}: {e}")
            }),
            severity,
            message,
        }
    }

    /// Whether the rule matches the operation text.
    #[inline]
    #[must_use]
    pub fn matches(&self, operation: &str) -> bool {
        self.pattern.is_match(operation)
    }
}

/// Immutable, priority-ordered set of classification rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    /// The builtin rule table.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// First matching rule in priority order, skipping `ProtectedPath`
    /// rules for read-only operations (protected paths may be read).
    #[must_use]
    pub fn first_match(&self, operation: &str) -> Option<&ClassificationRule> {
        self.rules.iter().find(|rule| {
            if rule.category == RuleCategory::ProtectedPath && is_read_only(operation) {
                return false;
            }
            rule.matches(operation)
        })
    }

    /// Whether any blocking-tier rule (everything above `HighRisk`)
    /// matches. Used by the planner to pre-filter unexecutable actions.
    #[must_use]
    pub fn would_block(&self, operation: &str) -> bool {
        self.first_match(operation)
            .map(|r| r.category < RuleCategory::HighRisk)
            .unwrap_or(false)
    }
}

static BUILTIN: Lazy<RuleSet> = Lazy::new(|| RuleSet {
    rules: vec![
        // -- Destructive signatures -------------------------------------
        ClassificationRule::new(
            RuleCategory::Destructive,
            r"\brm\s+(-[a-zA-Z]*[rf][a-zA-Z]*\s+)+",
            Severity::Critical,
            "destructive operation: recursive or forced delete",
        ),
        ClassificationRule::new(
            RuleCategory::Destructive,
            r"(?i)\bdrop\s+(database|table|schema)\b",
            Severity::Critical,
            "destructive operation: database object drop",
        ),
        ClassificationRule::new(
            RuleCategory::Destructive,
            r"\bmkfs(\.\w+)?\b",
            Severity::Critical,
            "destructive operation: filesystem format",
        ),
        ClassificationRule::new(
            RuleCategory::Destructive,
            r"\bdd\b.*\bof=/dev/",
            Severity::Critical,
            "destructive operation: raw device write",
        ),
        ClassificationRule::new(
            RuleCategory::Destructive,
            r"\b(shred|wipefs)\b",
            Severity::Critical,
            "destructive operation: storage wipe",
        ),
        // -- Injection / subshell chaining ------------------------------
        ClassificationRule::new(
            RuleCategory::Injection,
            r"\$\(|`",
            Severity::Critical,
            "command injection: subshell substitution",
        ),
        ClassificationRule::new(
            RuleCategory::Injection,
            r";|&&|\|\|",
            Severity::Critical,
            "command injection: shell command chaining",
        ),
        // -- Path traversal / system paths ------------------------------
        ClassificationRule::new(
            RuleCategory::PathTraversal,
            r"\.\./",
            Severity::Critical,
            "path traversal: parent-directory escape",
        ),
        ClassificationRule::new(
            RuleCategory::PathTraversal,
            r"(^|[\s=])/(etc|usr|bin|sbin|boot|dev|sys|proc)(/|\s|$)",
            Severity::Critical,
            "path traversal: absolute system path target",
        ),
        // -- Protected paths (write-blocked, read-allowed) ---------------
        ClassificationRule::new(
            RuleCategory::ProtectedPath,
            r"\.git(/|\b)",
            Severity::High,
            "protected path: version-control metadata",
        ),
        ClassificationRule::new(
            RuleCategory::ProtectedPath,
            r"(Cargo\.(toml|lock)|package(-lock)?\.json|go\.(mod|sum)|requirements\.txt)\b",
            Severity::High,
            "protected path: dependency manifest",
        ),
        // -- High-risk but reversible ------------------------------------
        ClassificationRule::new(
            RuleCategory::HighRisk,
            r"\bchmod\b\s+(-[a-zA-Z]+\s+)*([0-7]*7[0-7]*|a?\+rwx?w?)",
            Severity::High,
            "high-risk operation: permission widening",
        ),
        ClassificationRule::new(
            RuleCategory::HighRisk,
            r"\bchown\b\s+-R\b",
            Severity::High,
            "high-risk operation: recursive ownership change",
        ),
        ClassificationRule::new(
            RuleCategory::HighRisk,
            r"\bgit\s+push\b.*(\s-f\b|--force)",
            Severity::High,
            "high-risk operation: forced history rewrite",
        ),
    ],
});

const READ_ONLY_COMMANDS: &[&str] = &[
    "cat", "less", "head", "tail", "ls", "stat", "grep", "find", "diff", "wc", "sha256sum",
];

const READ_ONLY_GIT: &[&str] = &["log", "diff", "show", "status", "blame"];

/// Whether an operation only reads its targets.
///
/// Conservative: anything not recognized is treated as a write, so the
/// protected-path rules stay fail-closed.
#[must_use]
pub fn is_read_only(operation: &str) -> bool {
    let mut tokens = operation.split_whitespace();
    match tokens.next() {
        Some("git") => tokens
            .next()
            .map(|sub| READ_ONLY_GIT.contains(&sub))
            .unwrap_or(false),
        Some(first) => READ_ONLY_COMMANDS.contains(&first),
        None => false,
    }
}
