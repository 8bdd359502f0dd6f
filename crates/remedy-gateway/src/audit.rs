//! Append-only audit log
//!
//! Every gateway call appends exactly one record, regardless of verdict.
//! Records are hash-chained so tampering with any prior entry is
//! detectable via [`AuditLog::verify_integrity`].

use crate::verdict::SafetyVerdict;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub operation: String,
    pub verdict: SafetyVerdict,
    pub timestamp: DateTime<Utc>,
    pub caller: String,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

/// Append-only, hash-chained audit log. Never mutated after append.
#[derive(Debug, Default)]
pub struct AuditLog {
    inner: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; the chain hashes are computed here, so callers
    /// never supply them.
    pub fn append(&self, operation: &str, verdict: SafetyVerdict, caller: &str) {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map(|r| r.hash).unwrap_or([0u8; 32]);
        let mut record = AuditRecord {
            operation: operation.to_string(),
            verdict,
            timestamp: Utc::now(),
            caller: caller.to_string(),
            prev_hash,
            hash: [0u8; 32],
        };
        record.hash = compute_hash(&record);
        guard.push(record);
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// The `n` most recent records, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<AuditRecord> {
        let guard = self.inner.lock();
        let start = guard.len().saturating_sub(n);
        guard[start..].to_vec()
    }

    /// Verify the whole chain. Any edited or reordered record breaks it.
    pub fn verify_integrity(&self) -> Result<(), usize> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for (index, record) in guard.iter().enumerate() {
            if record.prev_hash != prev || record.hash != compute_hash(record) {
                return Err(index);
            }
            prev = record.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn tamper_with(&self, index: usize, operation: &str) {
        self.inner.lock()[index].operation = operation.to_string();
    }
}

fn compute_hash(record: &AuditRecord) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(record.operation.as_bytes());
    hasher.update([0]);
    hasher.update(format!("{:?}", record.verdict.decision).as_bytes());
    hasher.update(format!("{:?}", record.verdict.severity).as_bytes());
    hasher.update(record.verdict.reason.as_bytes());
    hasher.update([0]);
    hasher.update(record.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(record.caller.as_bytes());
    hasher.update([0]);
    hasher.update(record.prev_hash);
    hasher.finalize().into()
}
