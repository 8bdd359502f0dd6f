//! Snapshot capture, attestation chaining and serialized restore

use crate::store::StateStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use remedy_core::error::IntegrityError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Unique snapshot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub Uuid);

impl SnapshotId {
    /// Generate new snapshot ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot metadata handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackSnapshot {
    pub id: SnapshotId,
    pub target: String,
    pub state_digest: [u8; 32],
    pub captured_at: DateTime<Utc>,
    /// SHA-256(previous attestation || state_digest)
    pub attestation: [u8; 32],
}

impl RollbackSnapshot {
    /// Hex rendering of the digest for logs and exports.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.state_digest)
    }
}

/// One link of the exported attestation chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub snapshot_id: SnapshotId,
    pub target: String,
    pub state_digest: [u8; 32],
    pub attestation: [u8; 32],
    pub captured_at: DateTime<Utc>,
}

/// Rollback-side failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollbackError {
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("state store failed: {0}")]
    Store(String),
}

struct StoredSnapshot {
    meta: RollbackSnapshot,
    payload: Value,
}

/// Captures and restores target state against a pluggable backend.
pub struct RollbackManager {
    store: Arc<dyn StateStore>,
    snapshots: DashMap<SnapshotId, StoredSnapshot>,
    /// Per-target snapshot ids, oldest first, for retention GC
    per_target: DashMap<String, Vec<SnapshotId>>,
    /// Append-only evidence chain; never pruned
    chain: Mutex<Vec<AttestationRecord>>,
    /// Per-target restore locks; a second restore for a target queues here
    restore_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    retention: usize,
}

impl RollbackManager {
    /// Manager over the given backend, retaining `retention` superseded
    /// snapshots per target.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, retention: usize) -> Self {
        Self {
            store,
            snapshots: DashMap::new(),
            per_target: DashMap::new(),
            chain: Mutex::new(Vec::new()),
            restore_locks: DashMap::new(),
            retention: retention.max(1),
        }
    }

    /// Capture the target's current state, digest it, and chain the
    /// attestation to the previous snapshot.
    pub async fn snapshot(&self, target: &str) -> Result<RollbackSnapshot, RollbackError> {
        let payload = self
            .store
            .load(target)
            .await
            .map_err(RollbackError::Store)?
            .unwrap_or(Value::Null);

        let state_digest = digest_state(&payload);
        let meta = {
            let mut chain = self.chain.lock();
            let prev = chain.last().map(|r| r.attestation).unwrap_or([0u8; 32]);
            let attestation = chain_attestation(prev, state_digest);
            let meta = RollbackSnapshot {
                id: SnapshotId::new(),
                target: target.to_string(),
                state_digest,
                captured_at: Utc::now(),
                attestation,
            };
            chain.push(AttestationRecord {
                snapshot_id: meta.id,
                target: meta.target.clone(),
                state_digest,
                attestation,
                captured_at: meta.captured_at,
            });
            meta
        };

        tracing::debug!(
            target,
            snapshot = %meta.id,
            digest = %meta.digest_hex(),
            "snapshot captured"
        );

        self.snapshots.insert(
            meta.id,
            StoredSnapshot {
                meta: meta.clone(),
                payload,
            },
        );
        self.record_and_gc(target, meta.id);
        Ok(meta)
    }

    /// Restore a target to the given snapshot.
    ///
    /// The stored payload's digest is recomputed and compared against the
    /// attested digest; a mismatch aborts the restore with a CRITICAL
    /// integrity alert rather than returning corrupt state. Restores on a
    /// given target are serialized.
    pub async fn restore(&self, snapshot_id: SnapshotId) -> Result<(), RollbackError> {
        let (target, payload, meta) = {
            let stored = self.snapshots.get(&snapshot_id).ok_or_else(|| {
                IntegrityError::SnapshotNotFound {
                    snapshot_id: snapshot_id.to_string(),
                }
            })?;
            (
                stored.meta.target.clone(),
                stored.payload.clone(),
                stored.meta.clone(),
            )
        };

        let lock = self
            .restore_locks
            .entry(target.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let recomputed = digest_state(&payload);
        if recomputed != meta.state_digest {
            tracing::error!(
                target,
                snapshot = %snapshot_id,
                "CRITICAL: attestation mismatch, restore aborted"
            );
            return Err(IntegrityError::AttestationMismatch {
                snapshot_id: snapshot_id.to_string(),
            }
            .into());
        }

        self.store
            .save(&target, payload)
            .await
            .map_err(RollbackError::Store)?;
        tracing::info!(target, snapshot = %snapshot_id, "state restored");
        Ok(())
    }

    /// Most recent snapshot captured for a target, if still retained.
    #[must_use]
    pub fn latest(&self, target: &str) -> Option<RollbackSnapshot> {
        let ids = self.per_target.get(target)?;
        let id = ids.last()?;
        self.snapshots.get(id).map(|s| s.meta.clone())
    }

    /// Verify every link of the attestation chain.
    pub fn verify_chain(&self) -> Result<(), IntegrityError> {
        let chain = self.chain.lock();
        let mut prev = [0u8; 32];
        for (index, record) in chain.iter().enumerate() {
            if record.attestation != chain_attestation(prev, record.state_digest) {
                return Err(IntegrityError::ChainBroken { index });
            }
            prev = record.attestation;
        }
        Ok(())
    }

    /// The full attestation chain, for an external evidence store.
    #[must_use]
    pub fn attestation_export(&self) -> Vec<AttestationRecord> {
        self.chain.lock().clone()
    }

    fn record_and_gc(&self, target: &str, id: SnapshotId) {
        let mut ids = self.per_target.entry(target.to_string()).or_default();
        ids.push(id);
        // The newest snapshot always survives; only superseded ones past
        // the retention window are pruned.
        while ids.len() > self.retention {
            let evicted = ids.remove(0);
            self.snapshots.remove(&evicted);
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_payload(&self, snapshot_id: SnapshotId) {
        if let Some(mut stored) = self.snapshots.get_mut(&snapshot_id) {
            stored.payload = Value::String("tampered".to_string());
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_chain(&self, index: usize) {
        self.chain.lock()[index].state_digest = [0xAB; 32];
    }
}

/// SHA-256 over the canonical JSON rendering of the state.
fn digest_state(state: &Value) -> [u8; 32] {
    let canonical = serde_json::to_vec(state).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hasher.finalize().into()
}

/// attestation = SHA-256(previous attestation || this snapshot's digest)
fn chain_attestation(prev: [u8; 32], digest: [u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev);
    hasher.update(digest);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStateStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manager_with_state(target: &str, state: Value) -> (RollbackManager, Arc<InMemoryStateStore>) {
        let store = Arc::new(InMemoryStateStore::new());
        store.seed(target, state);
        (RollbackManager::new(store.clone(), 4), store)
    }

    #[tokio::test]
    async fn snapshot_restore_round_trip() {
        let (manager, store) = manager_with_state("api", json!({"replicas": 3, "version": "1.4"}));

        let snap = manager.snapshot("api").await.unwrap();
        store.seed("api", json!({"replicas": 1, "version": "1.5"}));

        manager.restore(snap.id).await.unwrap();
        let restored = store.load("api").await.unwrap().unwrap();
        assert_eq!(restored, json!({"replicas": 3, "version": "1.4"}));

        // The restored state reproduces the snapshot's digest exactly.
        assert_eq!(digest_state(&restored), snap.state_digest);
    }

    #[tokio::test]
    async fn tampered_payload_aborts_restore() {
        let (manager, store) = manager_with_state("api", json!({"replicas": 3}));
        let snap = manager.snapshot("api").await.unwrap();
        store.seed("api", json!({"replicas": 9}));

        manager.corrupt_payload(snap.id);
        let err = manager.restore(snap.id).await.unwrap_err();
        assert!(matches!(
            err,
            RollbackError::Integrity(IntegrityError::AttestationMismatch { .. })
        ));

        // The live (corrupt-free) state was left untouched.
        let live = store.load("api").await.unwrap().unwrap();
        assert_eq!(live, json!({"replicas": 9}));
    }

    #[tokio::test]
    async fn chain_links_snapshots() {
        let (manager, store) = manager_with_state("api", json!({"v": 1}));
        manager.snapshot("api").await.unwrap();
        store.seed("api", json!({"v": 2}));
        manager.snapshot("api").await.unwrap();
        store.seed("api", json!({"v": 3}));
        manager.snapshot("api").await.unwrap();

        assert!(manager.verify_chain().is_ok());
        assert_eq!(manager.attestation_export().len(), 3);

        manager.corrupt_chain(1);
        assert_eq!(
            manager.verify_chain(),
            Err(IntegrityError::ChainBroken { index: 1 })
        );
    }

    #[tokio::test]
    async fn retention_prunes_superseded_snapshots() {
        let (manager, store) = manager_with_state("api", json!({"v": 0}));
        let mut ids = Vec::new();
        for v in 0..6 {
            store.seed("api", json!({ "v": v }));
            ids.push(manager.snapshot("api").await.unwrap().id);
        }

        // retention = 4: the two oldest are gone, the newest survives.
        let err = manager.restore(ids[0]).await.unwrap_err();
        assert!(matches!(
            err,
            RollbackError::Integrity(IntegrityError::SnapshotNotFound { .. })
        ));
        assert_eq!(manager.latest("api").unwrap().id, ids[5]);

        // The evidence chain is never pruned.
        assert_eq!(manager.attestation_export().len(), 6);
        assert!(manager.verify_chain().is_ok());
    }

    #[tokio::test]
    async fn restores_on_same_target_serialize() {
        let (manager, _store) = manager_with_state("api", json!({"v": 1}));
        let manager = Arc::new(manager);
        let snap = manager.snapshot("api").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.restore(snap.id).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn missing_target_snapshots_as_null() {
        let store = Arc::new(InMemoryStateStore::new());
        let manager = RollbackManager::new(store, 4);
        let snap = manager.snapshot("ghost").await.unwrap();
        assert_eq!(snap.state_digest, digest_state(&Value::Null));
    }
}
