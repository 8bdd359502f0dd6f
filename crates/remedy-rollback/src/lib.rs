//! Remedy Rollback Manager
//!
//! Captures and restores target state with cryptographic attestation:
//! - Snapshot digests are SHA-256 over the canonicalized state
//! - Each attestation chains to the previous one, so tampering with any
//!   prior snapshot is detectable
//! - Restores verify the digest first and abort on mismatch
//! - Restores on one target are serialized; a second request queues
//! - Superseded snapshots are garbage-collected past the retention window
//!
//! The storage backend sits behind [`StateStore`]; everything else in the
//! workspace consumes the manager through [`RollbackManager`].

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod manager;
pub mod store;

pub use manager::{AttestationRecord, RollbackError, RollbackManager, RollbackSnapshot, SnapshotId};
pub use store::{InMemoryStateStore, StateStore};
