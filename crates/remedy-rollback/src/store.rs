//! Storage-backend seam for target state

use dashmap::DashMap;
use serde_json::Value;

/// Backend that holds the live state the manager snapshots and restores.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Load the current state of a target, if any.
    async fn load(&self, target: &str) -> Result<Option<Value>, String>;

    /// Overwrite a target's state.
    async fn save(&self, target: &str, state: Value) -> Result<(), String>;
}

/// In-memory backend used by the kernel wiring and tests.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, Value>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a target's state synchronously.
    pub fn seed(&self, target: &str, state: Value) {
        self.entries.insert(target.to_string(), state);
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, target: &str) -> Result<Option<Value>, String> {
        Ok(self.entries.get(target).map(|e| e.value().clone()))
    }

    async fn save(&self, target: &str, state: Value) -> Result<(), String> {
        self.entries.insert(target.to_string(), state);
        Ok(())
    }
}
