//! Key-value persistence collaborator.
//!
//! The engine treats durable storage as an external key-value store with
//! string values. Every write can fail with a capacity error; the ledger
//! reacts by trimming auxiliary history and retrying once before marking
//! persistence as degraded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

/// Storage error type.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store capacity exceeded while writing {key}")]
    CapacityExceeded { key: String },

    #[error("store i/o error: {0}")]
    Io(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// External key-value persistence collaborator.
///
/// `get` returns `None` for missing keys; corrupt values are handled by the
/// callers, not the store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Fixed store keys, scoped per user so question progress is effectively
/// keyed by `(user, question)`.
pub mod keys {
    pub const SCHEMA_VERSION: &str = "progression:schema_version";

    pub fn progress(user_id: &str) -> String {
        format!("progression:{user_id}:progress")
    }

    pub fn questions(user_id: &str) -> String {
        format!("progression:{user_id}:questions")
    }

    pub fn achievements(user_id: &str) -> String {
        format!("progression:{user_id}:achievements")
    }

    pub fn notifications(user_id: &str) -> String {
        format!("progression:{user_id}:notifications")
    }
}

/// In-memory store with an optional byte quota.
///
/// The quota models the capacity failures of the real backing store and
/// drives the degraded-persistence paths in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    values: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once total stored bytes would
    /// exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        let store = Self::new();
        store.inner.lock().quota_bytes = Some(quota_bytes);
        store
    }

    /// Change the quota at runtime. `None` removes the limit.
    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        self.inner.lock().quota_bytes = quota_bytes;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }

    /// Raw value access for tests and diagnostics.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.lock().values.get(key).cloned()
    }

    /// Overwrite a raw value without quota checks (test helper for
    /// simulating corrupt persisted state).
    pub fn put_raw(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .values
            .insert(key.to_string(), value.to_string());
    }
}

impl MemoryStoreInner {
    fn stored_bytes_excluding(&self, key: &str) -> usize {
        self.values
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.lock().values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if let Some(quota) = inner.quota_bytes {
            let projected = inner.stored_bytes_excluding(key) + key.len() + value.len();
            if projected > quota {
                return Err(StoreError::CapacityExceeded {
                    key: key.to_string(),
                });
            }
        }
        inner.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
