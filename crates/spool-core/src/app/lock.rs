//! Process lock: the record that makes a drain pass exclusive.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::StoreError;
use crate::domain::ids::LockToken;
use crate::domain::pointer::Pointer;
use crate::ports::KeyValueStore;

/// Value stored under `{pointer}_process_lock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub acquired_at: DateTime<Utc>,
    pub token: String,
}

/// Held lock. Release it with [`ProcessLock::release`]; if the guard is
/// dropped without that (panic, cancelled future) the delete is spawned on
/// the current runtime, and the TTL remains the last resort.
pub struct ProcessLock {
    store: Arc<dyn KeyValueStore>,
    key: String,
    token: LockToken,
    released: bool,
}

impl ProcessLock {
    /// Take the lock for `pointer`. `None` when another pass holds it.
    pub async fn acquire(
        store: Arc<dyn KeyValueStore>,
        pointer: &Pointer,
        token: LockToken,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Option<Self>, StoreError> {
        let key = pointer.lock_key();
        let record = LockRecord {
            acquired_at: now,
            token: token.to_string(),
        };
        let value = serde_json::to_value(&record)?;

        if !store.insert_if_absent(&key, value, Some(ttl)).await? {
            tracing::debug!(pointer = %pointer, "process lock busy");
            return Ok(None);
        }

        tracing::debug!(pointer = %pointer, token = %token, ttl_secs = ttl.as_secs(), "process lock acquired");
        Ok(Some(Self {
            store,
            key,
            token,
            released: false,
        }))
    }

    pub fn token(&self) -> LockToken {
        self.token
    }

    pub async fn release(mut self) -> Result<(), StoreError> {
        self.released = true;
        self.store.delete(&self.key).await?;
        tracing::debug!(key = %self.key, token = %self.token, "process lock released");
        Ok(())
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(key = %key, "process lock dropped without release; releasing");
                handle.spawn(async move {
                    if let Err(e) = store.delete(&key).await {
                        tracing::error!(key = %key, error = %e, "late lock release failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!(key = %key, "process lock dropped outside a runtime; left to expire");
            }
        }
    }
}
