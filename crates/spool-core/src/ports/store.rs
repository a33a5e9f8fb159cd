//! KeyValueStore port: the single persistence surface the queue relies on.
//!
//! Batches and the process lock are plain records in this store. No
//! cross-record transactions are used; read-after-write on one record is
//! all the queue needs.

use std::time::Duration;

use serde_json::Value;

use crate::domain::errors::StoreError;

/// One stored record as returned by a prefix scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: Value,
}

/// Minimal key-value contract.
///
/// `find_by_prefix` returns records in ascending insertion order. Overwriting
/// an existing key keeps its original position, so a partially drained batch
/// stays the oldest one.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write `value` under `key`. With a `ttl` the record disappears once it
    /// has been stored for that long.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<Record>, StoreError>;

    /// Write only when `key` holds no live record. Returns whether the write
    /// happened.
    ///
    /// The default is a plain read followed by a write; backends that can
    /// make this atomic should override it.
    async fn insert_if_absent(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.set(key, value, ttl).await?;
        Ok(true)
    }

    /// Oldest record under `prefix`.
    async fn first_by_prefix(&self, prefix: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.find_by_prefix(prefix).await?.into_iter().next())
    }

    async fn count_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        Ok(self.find_by_prefix(prefix).await?.len())
    }
}
