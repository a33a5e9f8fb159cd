//! In-memory key-value store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::ports::{Clock, KeyValueStore, Record};

/// One stored value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Entry {
    /// Insertion sequence; kept when the key is overwritten.
    seq: u64,
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Key-value table shared by the in-memory and file-backed stores.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Table {
    next_seq: u64,
    entries: HashMap<String, Entry>,
}

impl Table {
    pub(crate) fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    pub(crate) fn set(
        &mut self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) {
        let expires_at = ttl.map(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        // an expired record is gone, so writing it again counts as a new insert
        let seq = match self.entries.get(key) {
            Some(existing) if existing.is_live(now) => existing.seq,
            _ => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };

        self.entries.insert(
            key.to_string(),
            Entry {
                seq,
                value,
                expires_at,
            },
        );
    }

    pub(crate) fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub(crate) fn find_by_prefix(&self, prefix: &str, now: DateTime<Utc>) -> Vec<Record> {
        let mut hits: Vec<(&String, &Entry)> = self
            .entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .collect();
        hits.sort_by_key(|(_, entry)| entry.seq);
        hits.into_iter()
            .map(|(key, entry)| Record {
                key: key.clone(),
                value: entry.value.clone(),
            })
            .collect()
    }

    /// Drop expired entries. Returns true when anything was removed.
    pub(crate) fn purge_expired(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        self.entries.len() != before
    }
}

/// Store kept in process memory. Expiry follows the injected clock.
pub struct InMemoryStore {
    clock: Arc<dyn Clock>,
    table: Mutex<Table>,
}

impl InMemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            table: Mutex::new(Table::default()),
        }
    }

    /// Number of live records, for tests and status output.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let table = self.table.lock().await;
        table.entries.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = self.clock.now();
        Ok(self.table.lock().await.get(key, now))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut table = self.table.lock().await;
        table.purge_expired(now);
        table.set(key, value, ttl, now);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.table.lock().await.delete(key);
        Ok(())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<Record>, StoreError> {
        let now = self.clock.now();
        Ok(self.table.lock().await.find_by_prefix(prefix, now))
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut table = self.table.lock().await;
        if table.get(key, now).is_some() {
            return Ok(false);
        }
        table.set(key, value, ttl, now);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn store() -> (Arc<FixedClock>, InMemoryStore) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let store = InMemoryStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn get_set_delete() {
        let (_, store) = store();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", json!([1, 2]), None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(json!([1, 2])));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        // deleting again is fine
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn prefix_scan_is_in_insertion_order_and_overwrite_keeps_position() {
        let (_, store) = store();
        store.set("q_batch_b", json!(1), None).await.unwrap();
        store.set("q_batch_a", json!(2), None).await.unwrap();
        store.set("other", json!(3), None).await.unwrap();
        store.set("q_batch_c", json!(4), None).await.unwrap();

        store.set("q_batch_b", json!(10), None).await.unwrap();

        let keys: Vec<_> = store
            .find_by_prefix("q_batch_")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["q_batch_b", "q_batch_a", "q_batch_c"]);

        let first = store.first_by_prefix("q_batch_").await.unwrap().unwrap();
        assert_eq!(first.value, json!(10));
        assert_eq!(store.count_by_prefix("q_batch_").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn ttl_follows_the_clock() {
        let (clock, store) = store();
        store
            .set("lock", json!("held"), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(59));
        assert!(store.get("lock").await.unwrap().is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert!(store.get("lock").await.unwrap().is_none());
        assert!(store.find_by_prefix("lo").await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn insert_if_absent_only_writes_once() {
        let (clock, store) = store();
        let ttl = Some(Duration::from_secs(60));
        assert!(store.insert_if_absent("lock", json!(1), ttl).await.unwrap());
        assert!(!store.insert_if_absent("lock", json!(2), ttl).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), Some(json!(1)));

        // expired records no longer block
        clock.advance(chrono::Duration::seconds(61));
        assert!(store.insert_if_absent("lock", json!(3), ttl).await.unwrap());
    }
}
