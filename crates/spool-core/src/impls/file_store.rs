//! File-backed key-value store.
//!
//! The whole table lives in one JSON document. Every write replaces the file
//! through a temp file and a rename, so a crash leaves either the old or the
//! new table on disk, never a torn one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::memory_store::Table;
use crate::domain::errors::StoreError;
use crate::ports::{Clock, KeyValueStore, Record};

pub struct FileStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    table: Mutex<Table>,
}

impl FileStore {
    /// Open the store at `path`, creating an empty table when the file does
    /// not exist yet.
    pub async fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Table::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Table::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), "file store opened");
        Ok(Self {
            path,
            clock,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, table: &Table) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(table)?;
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = self.clock.now();
        Ok(self.table.lock().await.get(key, now))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut table = self.table.lock().await;
        table.purge_expired(now);
        table.set(key, value, ttl, now);
        self.persist(&table).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut table = self.table.lock().await;
        if table.delete(key) {
            self.persist(&table).await?;
        }
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
        table.purge_expired(now);
        table.set(key, value, ttl, now);
        self.persist(&table).await?;
        Ok(true)
    }
}
