//! Queue status snapshot, for operators and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch_queue::{BatchQueue, BatchTask};
use super::lock::LockRecord;
use crate::domain::errors::QueueError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pointer: String,
    /// Stored batch records.
    pub batches: usize,
    /// Items pushed on this handle and not yet known to be saved.
    pub pushed: usize,
    pub process_running: bool,
    pub lock_acquired_at: Option<DateTime<Utc>>,
    pub healthcheck_scheduled: bool,
}

impl<T: BatchTask> BatchQueue<T> {
    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let ctx = self.ctx();
        let lock = ctx.store.get(&self.pointer().lock_key()).await?;
        // an unreadable lock record still means "running"
        let lock_acquired_at = lock
            .as_ref()
            .and_then(|v| serde_json::from_value::<LockRecord>(v.clone()).ok())
            .map(|r| r.acquired_at);

        Ok(QueueStatus {
            pointer: self.pointer().to_string(),
            batches: self.batch_count().await?,
            pushed: self.pending(),
            process_running: lock.is_some(),
            lock_acquired_at,
            healthcheck_scheduled: ctx
                .scheduler
                .is_scheduled(&self.pointer().cron_hook())
                .await?,
        })
    }
}
