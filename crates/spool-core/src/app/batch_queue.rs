//! BatchQueue - durable, resumable, budget-aware draining of queued items.
//!
//! # Flow
//! 1. `push` items, `save` them as one batch record
//! 2. `dispatch` schedules the health-check and fires the worker trigger
//! 3. the worker runs `maybe_handle`: token, lock and non-empty checks
//! 4. `handle` drains oldest batch first until the queue empties or the time
//!    or memory budget runs out
//! 5. work left over re-dispatches; an empty queue completes and cancels the
//!    health-check
//!
//! The health-check resumes a queue whose trigger never reached the worker.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::builder::AppContext;
use super::endpoint::JobEndpoint;
use super::lock::ProcessLock;
use super::routes::{Verb, Worker, WorkerRequest, WorkerRoutes};
use crate::config::QueueConfig;
use crate::domain::batch::{Batch, BatchKey};
use crate::domain::budget::Budget;
use crate::domain::errors::{QueueError, TaskError};
use crate::domain::outcome::{DrainReport, HandleOutcome, TaskOutcome};
use crate::domain::pointer::Pointer;
use crate::domain::recurrence;
use crate::ports::TriggerReceipt;

/// Action name used when no pointer is given.
pub const DEFAULT_ACTION: &str = "async_queue";

/// Per-item transform plus the optional hooks of a queue type.
#[async_trait]
pub trait BatchTask: Send + Sync + 'static {
    type Item: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Process one item. `Done` drops it from the batch, `Retry(next)` keeps
    /// `next` in its place for the next pass.
    ///
    /// Return `Err` only for failures that should stop the pass; recoverable
    /// per-item problems are better expressed as `Retry`.
    async fn task(&self, item: &Self::Item) -> Result<TaskOutcome<Self::Item>, TaskError>;

    /// Override the computed time-budget verdict.
    fn time_exceeded(&self, computed: bool) -> bool {
        computed
    }

    /// Override the computed memory-budget verdict.
    fn memory_exceeded(&self, computed: bool) -> bool {
        computed
    }

    /// Called once the queue has drained and the health-check is cancelled.
    async fn on_complete(&self, _pointer: &Pointer) {}
}

pub struct BatchQueue<T: BatchTask> {
    endpoint: JobEndpoint,
    task: T,
    config: QueueConfig,
    payload: Mutex<Vec<T::Item>>,
    store_key: OnceLock<BatchKey>,
}

impl<T: BatchTask> BatchQueue<T> {
    pub fn new(ctx: Arc<AppContext>, pointer: Pointer, task: T, config: QueueConfig) -> Self {
        Self {
            endpoint: JobEndpoint::new(ctx, pointer),
            task,
            config,
            payload: Mutex::new(Vec::new()),
            store_key: OnceLock::new(),
        }
    }

    /// Queue under the default pointer, `spool_async_queue`.
    pub fn with_default_pointer(ctx: Arc<AppContext>, task: T, config: QueueConfig) -> Self {
        Self::new(ctx, Pointer::with_default_prefix(DEFAULT_ACTION), task, config)
    }

    pub fn pointer(&self) -> &Pointer {
        self.endpoint.pointer()
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub(crate) fn ctx(&self) -> &Arc<AppContext> {
        self.endpoint.ctx()
    }

    fn codec_error(&self, source: serde_json::Error) -> QueueError {
        QueueError::Codec {
            pointer: self.pointer().to_string(),
            source,
        }
    }

    // ========================================
    // Batch storage
    // ========================================

    /// Append one item to the in-memory payload. No I/O.
    pub fn push(&self, item: T::Item) -> &Self {
        self.payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
        self
    }

    /// Items pushed on this handle so far.
    pub fn pending(&self) -> usize {
        self.payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Key of this handle's batch, generated on first use and reused by
    /// every later `save`.
    pub fn store_key(&self) -> &BatchKey {
        self.store_key
            .get_or_init(|| BatchKey::generate(self.pointer(), &self.ctx().ids.entropy()))
    }

    /// Persist the pushed items under [`store_key`](Self::store_key).
    /// Returns `None` without touching storage when nothing was pushed.
    pub async fn save(&self) -> Result<Option<BatchKey>, QueueError> {
        let value = {
            let payload = self.payload.lock().unwrap_or_else(PoisonError::into_inner);
            if payload.is_empty() {
                return Ok(None);
            }
            serde_json::to_value(&*payload).map_err(|e| self.codec_error(e))?
        };

        let key = self.store_key().clone();
        self.ctx().store.set(key.as_str(), value, None).await?;
        tracing::info!(pointer = %self.pointer(), batch_key = %key, items = self.pending(), "batch saved");
        Ok(Some(key))
    }

    /// Overwrite a batch's items. Empty `data` is a no-op; use
    /// [`delete`](Self::delete) to drop a batch.
    pub async fn update(&self, key: &BatchKey, data: &[T::Item]) -> Result<(), QueueError> {
        if data.is_empty() {
            return Ok(());
        }
        let value = serde_json::to_value(data).map_err(|e| self.codec_error(e))?;
        self.ctx().store.set(key.as_str(), value, None).await?;
        tracing::debug!(pointer = %self.pointer(), batch_key = %key, items = data.len(), "batch updated");
        Ok(())
    }

    pub async fn delete(&self, key: &BatchKey) -> Result<(), QueueError> {
        self.ctx().store.delete(key.as_str()).await?;
        tracing::debug!(pointer = %self.pointer(), batch_key = %key, "batch deleted");
        Ok(())
    }

    /// Oldest stored batch of this queue. Records that do not decode are
    /// moved aside on the way.
    pub async fn get_batch(&self) -> Result<Option<Batch<T::Item>>, QueueError> {
        self.next_batch(&HashSet::new()).await
    }

    /// Oldest decodable batch not in `visited`.
    async fn next_batch(
        &self,
        visited: &HashSet<BatchKey>,
    ) -> Result<Option<Batch<T::Item>>, QueueError> {
        let records = self
            .ctx()
            .store
            .find_by_prefix(&self.pointer().batch_prefix())
            .await?;

        for record in records {
            let key = BatchKey::from_stored(record.key);
            if visited.contains(&key) {
                continue;
            }
            match Vec::<T::Item>::deserialize(&record.value) {
                Ok(data) => return Ok(Some(Batch::new(key, data))),
                Err(e) => self.quarantine(&key, record.value, &e).await?,
            }
        }
        Ok(None)
    }

    /// Move an undecodable record under the dead prefix so it stops
    /// blocking the batches behind it.
    async fn quarantine(
        &self,
        key: &BatchKey,
        value: Value,
        error: &serde_json::Error,
    ) -> Result<(), QueueError> {
        let suffix = key.suffix(self.pointer()).unwrap_or(key.as_str());
        let dead_key = format!("{}{suffix}", self.pointer().dead_prefix());
        let store = &self.ctx().store;
        store.set(&dead_key, value, None).await?;
        store.delete(key.as_str()).await?;
        tracing::error!(
            pointer = %self.pointer(),
            batch_key = %key,
            dead_key = %dead_key,
            error = %error,
            "undecodable batch moved aside"
        );
        Ok(())
    }

    pub async fn is_queue_empty(&self) -> Result<bool, QueueError> {
        let count = self
            .ctx()
            .store
            .count_by_prefix(&self.pointer().batch_prefix())
            .await?;
        Ok(count == 0)
    }

    pub async fn batch_count(&self) -> Result<usize, QueueError> {
        Ok(self
            .ctx()
            .store
            .count_by_prefix(&self.pointer().batch_prefix())
            .await?)
    }

    pub async fn is_process_running(&self) -> Result<bool, QueueError> {
        Ok(self
            .ctx()
            .store
            .get(&self.pointer().lock_key())
            .await?
            .is_some())
    }

    // ========================================
    // Dispatch and worker entry
    // ========================================

    /// Mount the worker route on `routes`.
    pub fn register(self: &Arc<Self>, routes: &mut WorkerRoutes) -> Result<(), QueueError> {
        let worker: Arc<dyn Worker> = self.clone();
        routes.mount(Verb::Post, worker)
    }

    /// Make sure the health-check is scheduled, then fire the trigger.
    pub async fn dispatch(&self) -> Result<TriggerReceipt, QueueError> {
        self.schedule_event().await?;
        let receipt = self.endpoint.trigger(json!({})).await?;
        tracing::info!(pointer = %self.pointer(), "queue dispatched");
        Ok(receipt)
    }

    /// Worker entry: token, then lock absent, then at least one batch.
    pub async fn maybe_handle(&self, request: WorkerRequest) -> Result<HandleOutcome, QueueError> {
        if !self.endpoint.authorize(request.token()).await? {
            return Ok(HandleOutcome::Rejected);
        }
        if self.is_process_running().await? {
            tracing::debug!(pointer = %self.pointer(), "drain already running");
            return Ok(HandleOutcome::AlreadyRunning);
        }
        if self.is_queue_empty().await? {
            tracing::debug!(pointer = %self.pointer(), "queue empty");
            return Ok(HandleOutcome::QueueEmpty);
        }
        self.handle().await
    }

    // ========================================
    // Drain pass
    // ========================================

    /// One drain pass under the process lock.
    ///
    /// Each stored batch is visited at most once per pass, so items that come
    /// back as `Retry` wait for the next pass. The lock is released on every
    /// exit path. A task error stops the pass with progress persisted and no
    /// re-dispatch; the health-check stays scheduled and retries later.
    #[tracing::instrument(name = "drain", skip(self), fields(pointer = %self.pointer()))]
    pub async fn handle(&self) -> Result<HandleOutcome, QueueError> {
        let ctx = self.ctx();
        let started_at = ctx.clock.now();
        let Some(lock) = ProcessLock::acquire(
            ctx.store.clone(),
            self.pointer(),
            ctx.ids.lock_token(),
            started_at,
            self.config.lock_ttl,
        )
        .await?
        else {
            return Ok(HandleOutcome::AlreadyRunning);
        };

        let budget = Budget::start(
            started_at,
            self.config.time_limit,
            self.config.memory_limit,
            self.config.memory_fraction,
        );
        let timer = Instant::now();
        let drained = self.drain(&budget).await;

        if let Err(e) = lock.release().await {
            tracing::warn!(error = %e, "lock release failed; it will expire with its ttl");
        }

        let mut report = drained?;
        tracing::info!(
            batches = report.batches_touched,
            items = report.items_processed,
            completed_items = report.items_completed,
            budget_exhausted = report.budget_exhausted,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "drain pass finished"
        );

        if self.is_queue_empty().await? {
            self.complete().await?;
            report.completed = true;
        } else {
            match self.dispatch().await {
                Ok(_) => report.redispatched = true,
                Err(e) => {
                    tracing::warn!(error = %e, "re-dispatch failed; health-check will resume");
                }
            }
        }
        Ok(HandleOutcome::Drained(report))
    }

    async fn drain(&self, budget: &Budget) -> Result<DrainReport, QueueError> {
        let mut report = DrainReport::default();
        let mut visited = HashSet::new();

        while let Some(batch) = self.next_batch(&visited).await? {
            report.batches_touched += 1;
            let Batch { key, data } = batch;
            visited.insert(key.clone());
            let mut kept = Vec::with_capacity(data.len());
            let mut items = data.into_iter();
            let mut exhausted = false;

            while let Some(item) = items.next() {
                let outcome = match self.task.task(&item).await {
                    Ok(outcome) => outcome,
                    Err(source) => {
                        // keep the failed item and everything after it
                        kept.push(item);
                        kept.extend(items);
                        self.persist(&key, &kept).await?;
                        tracing::error!(batch_key = %key, error = %source, "task failed; pass stopped");
                        return Err(QueueError::Task {
                            pointer: self.pointer().to_string(),
                            source,
                        });
                    }
                };

                report.items_processed += 1;
                match outcome {
                    TaskOutcome::Done => report.items_completed += 1,
                    TaskOutcome::Retry(next) => kept.push(next),
                }

                if self.budget_exceeded(budget) {
                    exhausted = true;
                    break;
                }
            }

            kept.extend(items);
            self.persist(&key, &kept).await?;

            if exhausted {
                report.budget_exhausted = true;
                break;
            }
        }

        Ok(report)
    }

    async fn persist(&self, key: &BatchKey, data: &[T::Item]) -> Result<(), QueueError> {
        if data.is_empty() {
            self.delete(key).await
        } else {
            self.update(key, data).await
        }
    }

    fn budget_exceeded(&self, budget: &Budget) -> bool {
        let ctx = self.ctx();
        let time = self.task.time_exceeded(budget.time_exceeded(ctx.clock.now()));
        let usage = ctx.memory.current_usage();
        let memory = self
            .task
            .memory_exceeded(budget.memory_exceeded(usage));

        if time {
            tracing::info!(deadline = %budget.deadline(), "time budget exceeded");
        }
        if memory {
            tracing::info!(usage_bytes = usage, threshold_bytes = budget.memory_threshold(), "memory budget exceeded");
        }
        time || memory
    }

    // ========================================
    // Completion and health-check
    // ========================================

    /// Cancel the health-check and run the completion hook. Safe to call
    /// when nothing is scheduled.
    pub async fn complete(&self) -> Result<(), QueueError> {
        self.clear_scheduled_event().await?;
        self.task.on_complete(self.pointer()).await;
        tracing::info!(pointer = %self.pointer(), "queue complete");
        Ok(())
    }

    /// Discard the oldest batch and cancel the health-check. Does not drain.
    pub async fn cancel_process(&self) -> Result<(), QueueError> {
        let oldest = self
            .ctx()
            .store
            .first_by_prefix(&self.pointer().batch_prefix())
            .await?;
        if let Some(record) = oldest {
            self.delete(&BatchKey::from_stored(record.key)).await?;
        }
        self.clear_scheduled_event().await?;
        tracing::info!(pointer = %self.pointer(), "process cancelled");
        Ok(())
    }

    /// Register the queue's interval and bind the health-check hook to it
    /// unless already scheduled.
    pub async fn schedule_event(&self) -> Result<(), QueueError> {
        let scheduler = &self.ctx().scheduler;
        let interval = recurrence::every_minutes(self.config.cron_interval_minutes)
            .renamed(self.pointer().cron_interval());
        let interval_id = interval.id.clone();
        scheduler.register_recurrence(interval).await?;

        let hook = self.pointer().cron_hook();
        if !scheduler.is_scheduled(&hook).await? {
            scheduler.schedule_recurring(hook.clone(), &interval_id).await?;
            tracing::info!(pointer = %self.pointer(), hook = %hook, minutes = self.config.cron_interval_minutes, "health-check scheduled");
        }
        Ok(())
    }

    pub async fn clear_scheduled_event(&self) -> Result<(), QueueError> {
        let scheduler = &self.ctx().scheduler;
        let hook = self.pointer().cron_hook();
        if scheduler.is_scheduled(&hook).await? {
            scheduler.unschedule(&hook).await?;
            tracing::info!(pointer = %self.pointer(), hook = %hook, "health-check cancelled");
        }
        Ok(())
    }

    /// Health-check body: no-op while a pass runs, cancel itself when the
    /// queue is empty, otherwise drain directly.
    pub async fn handle_cron_healthcheck(&self) -> Result<HandleOutcome, QueueError> {
        if self.is_process_running().await? {
            tracing::debug!(pointer = %self.pointer(), "health-check: drain running");
            return Ok(HandleOutcome::AlreadyRunning);
        }
        if self.is_queue_empty().await? {
            tracing::debug!(pointer = %self.pointer(), "health-check: queue empty");
            self.clear_scheduled_event().await?;
            return Ok(HandleOutcome::QueueEmpty);
        }
        tracing::info!(pointer = %self.pointer(), "health-check resuming stalled queue");
        self.handle().await
    }
}

#[async_trait]
impl<T: BatchTask> Worker for BatchQueue<T> {
    fn pointer(&self) -> &Pointer {
        self.endpoint.pointer()
    }

    fn route_path(&self) -> String {
        self.endpoint.route_path()
    }

    async fn maybe_handle(&self, request: WorkerRequest) -> Result<HandleOutcome, QueueError> {
        BatchQueue::maybe_handle(self, request).await
    }
}
