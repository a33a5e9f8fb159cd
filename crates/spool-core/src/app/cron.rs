//! Cron runner: fires due health-check hooks on a fixed tick.
//!
//! - `spawn()` starts the loop; dropping or signalling the handle stops it
//! - a firing in progress is never cancelled, the loop only stops taking
//!   new ticks

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::batch_queue::{BatchQueue, BatchTask};
use super::builder::AppContext;
use crate::domain::errors::QueueError;
use crate::domain::ids::HookId;
use crate::domain::outcome::HandleOutcome;
use crate::ports::Clock;

/// Target of a scheduled hook.
#[async_trait]
pub trait CronHook: Send + Sync + 'static {
    async fn fire(&self) -> Result<HandleOutcome, QueueError>;
}

#[async_trait]
impl<T: BatchTask> CronHook for BatchQueue<T> {
    async fn fire(&self) -> Result<HandleOutcome, QueueError> {
        self.handle_cron_healthcheck().await
    }
}

pub struct CronRunner {
    ctx: Arc<AppContext>,
    hooks: HashMap<HookId, Arc<dyn CronHook>>,
    period: Duration,
}

impl CronRunner {
    pub fn new(ctx: Arc<AppContext>, period: Duration) -> Self {
        Self {
            ctx,
            hooks: HashMap::new(),
            period,
        }
    }

    pub fn bind(&mut self, hook: HookId, target: Arc<dyn CronHook>) -> &mut Self {
        self.hooks.insert(hook, target);
        self
    }

    /// Bind a queue's health-check hook to the queue.
    pub fn bind_queue<T: BatchTask>(&mut self, queue: &Arc<BatchQueue<T>>) -> &mut Self {
        let target: Arc<dyn CronHook> = queue.clone();
        self.bind(queue.pointer().cron_hook(), target)
    }

    /// Fire every bound hook due at `now`. Returns the hooks that ran.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<HookId>, QueueError> {
        let due = self.ctx.scheduler.due(now).await?;
        let mut fired = Vec::with_capacity(due.len());

        for hook in due {
            let Some(target) = self.hooks.get(&hook) else {
                tracing::debug!(hook = %hook, "due hook has no target");
                continue;
            };
            match target.fire().await {
                Ok(outcome) => tracing::debug!(hook = %hook, outcome = ?outcome, "hook fired"),
                Err(e) => tracing::error!(hook = %hook, error = %e, "hook failed"),
            }
            fired.push(hook);
        }
        Ok(fired)
    }

    pub fn spawn(self) -> CronHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });
        CronHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(hooks = self.hooks.len(), period_ms = self.period.as_millis() as u64, "cron runner started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // a dropped handle counts as shutdown
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = interval.tick() => {}
            }
            if let Err(e) = self.tick(self.ctx.clock.now()).await {
                tracing::error!(error = %e, "cron tick failed");
            }
        }
        tracing::info!("cron runner stopped");
    }
}

/// Handle of a spawned [`CronRunner`].
pub struct CronHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl CronHandle {
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "cron runner panicked");
        }
    }
}
