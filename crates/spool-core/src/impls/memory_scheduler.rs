//! In-process recurring scheduler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::errors::SchedulerError;
use crate::domain::ids::{HookId, RecurrenceId};
use crate::domain::recurrence::{self, Recurrence};
use crate::ports::{Clock, Scheduler};

/// A hook bound to an interval.
#[derive(Debug, Clone)]
struct ScheduledHook {
    recurrence: RecurrenceId,
    next_run: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    /// Registered intervals by id.
    recurrences: HashMap<RecurrenceId, Recurrence>,
    /// Bound hooks by name.
    hooks: HashMap<HookId, ScheduledHook>,
}

/// Scheduler kept in memory, seeded with the stock recurrence catalog.
pub struct InMemoryScheduler {
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
}

impl InMemoryScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let recurrences = recurrence::catalog()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Self {
            clock,
            state: Mutex::new(SchedulerState {
                recurrences,
                hooks: HashMap::new(),
            }),
        }
    }

    pub async fn recurrence(&self, id: &RecurrenceId) -> Option<Recurrence> {
        self.state.lock().await.recurrences.get(id).cloned()
    }

    /// Next run of `hook`, if scheduled.
    pub async fn next_run(&self, hook: &HookId) -> Option<DateTime<Utc>> {
        self.state.lock().await.hooks.get(hook).map(|h| h.next_run)
    }

    pub async fn scheduled_hooks(&self) -> Vec<HookId> {
        let mut hooks: Vec<_> = self.state.lock().await.hooks.keys().cloned().collect();
        hooks.sort();
        hooks
    }
}

#[async_trait]
impl Scheduler for InMemoryScheduler {
    async fn register_recurrence(&self, recurrence: Recurrence) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().await;
        state.recurrences.insert(recurrence.id.clone(), recurrence);
        Ok(())
    }

    async fn is_scheduled(&self, hook: &HookId) -> Result<bool, SchedulerError> {
        Ok(self.state.lock().await.hooks.contains_key(hook))
    }

    async fn schedule_recurring(
        &self,
        hook: HookId,
        recurrence: &RecurrenceId,
    ) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let next_run = state
            .recurrences
            .get(recurrence)
            .map(|r| r.next_after(now, 1))
            .ok_or_else(|| SchedulerError::UnknownRecurrence(recurrence.clone()))?;

        state.hooks.entry(hook).or_insert(ScheduledHook {
            recurrence: recurrence.clone(),
            next_run,
        });
        Ok(())
    }

    async fn unschedule(&self, hook: &HookId) -> Result<(), SchedulerError> {
        self.state.lock().await.hooks.remove(hook);
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<HookId>, SchedulerError> {
        let mut state = self.state.lock().await;
        let SchedulerState { recurrences, hooks } = &mut *state;

        let mut due = Vec::new();
        for (hook, entry) in hooks.iter_mut() {
            if entry.next_run > now {
                continue;
            }
            let Some(recurrence) = recurrences.get(&entry.recurrence) else {
                return Err(SchedulerError::UnknownRecurrence(entry.recurrence.clone()));
            };
            // skip missed runs instead of firing once per missed period
            while entry.next_run <= now {
                let next = recurrence.next_after(entry.next_run, 1);
                if next <= entry.next_run {
                    break;
                }
                entry.next_run = next;
            }
            due.push(hook.clone());
        }
        due.sort();
        Ok(due)
    }
}
