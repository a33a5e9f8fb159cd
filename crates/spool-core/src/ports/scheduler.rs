//! Scheduler port: recurring hooks on named intervals.

use chrono::{DateTime, Utc};

use crate::domain::errors::SchedulerError;
use crate::domain::ids::{HookId, RecurrenceId};
use crate::domain::recurrence::Recurrence;

/// Cron-equivalent the health-check is registered with.
///
/// A hook is bound to exactly one recurrence. Scheduling a hook that is
/// already scheduled keeps the existing entry.
#[async_trait::async_trait]
pub trait Scheduler: Send + Sync {
    /// Make an interval known. Re-registering an id replaces its period.
    async fn register_recurrence(&self, recurrence: Recurrence) -> Result<(), SchedulerError>;

    async fn is_scheduled(&self, hook: &HookId) -> Result<bool, SchedulerError>;

    /// Bind `hook` to a registered recurrence. The first run is one period
    /// from now.
    async fn schedule_recurring(
        &self,
        hook: HookId,
        recurrence: &RecurrenceId,
    ) -> Result<(), SchedulerError>;

    /// Unscheduling an unknown hook is a no-op.
    async fn unschedule(&self, hook: &HookId) -> Result<(), SchedulerError>;

    /// Hooks whose next run is at or before `now`. Each returned hook has its
    /// next run moved forward past `now`.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<HookId>, SchedulerError>;
}
