//! Outcome types: what a task reports per item, and what a worker pass did.

use serde::{Deserialize, Serialize};

/// Result of running the per-item transform once.
///
/// - `Done`: the item is finished and leaves the batch.
/// - `Retry(next)`: the item stays queued, replaced by `next`. Multi-pass
///   items return a progressed copy of themselves until they are done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "item", rename_all = "snake_case")]
pub enum TaskOutcome<I> {
    Done,
    Retry(I),
}

impl<I> TaskOutcome<I> {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done)
    }
}

/// What one drain pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Batches fetched during the pass.
    pub batches_touched: usize,
    /// Items handed to the transform.
    pub items_processed: usize,
    /// Items that came back `Done`.
    pub items_completed: usize,
    /// The time or memory budget ran out before the queue emptied.
    pub budget_exhausted: bool,
    /// Another worker pass was triggered.
    pub redispatched: bool,
    /// The queue emptied and the health-check was cancelled.
    pub completed: bool,
}

/// Why a worker invocation did or did not drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Token missing or wrong; nothing touched.
    Rejected,
    /// Another pass holds the process lock.
    AlreadyRunning,
    /// No batch is stored for this pointer.
    QueueEmpty,
    /// A one-shot handler ran.
    Handled,
    /// A drain pass ran.
    Drained(DrainReport),
}

impl HandleOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, HandleOutcome::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_outcome_serializes_as_tagged_enum() {
        let done: TaskOutcome<u32> = TaskOutcome::Done;
        let v = serde_json::to_value(&done).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "done"}));

        let retry = TaskOutcome::Retry(11u32);
        let v = serde_json::to_value(&retry).unwrap();
        assert_eq!(v, serde_json::json!({"kind": "retry", "item": 11}));
    }

    #[test]
    fn only_done_is_done() {
        assert!(TaskOutcome::<u8>::Done.is_done());
        assert!(!TaskOutcome::Retry(1u8).is_done());
    }
}
