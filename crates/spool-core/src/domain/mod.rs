//! Domain model (pointers, ids, batches, budgets, outcomes, errors).

pub mod batch;
pub mod budget;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod pointer;
pub mod recurrence;

pub use batch::{BATCH_HASH_LEN, Batch, BatchKey};
pub use budget::{Budget, MemoryLimit, MemoryLimitError};
pub use errors::{QueueError, SchedulerError, StoreError, TaskError, TokenError, TransportError};
pub use ids::{HookId, LockToken, RecurrenceId};
pub use outcome::{DrainReport, HandleOutcome, TaskOutcome};
pub use pointer::Pointer;
pub use recurrence::Recurrence;
