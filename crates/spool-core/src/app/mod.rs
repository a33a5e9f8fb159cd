//! App - queue engine built on the ports.
//!
//! # Components
//! - **ContextBuilder / AppContext**: wiring of the shared ports
//! - **AsyncTask**: one authenticated fire-and-forget endpoint
//! - **BatchQueue**: persisted batches drained under a lock and a budget
//! - **WorkerRoutes**: axum routes for the worker endpoints
//! - **CronRunner**: fires due health-check hooks

pub mod async_task;
pub mod batch_queue;
pub mod builder;
pub mod cron;
mod endpoint;
pub mod lock;
pub mod routes;
pub mod status;

#[cfg(test)]
pub(crate) mod fixtures;

pub use self::async_task::{AsyncTask, JobHandler};
pub use self::batch_queue::{BatchQueue, BatchTask};
pub use self::builder::{AppContext, BuildError, ContextBuilder};
pub use self::cron::{CronHandle, CronHook, CronRunner};
pub use self::lock::{LockRecord, ProcessLock};
pub use self::routes::{Verb, Worker, WorkerRequest, WorkerResponse, WorkerRoutes};
pub use self::status::QueueStatus;
