//! spool-core
//!
//! Background work triggered over HTTP: a caller stores work, fires a
//! non-blocking request at its own worker endpoint and returns; the endpoint
//! drains the work under a process lock and a time/memory budget.
//!
//! # Modules
//! - **domain**: pointers, batch records, budgets, outcomes, recurrences, errors
//! - **ports**: key-value store, scheduler, transport, clock, token hasher
//! - **impls**: in-memory and file stores, reqwest transport, argon2 tokens
//! - **app**: `AsyncTask`, `BatchQueue`, worker routes, cron runner
//! - **config**: queue and server settings from the environment

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    AppContext, AsyncTask, BatchQueue, BatchTask, ContextBuilder, CronRunner, JobHandler,
    WorkerRoutes,
};
pub use config::{QueueConfig, ServerConfig};
pub use domain::{HandleOutcome, Pointer, QueueError, TaskError, TaskOutcome};
