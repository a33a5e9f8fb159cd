//! Error types, one enum per boundary.
//!
//! Budget exhaustion, lock contention and an empty queue are not errors; they
//! surface as [`HandleOutcome`](super::outcome::HandleOutcome) variants.

use thiserror::Error;

use super::ids::RecurrenceId;

/// Failure of the key-value backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store backend: {0}")]
    Backend(String),
}

/// Failure of the recurring scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("recurrence not registered: {0}")]
    UnknownRecurrence(RecurrenceId),

    #[error("scheduler backend: {0}")]
    Backend(String),
}

/// Failure to fire the outbound trigger.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid trigger url: {0}")]
    InvalidUrl(String),

    #[error("http client: {0}")]
    Client(String),
}

/// Failure to produce a token hash.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token hash: {0}")]
    Hash(String),
}

/// Error raised by a task's per-item transform.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Top-level error of the queue engine.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("payload codec for pointer={pointer}: {source}")]
    Codec {
        pointer: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("task failed for pointer={pointer}: {source}")]
    Task {
        pointer: String,
        #[source]
        source: TaskError,
    },

    #[error("handler failed for pointer={pointer}: {source}")]
    Handler {
        pointer: String,
        #[source]
        source: TaskError,
    },

    #[error("request body: {0}")]
    Body(String),

    #[error("pointer already registered: {0}")]
    DuplicatePointer(String),

    #[error("pointer {pointer} shares its key space with {other}")]
    OverlappingPointer { pointer: String, other: String },

    #[error("background join: {0}")]
    Join(String),
}
