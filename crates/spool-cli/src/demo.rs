//! Workers served by the binary out of the box.

use async_trait::async_trait;
use serde_json::Value;
use spool_core::{BatchTask, JobHandler, TaskError, TaskOutcome};

/// Logs each queued line; lines prefixed with `+` are re-queued once
/// without the prefix.
pub struct LineLogger;

#[async_trait]
impl BatchTask for LineLogger {
    type Item = String;

    async fn task(&self, item: &String) -> Result<TaskOutcome<String>, TaskError> {
        if let Some(rest) = item.strip_prefix('+') {
            return Ok(TaskOutcome::Retry(rest.to_string()));
        }
        tracing::info!(line = %item, "line processed");
        Ok(TaskOutcome::Done)
    }
}

/// Logs whatever payload the one-shot endpoint receives.
pub struct PayloadLogger;

#[async_trait]
impl JobHandler for PayloadLogger {
    type Payload = Value;

    async fn handle(&self, payload: Value) -> Result<(), TaskError> {
        tracing::info!(payload = %payload, "job payload received");
        Ok(())
    }
}
