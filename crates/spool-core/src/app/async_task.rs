//! AsyncTask - one authenticated, fire-and-forget worker endpoint.
//!
//! `dispatch()` posts the stored payload to the endpoint and returns at once;
//! the endpoint verifies the token and runs the handler once. There is no
//! persistence and no retry at this layer.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::builder::AppContext;
use super::endpoint::JobEndpoint;
use super::routes::{Verb, Worker, WorkerRequest, WorkerRoutes, read_body};
use crate::domain::errors::{QueueError, TaskError};
use crate::domain::outcome::HandleOutcome;
use crate::domain::pointer::Pointer;
use crate::ports::TriggerReceipt;

/// Action name used when no pointer is given.
pub const DEFAULT_ACTION: &str = "async_job";

/// The one-shot unit of work behind an [`AsyncTask`].
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Payload: Serialize + DeserializeOwned + Send + Sync + 'static;

    async fn handle(&self, payload: Self::Payload) -> Result<(), TaskError>;
}

pub struct AsyncTask<H: JobHandler> {
    endpoint: JobEndpoint,
    handler: H,
    payload: Mutex<Option<H::Payload>>,
}

impl<H: JobHandler> AsyncTask<H> {
    pub fn new(ctx: Arc<AppContext>, pointer: Pointer, handler: H) -> Self {
        Self {
            endpoint: JobEndpoint::new(ctx, pointer),
            handler,
            payload: Mutex::new(None),
        }
    }

    /// Task under the default pointer, `spool_async_job`.
    pub fn with_default_pointer(ctx: Arc<AppContext>, handler: H) -> Self {
        Self::new(ctx, Pointer::with_default_prefix(DEFAULT_ACTION), handler)
    }

    pub fn pointer(&self) -> &Pointer {
        self.endpoint.pointer()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Store the body of the next trigger.
    pub fn set(&self, payload: H::Payload) -> &Self {
        *self.payload.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload);
        self
    }

    /// Mount the worker route on `routes`.
    pub fn register(self: &Arc<Self>, routes: &mut WorkerRoutes) -> Result<(), QueueError> {
        let worker: Arc<dyn Worker> = self.clone();
        routes.mount(Verb::Post, worker)
    }

    /// Fire the trigger. The receipt is informational; the worker's answer is
    /// never awaited.
    pub async fn dispatch(&self) -> Result<TriggerReceipt, QueueError> {
        let body = {
            let payload = self.payload.lock().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_value(&*payload).map_err(|source| QueueError::Codec {
                pointer: self.pointer().to_string(),
                source,
            })?
        };
        self.endpoint.trigger(body).await
    }

    /// Verify the token, then run the handler on the request body.
    ///
    /// A bad token returns [`HandleOutcome::Rejected`] before the body is
    /// read.
    pub async fn maybe_handle(&self, request: WorkerRequest) -> Result<HandleOutcome, QueueError> {
        let (token, body) = request.into_parts();
        if !self.endpoint.authorize(token.as_deref()).await? {
            return Ok(HandleOutcome::Rejected);
        }

        let bytes = read_body(body).await?;
        let decoded = if bytes.is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&bytes)
        };
        let payload = decoded.map_err(|source| QueueError::Codec {
            pointer: self.pointer().to_string(),
            source,
        })?;

        self.handle(payload).await?;
        Ok(HandleOutcome::Handled)
    }

    pub async fn handle(&self, payload: H::Payload) -> Result<(), QueueError> {
        tracing::debug!(pointer = %self.pointer(), "job handler started");
        self.handler
            .handle(payload)
            .await
            .map_err(|source| QueueError::Handler {
                pointer: self.pointer().to_string(),
                source,
            })?;
        tracing::info!(pointer = %self.pointer(), "job handled");
        Ok(())
    }
}

#[async_trait]
impl<H: JobHandler> Worker for AsyncTask<H> {
    fn pointer(&self) -> &Pointer {
        self.endpoint.pointer()
    }

    fn route_path(&self) -> String {
        self.endpoint.route_path()
    }

    async fn maybe_handle(&self, request: WorkerRequest) -> Result<HandleOutcome, QueueError> {
        AsyncTask::maybe_handle(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::fixtures::harness;
    use serde::Deserialize;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        name: String,
    }

    #[derive(Default)]
    struct Recorder {
        seen: AsyncMutex<Vec<Greeting>>,
    }

    #[async_trait]
    impl JobHandler for Recorder {
        type Payload = Greeting;

        async fn handle(&self, payload: Greeting) -> Result<(), TaskError> {
            if payload.name.is_empty() {
                return Err(TaskError::new("empty name"));
            }
            self.seen.lock().await.push(payload);
            Ok(())
        }
    }

    fn body(greeting: &Greeting) -> Vec<u8> {
        serde_json::to_vec(greeting).unwrap()
    }

    #[tokio::test]
    async fn dispatch_posts_payload_with_token() {
        let h = harness();
        let task = AsyncTask::new(h.ctx.clone(), Pointer::new("pmld", "async_job"), Recorder::default());
        task.set(Greeting { name: "ada".into() });

        task.dispatch().await.unwrap();

        let sent = h.transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.path(), "/test/async-job/v1/pmld_async_job");
        assert_eq!(sent[0].request.body, serde_json::json!({"name": "ada"}));
        assert!(!sent[0].request.verify_tls);

        let token = sent[0].token().unwrap();
        assert!(h.ctx.tokens.verify("pmld_async_job", &token));
    }

    #[tokio::test]
    async fn valid_token_runs_handler_once() {
        let h = harness();
        let task = AsyncTask::new(h.ctx.clone(), Pointer::new("pmld", "async_job"), Recorder::default());
        let token = h.ctx.tokens.hash("pmld_async_job").unwrap();
        let greeting = Greeting { name: "ada".into() };

        let outcome = task
            .maybe_handle(WorkerRequest::new(Some(token), body(&greeting)))
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::Handled);
        assert_eq!(*task.handler().seen.lock().await, vec![greeting]);
    }

    #[tokio::test]
    async fn wrong_or_missing_token_is_rejected_without_running() {
        let h = harness();
        let task = AsyncTask::new(h.ctx.clone(), Pointer::new("pmld", "async_job"), Recorder::default());
        let other = h.ctx.tokens.hash("pmld_other_job").unwrap();
        let greeting = Greeting { name: "ada".into() };

        let outcome = task
            .maybe_handle(WorkerRequest::new(Some(other), body(&greeting)))
            .await
            .unwrap();
        assert!(outcome.is_rejected());

        let outcome = task
            .maybe_handle(WorkerRequest::new(None, body(&greeting)))
            .await
            .unwrap();
        assert!(outcome.is_rejected());

        assert!(task.handler().seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn handler_errors_name_the_pointer() {
        let h = harness();
        let task = AsyncTask::new(h.ctx.clone(), Pointer::new("pmld", "async_job"), Recorder::default());
        let token = h.ctx.tokens.hash("pmld_async_job").unwrap();

        let err = task
            .maybe_handle(WorkerRequest::new(Some(token), body(&Greeting { name: String::new() })))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Handler { pointer, .. } if pointer == "pmld_async_job"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_codec_error() {
        let h = harness();
        let task = AsyncTask::new(h.ctx.clone(), Pointer::new("pmld", "async_job"), Recorder::default());
        let token = h.ctx.tokens.hash("pmld_async_job").unwrap();

        let err = task
            .maybe_handle(WorkerRequest::new(Some(token), "{\"nom\": 1}"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Codec { .. }));
    }

    #[test]
    fn default_pointer() {
        let h = harness();
        let task = AsyncTask::with_default_pointer(h.ctx.clone(), Recorder::default());
        assert_eq!(task.pointer().as_str(), "spool_async_job");
    }
}
