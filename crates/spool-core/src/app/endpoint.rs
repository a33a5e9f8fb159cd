//! Shared plumbing of a worker endpoint: URL, token, trigger and
//! authorization.

use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;

use super::builder::AppContext;
use crate::domain::errors::{QueueError, TransportError};
use crate::domain::pointer::Pointer;
use crate::ports::{TriggerReceipt, TriggerRequest};

pub(crate) struct JobEndpoint {
    pointer: Pointer,
    ctx: Arc<AppContext>,
}

impl JobEndpoint {
    pub(crate) fn new(ctx: Arc<AppContext>, pointer: Pointer) -> Self {
        Self { pointer, ctx }
    }

    pub(crate) fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    pub(crate) fn ctx(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub(crate) fn route_path(&self) -> String {
        self.pointer.route_path(&self.ctx.server.namespace)
    }

    /// Fresh token for the pointer. Hashing is CPU-bound, so it runs on the
    /// blocking pool.
    async fn token(&self) -> Result<String, QueueError> {
        let tokens = self.ctx.tokens.clone();
        let secret = self.pointer.to_string();
        let token = tokio::task::spawn_blocking(move || tokens.hash(&secret))
            .await
            .map_err(|e| QueueError::Join(e.to_string()))??;
        Ok(token)
    }

    /// Endpoint URL with the `token` query parameter.
    pub(crate) async fn url(&self) -> Result<Url, QueueError> {
        let mut url = self
            .ctx
            .server
            .endpoint(&self.route_path())
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let token = self.token().await?;
        url.query_pairs_mut().append_pair("token", &token);
        Ok(url)
    }

    /// Fire-and-forget POST to this endpoint.
    pub(crate) async fn trigger(&self, body: Value) -> Result<TriggerReceipt, QueueError> {
        let url = self.url().await?;
        let request = TriggerRequest {
            body,
            timeout: self.ctx.server.trigger_timeout,
            verify_tls: self.ctx.server.verify_tls,
        };
        let receipt = self.ctx.transport.post_nonblocking(url, request).await?;
        tracing::debug!(pointer = %self.pointer, path = %receipt.url.path(), "trigger sent");
        Ok(receipt)
    }

    /// Check a presented token against the pointer.
    pub(crate) async fn authorize(&self, token: Option<&str>) -> Result<bool, QueueError> {
        let Some(candidate) = token else {
            tracing::warn!(pointer = %self.pointer, "worker call without token rejected");
            return Ok(false);
        };

        let tokens = self.ctx.tokens.clone();
        let secret = self.pointer.to_string();
        let candidate = candidate.to_string();
        let verified = tokio::task::spawn_blocking(move || tokens.verify(&secret, &candidate))
            .await
            .map_err(|e| QueueError::Join(e.to_string()))?;

        if !verified {
            tracing::warn!(pointer = %self.pointer, "worker token rejected");
        }
        Ok(verified)
    }
}
