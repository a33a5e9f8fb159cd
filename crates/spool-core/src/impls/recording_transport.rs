//! Transport that records triggers instead of sending them.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::Mutex;

use crate::domain::errors::TransportError;
use crate::ports::{Clock, Transport, TriggerReceipt, TriggerRequest};

/// A trigger captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTrigger {
    pub url: Url,
    pub request: TriggerRequest,
}

impl RecordedTrigger {
    /// Value of the `token` query parameter, if any.
    pub fn token(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
    }
}

/// Used by tests and dry runs to observe what would have been fired.
pub struct RecordingTransport {
    clock: Arc<dyn Clock>,
    sent: Mutex<Vec<RecordedTrigger>>,
}

impl RecordingTransport {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn sent(&self) -> Vec<RecordedTrigger> {
        self.sent.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn take(&self) -> Vec<RecordedTrigger> {
        std::mem::take(&mut *self.sent.lock().await)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_nonblocking(
        &self,
        url: Url,
        request: TriggerRequest,
    ) -> Result<TriggerReceipt, TransportError> {
        tracing::debug!(url = %url, "trigger recorded");
        self.sent.lock().await.push(RecordedTrigger {
            url: url.clone(),
            request,
        });
        Ok(TriggerReceipt {
            url,
            sent_at: self.clock.now(),
        })
    }
}
