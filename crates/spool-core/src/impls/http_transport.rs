//! reqwest-backed trigger transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use crate::domain::errors::TransportError;
use crate::ports::{Clock, Transport, TriggerReceipt, TriggerRequest};

/// Fires triggers on a spawned task so the caller never waits on the network.
///
/// Two clients are kept because TLS verification is fixed per client.
pub struct HttpTransport {
    verifying: reqwest::Client,
    insecure: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl HttpTransport {
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, TransportError> {
        let verifying = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        let insecure = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            verifying,
            insecure,
            clock,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_nonblocking(
        &self,
        url: Url,
        request: TriggerRequest,
    ) -> Result<TriggerReceipt, TransportError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        let client = if request.verify_tls {
            self.verifying.clone()
        } else {
            self.insecure.clone()
        };
        let target = url.clone();
        let path = url.path().to_string();

        tokio::spawn(async move {
            let sent = client
                .post(target)
                .timeout(request.timeout)
                .json(&request.body)
                .send()
                .await;
            // the timeout usually fires before the worker answers; that is expected
            match sent {
                Ok(response) => {
                    tracing::debug!(path = %path, status = %response.status(), "trigger answered");
                }
                Err(e) if e.is_timeout() => {
                    tracing::trace!(path = %path, "trigger left, response not awaited");
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "trigger failed");
                }
            }
        });

        Ok(TriggerReceipt {
            url,
            sent_at: self.clock.now(),
        })
    }
}
