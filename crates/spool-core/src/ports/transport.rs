//! Transport port: the fire-and-forget trigger call.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::Value;

use crate::domain::errors::TransportError;

/// Outbound trigger: JSON body plus the knobs the sender must honor.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRequest {
    pub body: Value,
    /// Upper bound on how long the request may stay in flight.
    pub timeout: Duration,
    /// Disabled for loopback calls against self-signed certificates.
    pub verify_tls: bool,
}

/// What the caller learns from a trigger. The worker's response is never
/// awaited, so this only records that the request left.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerReceipt {
    pub url: Url,
    pub sent_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fire a POST without waiting for the worker. Implementations return as
    /// soon as the request is handed off.
    async fn post_nonblocking(
        &self,
        url: Url,
        request: TriggerRequest,
    ) -> Result<TriggerReceipt, TransportError>;
}
