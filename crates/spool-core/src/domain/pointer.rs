//! Pointer: the stable identifier of a task type and every name derived from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{HookId, RecurrenceId};

/// Default prefix for pointers built without an explicit one.
pub const DEFAULT_PREFIX: &str = "spool";

/// Route segment every worker endpoint lives under.
pub const ROUTE_VERSION: &str = "async-job/v1";

/// Stable identifier of a task/queue type.
///
/// The pointer namespaces storage keys, the process lock, the health-check
/// hook and the worker route. Two queue types sharing a pointer would drain
/// each other's batches, so the route table refuses duplicates. It also
/// refuses pointers whose key spaces overlap: every key of `x_batch` starts
/// with `x_batch_`, the batch prefix of `x`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pointer(String);

impl Pointer {
    /// Build `"{prefix}_{action}"`.
    pub fn new(prefix: &str, action: &str) -> Self {
        Self(format!("{prefix}_{action}"))
    }

    /// Pointer under [`DEFAULT_PREFIX`].
    pub fn with_default_prefix(action: &str) -> Self {
        Self::new(DEFAULT_PREFIX, action)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every batch record of this queue starts with this prefix.
    pub fn batch_prefix(&self) -> String {
        format!("{}_batch_", self.0)
    }

    /// Where records that no longer decode as a batch are moved.
    pub fn dead_prefix(&self) -> String {
        format!("{}_dead_", self.0)
    }

    /// True when one pointer's batch scan would pick up keys of the other.
    pub fn overlaps(&self, other: &Pointer) -> bool {
        let own = self.batch_prefix();
        let theirs = other.batch_prefix();
        own.starts_with(&theirs) || theirs.starts_with(&own)
    }

    pub fn lock_key(&self) -> String {
        format!("{}_process_lock", self.0)
    }

    pub fn cron_hook(&self) -> HookId {
        HookId::new(format!("{}_cron", self.0))
    }

    pub fn cron_interval(&self) -> RecurrenceId {
        RecurrenceId::new(format!("{}_cron_interval", self.0))
    }

    /// `/{namespace}/async-job/v1/{pointer}`
    pub fn route_path(&self, namespace: &str) -> String {
        let namespace = namespace.trim_matches('/');
        if namespace.is_empty() {
            format!("/{ROUTE_VERSION}/{}", self.0)
        } else {
            format!("/{namespace}/{ROUTE_VERSION}/{}", self.0)
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Pointer {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
