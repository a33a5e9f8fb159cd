//! Batch record: one persisted, ordered chunk of queued items.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::pointer::Pointer;

/// Hex characters of entropy hash appended to the batch prefix.
pub const BATCH_HASH_LEN: usize = 32;

/// Storage key of a batch: `{pointer}_batch_` followed by [`BATCH_HASH_LEN`]
/// hex characters. The prefix is never shortened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchKey(String);

impl BatchKey {
    /// Derive a key from random entropy.
    ///
    /// The entropy is hashed so that keys from concurrent producers of the
    /// same or different pointers do not collide.
    pub fn generate(pointer: &Pointer, entropy: &[u8]) -> Self {
        let digest = hex::encode(Sha256::digest(entropy));
        let mut key = pointer.batch_prefix();
        key.push_str(&digest[..BATCH_HASH_LEN]);
        Self(key)
    }

    /// Part of the key after `pointer`'s batch prefix, if it has that prefix.
    pub fn suffix<'a>(&'a self, pointer: &Pointer) -> Option<&'a str> {
        self.0.strip_prefix(&pointer.batch_prefix())
    }

    /// Wrap a key read back from storage.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted batch.
///
/// `data` keeps push order; the drain loop walks it front to back and writes
/// back whatever is left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch<I> {
    pub key: BatchKey,
    pub data: Vec<I>,
}

impl<I> Batch<I> {
    pub fn new(key: BatchKey, data: Vec<I>) -> Self {
        Self { key, data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_is_prefix_plus_hash() {
        let pointer = Pointer::new("pmld", "async_queue");
        let key = BatchKey::generate(&pointer, b"entropy");

        let hash = key.suffix(&pointer).unwrap();
        assert_eq!(hash.len(), BATCH_HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_entropy_gives_distinct_keys() {
        let pointer = Pointer::new("pmld", "async_queue");
        let a = BatchKey::generate(&pointer, b"one");
        let b = BatchKey::generate(&pointer, b"two");
        assert_ne!(a, b);
    }

    #[test]
    fn long_pointer_keeps_prefix_and_distinct_keys() {
        let pointer = Pointer::new(
            "reporting_pipeline_nightly",
            "regenerate_all_batches_for_every_tenant",
        );
        let keys: std::collections::HashSet<BatchKey> = (0u32..40)
            .map(|i| BatchKey::generate(&pointer, &i.to_le_bytes()))
            .collect();

        assert_eq!(keys.len(), 40);
        for key in &keys {
            assert!(key.as_str().starts_with(&pointer.batch_prefix()));
            assert_eq!(key.suffix(&pointer).map(str::len), Some(BATCH_HASH_LEN));
        }
    }
}
