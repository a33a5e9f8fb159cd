//! IdGenerator port - lock tokens and batch-key entropy.
//!
//! # Implementations
//! - **UlidGenerator**: ULID from the clock plus `rand` for the random part

use ulid::Ulid;

use crate::domain::ids::LockToken;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    /// Marker written into the lock record by the pass that owns it.
    fn lock_token(&self) -> LockToken;

    /// Random bytes a batch key is derived from.
    fn entropy(&self) -> [u8; 32];
}

/// ULID-based generator.
///
/// Takes a Clock so that tests with a FixedClock get predictable timestamps.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn lock_token(&self) -> LockToken {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        LockToken::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    fn entropy(&self) -> [u8; 32] {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let mut bytes: [u8; 32] = rand::random();
        bytes[..16].copy_from_slice(&Ulid::from_parts(timestamp_ms, rand::random()).to_bytes());
        bytes
    }
}
