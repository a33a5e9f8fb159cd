//! Ports - the queue's view of the outside world.
//!
//! Each trait is a boundary to a host collaborator (key-value store, cron,
//! HTTP client, password hasher, process memory). The queue logic depends on
//! these traits only; `impls/` provides in-process and HTTP adapters.

pub mod clock;
pub mod id_generator;
pub mod memory;
pub mod scheduler;
pub mod store;
pub mod token;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::memory::MemoryProbe;
pub use self::scheduler::Scheduler;
pub use self::store::{KeyValueStore, Record};
pub use self::token::TokenHasher;
pub use self::transport::{Transport, TriggerReceipt, TriggerRequest};
