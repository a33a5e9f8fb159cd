//! Impls - adapters for the ports.
//!
//! # Included
//! - **InMemoryStore** / **FileStore**: key-value stores
//! - **InMemoryScheduler**: recurring hooks driven by the cron runner
//! - **HttpTransport**: reqwest trigger; **RecordingTransport** for tests
//! - **Argon2Hasher**: worker token hashing
//! - **SystemMemoryProbe** / **FixedMemoryProbe**: process memory

pub mod argon2_token;
pub mod file_store;
pub mod http_transport;
pub mod memory_probe;
pub mod memory_scheduler;
pub mod memory_store;
pub mod recording_transport;

pub use self::argon2_token::Argon2Hasher;
pub use self::file_store::FileStore;
pub use self::http_transport::HttpTransport;
pub use self::memory_probe::{FixedMemoryProbe, SystemMemoryProbe};
pub use self::memory_scheduler::InMemoryScheduler;
pub use self::memory_store::InMemoryStore;
pub use self::recording_transport::{RecordedTrigger, RecordingTransport};
