//! MemoryProbe port - resident memory of the current process.

pub trait MemoryProbe: Send + Sync {
    /// Bytes currently used by this process.
    fn current_usage(&self) -> u64;
}
