//! Process memory probes.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use sysinfo::{Pid, System};

use crate::ports::MemoryProbe;

/// Resident set size of the current process, via `sysinfo`.
pub struct SystemMemoryProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = %e, "current pid unavailable; memory budget disabled");
                None
            }
        };
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn current_usage(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let Ok(mut system) = self.system.lock() else {
            tracing::error!("memory probe lock poisoned");
            return 0;
        };
        system.refresh_process(pid);
        system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

/// Probe reporting a settable value.
#[derive(Debug, Default)]
pub struct FixedMemoryProbe {
    bytes: AtomicU64,
}

impl FixedMemoryProbe {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
        }
    }

    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn current_usage(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_probe_sees_this_process() {
        let probe = SystemMemoryProbe::new();
        assert!(probe.current_usage() > 0);
    }

    #[test]
    fn fixed_probe_reports_what_it_was_told() {
        let probe = FixedMemoryProbe::new(10);
        assert_eq!(probe.current_usage(), 10);
        probe.set(900);
        assert_eq!(probe.current_usage(), 900);
    }
}
