//! Resource budget of one worker pass: wall-clock time and process memory.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ceiling assumed when the configured memory limit is unlimited.
pub const UNLIMITED_MEMORY_BYTES: u64 = 32_000 * 1024 * 1024;

/// Share of the memory ceiling a pass may use before it stops.
pub const DEFAULT_MEMORY_FRACTION: f64 = 0.9;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid memory limit: {0:?} (expected e.g. 128M, 2G, 65536 or -1)")]
pub struct MemoryLimitError(String);

/// Configured memory ceiling.
///
/// Parses the familiar ini shorthand: a byte count with an optional `K`, `M`
/// or `G` suffix, with `-1` (or an empty value) meaning unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryLimit {
    #[default]
    Unlimited,
    Bytes(u64),
}

impl MemoryLimit {
    pub fn megabytes(mb: u64) -> Self {
        MemoryLimit::Bytes(mb * 1024 * 1024)
    }

    /// Effective ceiling in bytes; unlimited degrades to a large fixed value.
    pub fn ceiling_bytes(self) -> u64 {
        match self {
            MemoryLimit::Unlimited => UNLIMITED_MEMORY_BYTES,
            MemoryLimit::Bytes(bytes) => bytes,
        }
    }
}

impl FromStr for MemoryLimit {
    type Err = MemoryLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Ok(MemoryLimit::Unlimited);
        }
        if raw.starts_with('-') {
            return raw
                .parse::<i64>()
                .map(|_| MemoryLimit::Unlimited)
                .map_err(|_| MemoryLimitError(s.to_string()));
        }

        let (digits, multiplier) = match raw.chars().last().map(|c| c.to_ascii_uppercase()) {
            Some('K') => (&raw[..raw.len() - 1], 1024),
            Some('M') => (&raw[..raw.len() - 1], 1024 * 1024),
            Some('G') => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
            _ => (raw, 1),
        };

        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| MemoryLimitError(s.to_string()))?;
        value
            .checked_mul(multiplier)
            .map(MemoryLimit::Bytes)
            .ok_or_else(|| MemoryLimitError(s.to_string()))
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryLimit::Unlimited => f.write_str("-1"),
            MemoryLimit::Bytes(bytes) => write!(f, "{bytes}"),
        }
    }
}

/// Budget of one drain pass, fixed when the pass takes the lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budget {
    started_at: DateTime<Utc>,
    time_limit: Duration,
    memory_threshold: u64,
}

impl Budget {
    pub fn start(
        started_at: DateTime<Utc>,
        time_limit: Duration,
        memory_limit: MemoryLimit,
        memory_fraction: f64,
    ) -> Self {
        let fraction = memory_fraction.clamp(0.0, 1.0);
        let memory_threshold = (memory_limit.ceiling_bytes() as f64 * fraction) as u64;
        Self {
            started_at,
            time_limit,
            memory_threshold,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.time_limit)
            .ok()
            .and_then(|limit| self.started_at.checked_add_signed(limit))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn memory_threshold(&self) -> u64 {
        self.memory_threshold
    }

    pub fn time_exceeded(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline()
    }

    pub fn memory_exceeded(&self, usage_bytes: u64) -> bool {
        usage_bytes >= self.memory_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case::unlimited("-1", MemoryLimit::Unlimited)]
    #[case::empty("", MemoryLimit::Unlimited)]
    #[case::megabytes("128M", MemoryLimit::Bytes(128 * 1024 * 1024))]
    #[case::lowercase("256m", MemoryLimit::Bytes(256 * 1024 * 1024))]
    #[case::kilobytes("512K", MemoryLimit::Bytes(512 * 1024))]
    #[case::gigabytes("2G", MemoryLimit::Bytes(2 * 1024 * 1024 * 1024))]
    #[case::plain_bytes("65536", MemoryLimit::Bytes(65536))]
    fn parses_ini_shorthand(#[case] raw: &str, #[case] expected: MemoryLimit) {
        assert_eq!(raw.parse::<MemoryLimit>().unwrap(), expected);
    }

    #[rstest]
    #[case("lots")]
    #[case("12X")]
    #[case("-abc")]
    fn rejects_garbage(#[case] raw: &str) {
        assert!(raw.parse::<MemoryLimit>().is_err());
    }

    #[test]
    fn unlimited_degrades_to_fixed_ceiling() {
        assert_eq!(MemoryLimit::Unlimited.ceiling_bytes(), 32_000 * 1024 * 1024);
    }

    #[test]
    fn time_budget_is_measured_from_start() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let budget = Budget::start(start, Duration::from_secs(20), MemoryLimit::Unlimited, 0.9);

        assert!(!budget.time_exceeded(start));
        assert!(!budget.time_exceeded(start + chrono::Duration::seconds(19)));
        assert!(budget.time_exceeded(start + chrono::Duration::seconds(20)));
    }

    #[test]
    fn memory_budget_is_ninety_percent_of_ceiling() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let budget = Budget::start(start, Duration::from_secs(20), MemoryLimit::Bytes(1000), 0.9);

        assert_eq!(budget.memory_threshold(), 900);
        assert!(!budget.memory_exceeded(899));
        assert!(budget.memory_exceeded(900));
    }
}
