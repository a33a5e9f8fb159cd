//! Strongly-typed identifiers.
//!
//! Two families share the phantom-marker pattern:
//! - [`Name<T>`]: stable string names (schedule hooks, recurrence intervals).
//!   The marker keeps a hook name from being passed where an interval name is
//!   expected, which the string-keyed cron tables this replaces could not do.
//! - [`Id<T>`]: ULID-backed ids generated at runtime (process lock tokens).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait giving each id family a display prefix.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// A stable, human-chosen name tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Name<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// ULID-backed id; sortable by creation time.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Milliseconds since the epoch encoded in the ULID.
    pub fn timestamp_ms(&self) -> u64 {
        self.ulid.timestamp_ms()
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// Markers
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hook {}

impl IdMarker for Hook {
    fn prefix() -> &'static str {
        "hook-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {}

impl IdMarker for Interval {
    fn prefix() -> &'static str {
        "interval-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lock {}

impl IdMarker for Lock {
    fn prefix() -> &'static str {
        "lock-"
    }
}

/// Name of a bound schedule hook (what fires).
pub type HookId = Name<Hook>;

/// Name of a registered recurrence (how often it fires).
pub type RecurrenceId = Name<Interval>;

/// Marker written into the process lock record by the pass that owns it.
pub type LockToken = Id<Lock>;
