//! Recurrence: a named interval the scheduler can fire hooks on.
//!
//! Convenience schedules are plain constructor functions that each build one
//! [`Recurrence`] value; there is no per-schedule type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RecurrenceId;

pub const MINUTE: Duration = Duration::from_secs(60);
pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A registered interval: stable id, period, and a label for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub id: RecurrenceId,
    pub interval: Duration,
    pub display: String,
}

impl Recurrence {
    pub fn new(id: impl Into<String>, interval: Duration, display: impl Into<String>) -> Self {
        Self {
            id: RecurrenceId::new(id),
            interval,
            display: display.into(),
        }
    }

    /// Same period, different id. Used to give a queue its own interval name.
    pub fn renamed(mut self, id: RecurrenceId) -> Self {
        self.id = id;
        self
    }

    /// The instant `count` periods after `from`. A zero count is treated as one.
    pub fn next_after(&self, from: DateTime<Utc>, count: u32) -> DateTime<Utc> {
        let periods = count.max(1);
        self.interval
            .checked_mul(periods)
            .and_then(|span| chrono::Duration::from_std(span).ok())
            .and_then(|step| from.checked_add_signed(step))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Every `n` minutes. `n` below one is treated as one.
pub fn every_minutes(n: u32) -> Recurrence {
    let n = n.max(1);
    let (id, display) = match n {
        1 => ("every-minute".to_string(), "Every Minute".to_string()),
        n => (format!("every-{n}-minutes"), format!("Every {n} Minutes")),
    };
    Recurrence::new(id, MINUTE * n, display)
}

pub fn hourly() -> Recurrence {
    Recurrence::new("hourly", HOUR, "Hourly")
}

pub fn daily() -> Recurrence {
    Recurrence::new("daily", DAY, "Daily")
}

pub fn weekly() -> Recurrence {
    Recurrence::new("weekly", WEEK, "Weekly")
}

pub fn monthly() -> Recurrence {
    Recurrence::new("monthly", MONTH, "Monthly")
}

pub fn quarterly() -> Recurrence {
    Recurrence::new("quarterly", MONTH * 3, "Quarterly")
}

pub fn yearly() -> Recurrence {
    Recurrence::new("yearly", YEAR, "Yearly")
}

/// The stock recurrences a scheduler knows about out of the box.
pub fn catalog() -> Vec<Recurrence> {
    vec![
        every_minutes(1),
        every_minutes(5),
        every_minutes(10),
        every_minutes(15),
        every_minutes(30),
        hourly(),
        daily(),
        weekly(),
        monthly(),
        quarterly(),
        yearly(),
    ]
}
