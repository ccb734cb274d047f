//! Usage counter: normalizes a model's accrued usage into the base units the
//! due-state engine understands.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{days_between, months_between};

/// Point-in-time read of a model's accrued usage. Never mutated by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub event_count: u64,
    pub operating_seconds: u64,
    pub as_of: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn new(event_count: u64, operating_seconds: u64, as_of: DateTime<Utc>) -> Self {
        Self {
            event_count,
            operating_seconds,
            as_of,
        }
    }

    pub fn zero(as_of: DateTime<Utc>) -> Self {
        Self::new(0, 0, as_of)
    }

    /// Operating time in whole minutes (truncated).
    pub fn operating_minutes(&self) -> u64 {
        self.operating_seconds / 60
    }

    /// Calendar date the snapshot was read on (UTC).
    pub fn date(&self) -> NaiveDate {
        self.as_of.date_naive()
    }

    /// The snapshot after one more session of `duration_seconds`.
    pub fn with_session(&self, duration_seconds: u64, as_of: DateTime<Utc>) -> Self {
        Self {
            event_count: self.event_count.saturating_add(1),
            operating_seconds: self.operating_seconds.saturating_add(duration_seconds),
            as_of: as_of.max(self.as_of),
        }
    }
}

/// Measurement axis of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleUnit {
    Events,
    OperatingMinutes,
    Days,
    Weeks,
    Months,
}

impl ScheduleUnit {
    pub const ALL: [ScheduleUnit; 5] = [
        ScheduleUnit::Events,
        ScheduleUnit::OperatingMinutes,
        ScheduleUnit::Days,
        ScheduleUnit::Weeks,
        ScheduleUnit::Months,
    ];

    /// Calendar units are measured from `as_of`; the rest from the usage counters.
    pub fn is_calendar(self) -> bool {
        matches!(
            self,
            ScheduleUnit::Days | ScheduleUnit::Weeks | ScheduleUnit::Months
        )
    }

    pub fn noun(self, amount: u64) -> &'static str {
        let one = amount == 1;
        match self {
            ScheduleUnit::Events if one => "event",
            ScheduleUnit::Events => "events",
            ScheduleUnit::OperatingMinutes if one => "minute",
            ScheduleUnit::OperatingMinutes => "minutes",
            ScheduleUnit::Days if one => "day",
            ScheduleUnit::Days => "days",
            ScheduleUnit::Weeks if one => "week",
            ScheduleUnit::Weeks => "weeks",
            ScheduleUnit::Months if one => "month",
            ScheduleUnit::Months => "months",
        }
    }
}

impl fmt::Display for ScheduleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduleUnit::Events => "events",
            ScheduleUnit::OperatingMinutes => "operating-minutes",
            ScheduleUnit::Days => "days",
            ScheduleUnit::Weeks => "weeks",
            ScheduleUnit::Months => "months",
        };
        f.write_str(s)
    }
}

/// Units of `unit` consumed between `reference` and `current`.
///
/// Regressions (corrected statistics, clock skew) clamp to zero.
pub fn delta(current: &UsageSnapshot, reference: &UsageSnapshot, unit: ScheduleUnit) -> u64 {
    match unit {
        ScheduleUnit::Events => current.event_count.saturating_sub(reference.event_count),
        ScheduleUnit::OperatingMinutes => {
            current
                .operating_seconds
                .saturating_sub(reference.operating_seconds)
                / 60
        }
        ScheduleUnit::Days => days_between(reference.date(), current.date()),
        ScheduleUnit::Weeks => days_between(reference.date(), current.date()) / 7,
        ScheduleUnit::Months => months_between(reference.date(), current.date()),
    }
}
