//! Due-state calculator.
//!
//! Pure function of (definition, current usage, last completion). Nothing here
//! performs I/O or keeps state, so it is safe to call from any number of readers.
//!
//! Algorithm:
//! 1) pick the reference snapshot: last completion (or attach point) for
//!    repeating schedules, the captured baseline for one-time schedules
//! 2) consumed = delta(current, reference, unit)
//! 3) progress = consumed / threshold, kept as an exact ratio
//! 4) status from whole cycles elapsed (one-time never goes past `Due`,
//!    and is retired by a completion at or past its due point)
//! 5) project the due point as reference + threshold in the schedule's unit

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::checklist::CompletionRecord;
use crate::schedule::{Cadence, ScheduleDefinition};
use crate::time::{add_days, add_whole_months};
use crate::usage::{ScheduleUnit, UsageSnapshot, delta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    NotDue,
    Due,
    /// A repeating action that missed at least one full cycle.
    Overdue,
}

impl DueStatus {
    pub fn is_due(self) -> bool {
        self != DueStatus::NotDue
    }

    pub fn badge(self) -> &'static str {
        match self {
            DueStatus::NotDue => "ok",
            DueStatus::Due => "DUE",
            DueStatus::Overdue => "OVERDUE",
        }
    }
}

/// Consumed units over threshold, compared exactly (no float rounding).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Progress {
    pub consumed: u64,
    pub threshold: u32,
}

impl Progress {
    pub fn new(consumed: u64, threshold: u32) -> Self {
        Self {
            consumed,
            threshold: threshold.max(1),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.consumed as f64 / self.denominator() as f64
    }

    /// Number of full thresholds consumed.
    pub fn whole_cycles(&self) -> u64 {
        self.consumed / self.denominator()
    }

    pub fn percent(&self) -> u64 {
        self.consumed.saturating_mul(100) / self.denominator()
    }

    // Stored states may come back from disk with a zero threshold.
    fn denominator(&self) -> u64 {
        u64::from(self.threshold.max(1))
    }

    fn cross(&self, other: &Self) -> (u128, u128) {
        (
            u128::from(self.consumed) * u128::from(other.denominator()),
            u128::from(other.consumed) * u128::from(self.denominator()),
        )
    }
}

impl PartialEq for Progress {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = self.cross(other);
        a == b
    }
}

impl Eq for Progress {}

impl PartialOrd for Progress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Progress {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = self.cross(other);
        a.cmp(&b)
    }
}

/// The usage or calendar point at which an action becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "at", rename_all = "snake_case")]
pub enum DuePoint {
    Events(u64),
    OperatingSeconds(u64),
    Date(NaiveDate),
}

impl DuePoint {
    pub fn project(reference: &UsageSnapshot, unit: ScheduleUnit, threshold: u32) -> Self {
        let n = u64::from(threshold);
        match unit {
            ScheduleUnit::Events => DuePoint::Events(reference.event_count.saturating_add(n)),
            ScheduleUnit::OperatingMinutes => {
                DuePoint::OperatingSeconds(reference.operating_seconds.saturating_add(n * 60))
            }
            ScheduleUnit::Days => {
                DuePoint::Date(add_days(reference.date(), n).unwrap_or(NaiveDate::MAX))
            }
            ScheduleUnit::Weeks => {
                DuePoint::Date(add_days(reference.date(), n * 7).unwrap_or(NaiveDate::MAX))
            }
            ScheduleUnit::Months => DuePoint::Date(
                add_whole_months(reference.date(), threshold).unwrap_or(NaiveDate::MAX),
            ),
        }
    }

    /// Whether `snapshot` is at or beyond this point.
    pub fn reached_by(&self, snapshot: &UsageSnapshot) -> bool {
        match *self {
            DuePoint::Events(n) => snapshot.event_count >= n,
            DuePoint::OperatingSeconds(s) => snapshot.operating_seconds >= s,
            DuePoint::Date(d) => snapshot.date() >= d,
        }
    }
}

impl fmt::Display for DuePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DuePoint::Events(n) if n == 1 => write!(f, "{n} event"),
            DuePoint::Events(n) => write!(f, "{n} events"),
            DuePoint::OperatingSeconds(s) if s % 3600 == 0 => {
                write!(f, "{} operating hours", s / 3600)
            }
            DuePoint::OperatingSeconds(s) => write!(f, "{} operating minutes", s / 60),
            DuePoint::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Derived, never authoritative: recompute whenever usage advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueState {
    pub status: DueStatus,
    pub progress: Progress,
    pub projected_at: DuePoint,
}

impl DueState {
    pub fn is_due(&self) -> bool {
        self.status.is_due()
    }
}

/// Compute the due state of one action.
pub fn compute(
    def: &ScheduleDefinition,
    current: &UsageSnapshot,
    completion: Option<&CompletionRecord>,
) -> DueState {
    let reference = match def.cadence() {
        Cadence::Repeating { attached_at } => completion
            .map(|c| c.completed_at)
            .unwrap_or(*attached_at),
        Cadence::OneTime { baseline } => baseline.reference(),
    };

    let consumed = delta(current, &reference, def.unit());
    let progress = Progress::new(consumed, def.threshold());
    let projected_at = DuePoint::project(&reference, def.unit(), def.threshold());

    let status = match def.cadence() {
        Cadence::OneTime { .. }
            if completion.is_some_and(|c| projected_at.reached_by(&c.completed_at)) =>
        {
            DueStatus::NotDue
        }
        Cadence::OneTime { .. } => match progress.whole_cycles() {
            0 => DueStatus::NotDue,
            _ => DueStatus::Due,
        },
        Cadence::Repeating { .. } => match progress.whole_cycles() {
            0 => DueStatus::NotDue,
            1 => DueStatus::Due,
            _ => DueStatus::Overdue,
        },
    };

    DueState {
        status,
        progress,
        projected_at,
    }
}
