//! Baseline resolver for one-time schedules.
//!
//! A one-time action fires `threshold` units after a zero-point captured when
//! the action is attached to a model. The capture happens exactly once; the
//! resulting [`Baseline`] has no setters and survives schedule edits.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::usage::{ScheduleUnit, UsageSnapshot};

/// Which part of the install snapshot a one-time schedule is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineAnchor {
    EventCountAtInstall,
    OperatingTimeAtInstall,
    InstallDate,
}

impl BaselineAnchor {
    /// The only anchor a schedule measured in `unit` can be paired with.
    pub fn for_unit(unit: ScheduleUnit) -> Self {
        match unit {
            ScheduleUnit::Events => BaselineAnchor::EventCountAtInstall,
            ScheduleUnit::OperatingMinutes => BaselineAnchor::OperatingTimeAtInstall,
            ScheduleUnit::Days | ScheduleUnit::Weeks | ScheduleUnit::Months => {
                BaselineAnchor::InstallDate
            }
        }
    }

    pub fn accepts(self, unit: ScheduleUnit) -> bool {
        self == Self::for_unit(unit)
    }
}

impl fmt::Display for BaselineAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BaselineAnchor::EventCountAtInstall => "event count at install",
            BaselineAnchor::OperatingTimeAtInstall => "operating time at install",
            BaselineAnchor::InstallDate => "install date",
        };
        f.write_str(s)
    }
}

/// Captured zero-point of a one-time schedule. Holds only the anchored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "anchor", content = "value", rename_all = "snake_case")]
pub enum Baseline {
    EventCount(u64),
    OperatingSeconds(u64),
    InstallDate(DateTime<Utc>),
}

impl Baseline {
    pub fn anchor(&self) -> BaselineAnchor {
        match self {
            Baseline::EventCount(_) => BaselineAnchor::EventCountAtInstall,
            Baseline::OperatingSeconds(_) => BaselineAnchor::OperatingTimeAtInstall,
            Baseline::InstallDate(_) => BaselineAnchor::InstallDate,
        }
    }

    /// Reference snapshot for delta computation.
    ///
    /// Fields outside the anchor are zeroed; they are never read because a
    /// definition's unit always matches its baseline's anchor.
    pub fn reference(&self) -> UsageSnapshot {
        match *self {
            Baseline::EventCount(n) => UsageSnapshot::new(n, 0, DateTime::<Utc>::default()),
            Baseline::OperatingSeconds(s) => UsageSnapshot::new(0, s, DateTime::<Utc>::default()),
            Baseline::InstallDate(at) => UsageSnapshot::zero(at),
        }
    }
}

/// Capture the anchored part of `install`.
///
/// Called once, when the action is attached to its model.
pub fn resolve(anchor: BaselineAnchor, install: &UsageSnapshot) -> Baseline {
    match anchor {
        BaselineAnchor::EventCountAtInstall => Baseline::EventCount(install.event_count),
        BaselineAnchor::OperatingTimeAtInstall => {
            Baseline::OperatingSeconds(install.operating_seconds)
        }
        BaselineAnchor::InstallDate => Baseline::InstallDate(install.as_of),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn install() -> UsageSnapshot {
        UsageSnapshot::new(42, 7_200, Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap())
    }

    #[test]
    fn resolve_keeps_only_the_anchored_field() {
        assert_eq!(
            resolve(BaselineAnchor::EventCountAtInstall, &install()),
            Baseline::EventCount(42)
        );
        assert_eq!(
            resolve(BaselineAnchor::OperatingTimeAtInstall, &install()),
            Baseline::OperatingSeconds(7_200)
        );
        assert_eq!(
            resolve(BaselineAnchor::InstallDate, &install()),
            Baseline::InstallDate(install().as_of)
        );
    }

    #[test]
    fn anchor_pairing_is_exact() {
        assert!(BaselineAnchor::EventCountAtInstall.accepts(ScheduleUnit::Events));
        assert!(!BaselineAnchor::EventCountAtInstall.accepts(ScheduleUnit::OperatingMinutes));
        assert!(!BaselineAnchor::InstallDate.accepts(ScheduleUnit::Events));
        for unit in [ScheduleUnit::Days, ScheduleUnit::Weeks, ScheduleUnit::Months] {
            assert!(BaselineAnchor::InstallDate.accepts(unit));
            assert!(!BaselineAnchor::OperatingTimeAtInstall.accepts(unit));
        }
    }

    #[test]
    fn baseline_wire_shape() {
        let json = serde_json::to_string(&Baseline::EventCount(3)).unwrap();
        assert_eq!(json, r#"{"anchor":"event_count","value":3}"#);

        let back: Baseline = serde_json::from_str(&json).unwrap();
        assert_eq!(back.anchor(), BaselineAnchor::EventCountAtInstall);
    }
}
