//! Schedule definitions: what an action's recurrence policy is.
//!
//! Users author a [`ScheduleSpec`] (kind, unit, threshold, optional anchor).
//! Installing it on a model validates it and captures whatever zero-point the
//! kind needs, producing an immutable [`ScheduleDefinition`]. Invalid pairings
//! never get past `install`, so the calculator never sees them.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::baseline::{self, Baseline, BaselineAnchor};
use crate::error::ScheduleError;
use crate::usage::{ScheduleUnit, UsageSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Every N units, measured from the last completion.
    Repeating,
    /// Once, N units after a baseline. Never re-arms.
    OneTime,
}

/// User-authored schedule, before it is attached to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub kind: ScheduleKind,
    pub unit: ScheduleUnit,
    pub threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<BaselineAnchor>,
}

impl ScheduleSpec {
    pub fn repeating(unit: ScheduleUnit, threshold: u32) -> Self {
        Self {
            kind: ScheduleKind::Repeating,
            unit,
            threshold,
            anchor: None,
        }
    }

    /// One-time schedule anchored on the install value of `unit`'s axis.
    pub fn one_time(unit: ScheduleUnit, threshold: u32) -> Self {
        Self {
            kind: ScheduleKind::OneTime,
            unit,
            threshold,
            anchor: Some(BaselineAnchor::for_unit(unit)),
        }
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.threshold == 0 {
            return Err(ScheduleError::ZeroThreshold);
        }
        match (self.kind, self.anchor) {
            (ScheduleKind::Repeating, Some(_)) => Err(ScheduleError::BaselineOnRepeating),
            (ScheduleKind::Repeating, None) => Ok(()),
            (ScheduleKind::OneTime, None) => Err(ScheduleError::MissingAnchor),
            (ScheduleKind::OneTime, Some(anchor)) if !anchor.accepts(self.unit) => {
                Err(ScheduleError::BaselineMismatch {
                    unit: self.unit,
                    anchor,
                })
            }
            (ScheduleKind::OneTime, Some(_)) => Ok(()),
        }
    }
}

/// Parse unit words; returns the unit and a multiplier into that unit.
fn parse_unit_word(word: &str) -> Option<(ScheduleUnit, u32)> {
    let unit = match word.to_lowercase().as_str() {
        "event" | "events" | "session" | "sessions" | "flight" | "flights" => {
            (ScheduleUnit::Events, 1)
        }
        "min" | "mins" | "minute" | "minutes" => (ScheduleUnit::OperatingMinutes, 1),
        "hr" | "hrs" | "hour" | "hours" => (ScheduleUnit::OperatingMinutes, 60),
        "day" | "days" => (ScheduleUnit::Days, 1),
        "week" | "weeks" => (ScheduleUnit::Weeks, 1),
        "month" | "months" => (ScheduleUnit::Months, 1),
        _ => return None,
    };
    Some(unit)
}

const EXPRESSION_PATTERN: &str = r"(?i)^\s*(every|once)\s+(\d+)\s+([a-z]+)(\s+after\s+install)?\s*$";

static EXPRESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EXPRESSION_PATTERN).expect("valid regex"));

/// Accepts `every <N> <unit>` and `once <N> <unit> after install`.
impl FromStr for ScheduleSpec {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ScheduleError::Expression(s.trim().to_string());
        let caps = EXPRESSION_RE.captures(s).ok_or_else(bad)?;

        let repeating = caps[1].eq_ignore_ascii_case("every");
        let after_install = caps.get(4).is_some();
        if repeating == after_install {
            return Err(bad());
        }

        let amount: u32 = caps[2].parse().map_err(|_| bad())?;
        let (unit, factor) = parse_unit_word(&caps[3]).ok_or_else(bad)?;
        let threshold = amount.checked_mul(factor).ok_or_else(bad)?;

        let spec = if repeating {
            ScheduleSpec::repeating(unit, threshold)
        } else {
            ScheduleSpec::one_time(unit, threshold)
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = u64::from(self.threshold);
        match self.kind {
            ScheduleKind::Repeating => write!(f, "every {} {}", n, self.unit.noun(n)),
            ScheduleKind::OneTime => {
                write!(f, "once {} {} after install", n, self.unit.noun(n))
            }
        }
    }
}

/// Where a definition counts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Until the first completion, counting starts when the action was attached.
    Repeating { attached_at: UsageSnapshot },
    OneTime { baseline: Baseline },
}

/// Validated, installed schedule. Unit/baseline pairing holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDefinition {
    unit: ScheduleUnit,
    threshold: NonZeroU32,
    cadence: Cadence,
}

impl ScheduleDefinition {
    pub fn repeating(
        unit: ScheduleUnit,
        threshold: u32,
        attached_at: UsageSnapshot,
    ) -> Result<Self, ScheduleError> {
        Ok(Self {
            unit,
            threshold: NonZeroU32::new(threshold).ok_or(ScheduleError::ZeroThreshold)?,
            cadence: Cadence::Repeating { attached_at },
        })
    }

    pub fn one_time(
        unit: ScheduleUnit,
        threshold: u32,
        baseline: Baseline,
    ) -> Result<Self, ScheduleError> {
        let threshold = NonZeroU32::new(threshold).ok_or(ScheduleError::ZeroThreshold)?;
        let anchor = baseline.anchor();
        if !anchor.accepts(unit) {
            return Err(ScheduleError::BaselineMismatch { unit, anchor });
        }
        Ok(Self {
            unit,
            threshold,
            cadence: Cadence::OneTime { baseline },
        })
    }

    /// Validate `spec` and attach it at `install`, capturing a one-time
    /// schedule's baseline.
    pub fn install(spec: &ScheduleSpec, install: &UsageSnapshot) -> Result<Self, ScheduleError> {
        spec.validate()?;
        match (spec.kind, spec.anchor) {
            (ScheduleKind::OneTime, Some(anchor)) => {
                Self::one_time(spec.unit, spec.threshold, baseline::resolve(anchor, install))
            }
            (ScheduleKind::OneTime, None) => Err(ScheduleError::MissingAnchor),
            (ScheduleKind::Repeating, _) => Self::repeating(spec.unit, spec.threshold, *install),
        }
    }

    /// Administrative edit of unit and threshold. The captured baseline (or
    /// attach point) is carried over untouched.
    pub fn edit(&self, unit: ScheduleUnit, threshold: u32) -> Result<Self, ScheduleError> {
        match self.cadence {
            Cadence::Repeating { attached_at } => Self::repeating(unit, threshold, attached_at),
            Cadence::OneTime { baseline } => Self::one_time(unit, threshold, baseline),
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        match self.cadence {
            Cadence::Repeating { .. } => ScheduleKind::Repeating,
            Cadence::OneTime { .. } => ScheduleKind::OneTime,
        }
    }

    pub fn unit(&self) -> ScheduleUnit {
        self.unit
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.get()
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        match &self.cadence {
            Cadence::OneTime { baseline } => Some(baseline),
            Cadence::Repeating { .. } => None,
        }
    }

    pub fn spec(&self) -> ScheduleSpec {
        ScheduleSpec {
            kind: self.kind(),
            unit: self.unit,
            threshold: self.threshold(),
            anchor: self.baseline().map(Baseline::anchor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn install() -> UsageSnapshot {
        UsageSnapshot::new(12, 3_000, Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap())
    }

    #[test]
    fn zero_threshold_rejected_for_every_combination() {
        for unit in ScheduleUnit::ALL {
            assert_eq!(
                ScheduleSpec::repeating(unit, 0).validate(),
                Err(ScheduleError::ZeroThreshold)
            );
            assert_eq!(
                ScheduleSpec::one_time(unit, 0).validate(),
                Err(ScheduleError::ZeroThreshold)
            );
            assert_eq!(
                ScheduleDefinition::repeating(unit, 0, install()),
                Err(ScheduleError::ZeroThreshold)
            );
            let baseline = baseline::resolve(BaselineAnchor::for_unit(unit), &install());
            assert_eq!(
                ScheduleDefinition::one_time(unit, 0, baseline),
                Err(ScheduleError::ZeroThreshold)
            );
        }
    }

    #[test]
    fn calendar_unit_with_usage_baseline_rejected() {
        let spec = ScheduleSpec {
            kind: ScheduleKind::OneTime,
            unit: ScheduleUnit::Months,
            threshold: 6,
            anchor: Some(BaselineAnchor::EventCountAtInstall),
        };
        assert!(matches!(
            spec.validate(),
            Err(ScheduleError::BaselineMismatch { .. })
        ));

        let err = ScheduleDefinition::one_time(ScheduleUnit::Events, 5, Baseline::InstallDate(install().as_of));
        assert!(matches!(err, Err(ScheduleError::BaselineMismatch { .. })));
    }

    #[test]
    fn repeating_with_anchor_rejected() {
        let mut spec = ScheduleSpec::repeating(ScheduleUnit::Events, 5);
        spec.anchor = Some(BaselineAnchor::EventCountAtInstall);
        assert_eq!(spec.validate(), Err(ScheduleError::BaselineOnRepeating));
    }

    #[test]
    fn install_captures_baseline_once() {
        let spec = ScheduleSpec::one_time(ScheduleUnit::OperatingMinutes, 120);
        let def = ScheduleDefinition::install(&spec, &install()).unwrap();
        assert_eq!(def.baseline(), Some(&Baseline::OperatingSeconds(3_000)));
        assert_eq!(def.spec(), spec);
    }

    #[test]
    fn editing_threshold_keeps_baseline() {
        let spec = ScheduleSpec::one_time(ScheduleUnit::Events, 20);
        let def = ScheduleDefinition::install(&spec, &install()).unwrap();

        let edited = def.edit(ScheduleUnit::Events, 50).unwrap();
        assert_eq!(edited.threshold(), 50);
        assert_eq!(edited.baseline(), def.baseline());

        // A unit the captured baseline cannot measure is refused.
        assert!(def.edit(ScheduleUnit::Days, 50).is_err());
    }

    #[test]
    fn parses_expressions() {
        let s: ScheduleSpec = "every 10 events".parse().unwrap();
        assert_eq!(s, ScheduleSpec::repeating(ScheduleUnit::Events, 10));

        let s: ScheduleSpec = "Every 2 hours".parse().unwrap();
        assert_eq!(s, ScheduleSpec::repeating(ScheduleUnit::OperatingMinutes, 120));

        let s: ScheduleSpec = "once 3 months after install".parse().unwrap();
        assert_eq!(s, ScheduleSpec::one_time(ScheduleUnit::Months, 3));
        assert_eq!(s.anchor, Some(BaselineAnchor::InstallDate));

        let s: ScheduleSpec = "once 1 flight after install".parse().unwrap();
        assert_eq!(s.anchor, Some(BaselineAnchor::EventCountAtInstall));
    }

    #[test]
    fn rejects_bad_expressions() {
        for bad in [
            "every 10",
            "every ten events",
            "every 10 parsecs",
            "once 10 events",
            "every 10 events after install",
            "every -3 days",
        ] {
            assert!(
                matches!(bad.parse::<ScheduleSpec>(), Err(ScheduleError::Expression(_))),
                "{bad}"
            );
        }
        assert_eq!("every 0 days".parse::<ScheduleSpec>(), Err(ScheduleError::ZeroThreshold));
    }

    #[test]
    fn display_round_trips() {
        for expr in ["every 1 event", "every 90 minutes", "once 6 months after install"] {
            let spec: ScheduleSpec = expr.parse().unwrap();
            assert_eq!(spec.to_string(), expr);
        }
    }
}
