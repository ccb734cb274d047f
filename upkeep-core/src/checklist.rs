//! Models, checklists and actions as the persistence layer hands them over.
//!
//! Storage (files, sqlite) is a separate layer; these types stay small and
//! serializable.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::Baseline;
use crate::due::DueState;
use crate::error::ScheduleError;
use crate::schedule::{ScheduleDefinition, ScheduleKind};
use crate::usage::{ScheduleUnit, UsageSnapshot};

/// A piece of user-owned equipment whose usage is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistKind {
    PreSession,
    PostSession,
    Maintenance,
    OneTimeMaintenance,
}

impl ChecklistKind {
    /// Maintenance checklists carry scheduled actions and feed the due badge.
    pub fn is_maintenance(self) -> bool {
        matches!(
            self,
            ChecklistKind::Maintenance | ChecklistKind::OneTimeMaintenance
        )
    }

    /// Which schedule kind (if any) actions on this checklist may carry.
    pub fn schedule_kind(self) -> Option<ScheduleKind> {
        match self {
            ChecklistKind::Maintenance => Some(ScheduleKind::Repeating),
            ChecklistKind::OneTimeMaintenance => Some(ScheduleKind::OneTime),
            ChecklistKind::PreSession | ChecklistKind::PostSession => None,
        }
    }
}

impl fmt::Display for ChecklistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChecklistKind::PreSession => "pre-session",
            ChecklistKind::PostSession => "post-session",
            ChecklistKind::Maintenance => "maintenance",
            ChecklistKind::OneTimeMaintenance => "one-time-maintenance",
        };
        f.write_str(s)
    }
}

impl FromStr for ChecklistKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "pre-session" | "pre" => Ok(ChecklistKind::PreSession),
            "post-session" | "post" => Ok(ChecklistKind::PostSession),
            "maintenance" => Ok(ChecklistKind::Maintenance),
            "one-time-maintenance" | "one-time" => Ok(ChecklistKind::OneTimeMaintenance),
            other => Err(format!(
                "unknown checklist kind '{other}' (pre-session, post-session, maintenance, one-time-maintenance)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: String,
    pub model_id: String,
    pub name: String,
    pub kind: ChecklistKind,
}

/// Usage/time snapshot recorded the last time an action was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub completed_at: UsageSnapshot,
}

/// Persisted form of a schedule. Validated into a [`ScheduleDefinition`] on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub kind: ScheduleKind,
    pub unit: ScheduleUnit,
    pub threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Baseline>,
    pub attached_at: UsageSnapshot,
}

impl ScheduleRecord {
    pub fn from_definition(def: &ScheduleDefinition, attached_at: UsageSnapshot) -> Self {
        Self {
            kind: def.kind(),
            unit: def.unit(),
            threshold: def.threshold(),
            baseline: def.baseline().copied(),
            attached_at,
        }
    }

    pub fn definition(&self) -> Result<ScheduleDefinition, ScheduleError> {
        match (self.kind, self.baseline) {
            (ScheduleKind::Repeating, None) => {
                ScheduleDefinition::repeating(self.unit, self.threshold, self.attached_at)
            }
            (ScheduleKind::Repeating, Some(_)) => Err(ScheduleError::BaselineOnRepeating),
            (ScheduleKind::OneTime, Some(baseline)) => {
                ScheduleDefinition::one_time(self.unit, self.threshold, baseline)
            }
            (ScheduleKind::OneTime, None) => Err(ScheduleError::StaleBaseline),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistAction {
    pub id: String,
    pub checklist_id: String,
    pub description: String,
    /// None for pre/post-session steps, which are never due.
    #[serde(default)]
    pub schedule: Option<ScheduleRecord>,
    #[serde(default)]
    pub completion: Option<CompletionRecord>,
    /// Result of the last recompute pass.
    #[serde(default)]
    pub due: Option<DueState>,
}

/// One logged session (flight, run, drive) against a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub model_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u64,
}
