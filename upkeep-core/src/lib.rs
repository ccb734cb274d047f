//! upkeep-core: checklist action due-state engine for usage-tracked equipment

pub mod baseline;
pub mod checklist;
pub mod due;
pub mod error;
pub mod recompute;
pub mod schedule;
pub mod store;
pub mod time;
pub mod tracker;
pub mod usage;

pub use baseline::{Baseline, BaselineAnchor, resolve};
pub use checklist::{
    Checklist, ChecklistAction, ChecklistKind, CompletionRecord, Model, ScheduleRecord, Session,
};
pub use due::{DuePoint, DueState, DueStatus, Progress, compute};
pub use error::{ScheduleError, StoreError, TrackerError};
pub use recompute::{RecomputeReport, is_maintenance_due, recompute_all, recompute_model};
pub use schedule::{Cadence, ScheduleDefinition, ScheduleKind, ScheduleSpec};
pub use store::{
    ChecklistStore, Clock, DueUpdate, MaintenanceLog, MemoryStore, ScheduledAction, StoreData,
    UsageProvider,
};
pub use time::{TimeError, parse_local_datetime_to_utc};
pub use tracker::{DueLine, MaintenanceTracker};
pub use usage::{ScheduleUnit, UsageSnapshot, delta};
