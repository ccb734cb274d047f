//! Error types for schedule validation, storage, and the tracker façade.

use thiserror::Error;

use crate::baseline::BaselineAnchor;
use crate::usage::ScheduleUnit;

/// A schedule definition that must never reach the calculator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("threshold must be greater than zero")]
    ZeroThreshold,

    #[error("{unit} schedules cannot be anchored to {anchor}")]
    BaselineMismatch {
        unit: ScheduleUnit,
        anchor: BaselineAnchor,
    },

    #[error("repeating schedules do not take a baseline anchor")]
    BaselineOnRepeating,

    #[error("one-time schedules require a baseline anchor")]
    MissingAnchor,

    #[error("one-time schedule has no captured baseline")]
    StaleBaseline,

    #[error("invalid schedule expression '{0}'")]
    Expression(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("model '{0}' not found")]
    UnknownModel(String),

    #[error("checklist '{0}' not found")]
    UnknownChecklist(String),

    #[error("action '{0}' not found")]
    UnknownAction(String),

    #[error("action '{action_id}' does not belong to model '{model_id}'")]
    ForeignAction { model_id: String, action_id: String },

    #[error("{0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no usage statistics available for model '{0}'")]
    MissingUsage(String),

    #[error("due states of model '{0}' were not recomputed")]
    NotRecomputed(String),
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
