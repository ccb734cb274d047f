//! Collaborator contracts the engine consumes, plus an in-memory store.
//!
//! Real adapters (sqlite, a mobile app's database) implement the traits; the
//! [`MemoryStore`] backs the CLI's JSON file and the tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checklist::{
    Checklist, ChecklistAction, ChecklistKind, CompletionRecord, Model, ScheduleRecord, Session,
};
use crate::due::DueState;
use crate::error::StoreError;
use crate::usage::UsageSnapshot;

/// Statistics provider: cumulative usage of a model.
pub trait UsageProvider {
    /// None when statistics cannot be supplied (unknown model, lost data).
    fn current_usage(&self, model_id: &str) -> Option<UsageSnapshot>;
}

/// A scheduled action tagged with its owning action id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAction {
    pub action_id: String,
    pub checklist_kind: ChecklistKind,
    pub schedule: ScheduleRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueUpdate {
    pub action_id: String,
    pub state: DueState,
}

/// Read path for schedules and due states, plus the per-model write batch.
pub trait ChecklistStore {
    fn schedules_for_model(&self, model_id: &str) -> Result<Vec<ScheduledAction>, StoreError>;

    fn last_completion(&self, action_id: &str) -> Option<CompletionRecord>;

    /// Due state as of the last completed recompute pass.
    fn due_state(&self, action_id: &str) -> Option<DueState>;

    /// Apply every update for `model_id`, or none of them.
    fn apply_due_states(&mut self, model_id: &str, updates: &[DueUpdate])
    -> Result<(), StoreError>;
}

/// Write path for the user-facing flows (sessions, completions, edits).
pub trait MaintenanceLog {
    fn checklist(&self, checklist_id: &str) -> Result<Checklist, StoreError>;

    fn action(&self, action_id: &str) -> Result<ChecklistAction, StoreError>;

    fn insert_action(
        &mut self,
        checklist_id: &str,
        description: &str,
        schedule: Option<ScheduleRecord>,
    ) -> Result<ChecklistAction, StoreError>;

    fn record_session(&mut self, session: Session) -> Result<(), StoreError>;

    fn record_completion(
        &mut self,
        action_id: &str,
        record: CompletionRecord,
    ) -> Result<(), StoreError>;

    fn replace_schedule(
        &mut self,
        action_id: &str,
        schedule: ScheduleRecord,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }
}

/// Serializable contents of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    #[serde(default)]
    pub actions: Vec<ChecklistAction>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: StoreData,
    clock: Clock,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Clock::System)
    }
}

impl MemoryStore {
    pub fn new(clock: Clock) -> Self {
        Self::from_data(StoreData::default(), clock)
    }

    pub fn from_data(data: StoreData, clock: Clock) -> Self {
        Self { data, clock }
    }

    pub fn data(&self) -> &StoreData {
        &self.data
    }

    pub fn into_data(self) -> StoreData {
        self.data
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    fn next_id(&mut self, prefix: char) -> String {
        self.data.next_id += 1;
        format!("{prefix}{}", self.data.next_id)
    }

    pub fn add_model(&mut self, name: impl Into<String>) -> Model {
        let model = Model {
            id: self.next_id('m'),
            name: name.into(),
            created_at: self.now(),
        };
        self.data.models.push(model.clone());
        model
    }

    pub fn add_checklist(
        &mut self,
        model_id: &str,
        name: impl Into<String>,
        kind: ChecklistKind,
    ) -> Result<Checklist, StoreError> {
        self.model(model_id)?;
        let checklist = Checklist {
            id: self.next_id('c'),
            model_id: model_id.to_string(),
            name: name.into(),
            kind,
        };
        self.data.checklists.push(checklist.clone());
        Ok(checklist)
    }

    pub fn model(&self, model_id: &str) -> Result<&Model, StoreError> {
        self.data
            .models
            .iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| StoreError::UnknownModel(model_id.to_string()))
    }

    pub fn models(&self) -> &[Model] {
        &self.data.models
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.data.models.iter().map(|m| m.id.clone()).collect()
    }

    pub fn checklists_for<'a>(&'a self, model_id: &'a str) -> impl Iterator<Item = &'a Checklist> {
        self.data
            .checklists
            .iter()
            .filter(move |c| c.model_id == model_id)
    }

    pub fn actions_for<'a>(
        &'a self,
        checklist_id: &'a str,
    ) -> impl Iterator<Item = &'a ChecklistAction> {
        self.data
            .actions
            .iter()
            .filter(move |a| a.checklist_id == checklist_id)
    }

    pub fn sessions_for<'a>(&'a self, model_id: &'a str) -> impl Iterator<Item = &'a Session> {
        self.data
            .sessions
            .iter()
            .filter(move |s| s.model_id == model_id)
    }

    fn model_of_action(&self, action_id: &str) -> Result<&str, StoreError> {
        let action = self.action_ref(action_id)?;
        self.data
            .checklists
            .iter()
            .find(|c| c.id == action.checklist_id)
            .map(|c| c.model_id.as_str())
            .ok_or_else(|| StoreError::UnknownChecklist(action.checklist_id.clone()))
    }

    fn action_ref(&self, action_id: &str) -> Result<&ChecklistAction, StoreError> {
        self.data
            .actions
            .iter()
            .find(|a| a.id == action_id)
            .ok_or_else(|| StoreError::UnknownAction(action_id.to_string()))
    }

    fn action_mut(&mut self, action_id: &str) -> Result<&mut ChecklistAction, StoreError> {
        self.data
            .actions
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or_else(|| StoreError::UnknownAction(action_id.to_string()))
    }
}

impl UsageProvider for MemoryStore {
    fn current_usage(&self, model_id: &str) -> Option<UsageSnapshot> {
        self.model(model_id).ok()?;
        let start = UsageSnapshot::zero(self.now());
        Some(
            self.sessions_for(model_id)
                .fold(start, |acc, s| acc.with_session(s.duration_seconds, s.started_at)),
        )
    }
}

impl ChecklistStore for MemoryStore {
    fn schedules_for_model(&self, model_id: &str) -> Result<Vec<ScheduledAction>, StoreError> {
        self.model(model_id)?;
        let mut out = Vec::new();
        for checklist in self.checklists_for(model_id) {
            for action in self.actions_for(&checklist.id) {
                if let Some(schedule) = action.schedule {
                    out.push(ScheduledAction {
                        action_id: action.id.clone(),
                        checklist_kind: checklist.kind,
                        schedule,
                    });
                }
            }
        }
        Ok(out)
    }

    fn last_completion(&self, action_id: &str) -> Option<CompletionRecord> {
        self.action_ref(action_id).ok()?.completion
    }

    fn due_state(&self, action_id: &str) -> Option<DueState> {
        self.action_ref(action_id).ok()?.due
    }

    fn apply_due_states(
        &mut self,
        model_id: &str,
        updates: &[DueUpdate],
    ) -> Result<(), StoreError> {
        // Validate the whole batch before touching anything.
        for update in updates {
            let owner = self.model_of_action(&update.action_id)?;
            if owner != model_id {
                return Err(StoreError::ForeignAction {
                    model_id: model_id.to_string(),
                    action_id: update.action_id.clone(),
                });
            }
        }
        for update in updates {
            self.action_mut(&update.action_id)?.due = Some(update.state);
        }
        Ok(())
    }
}

impl MaintenanceLog for MemoryStore {
    fn checklist(&self, checklist_id: &str) -> Result<Checklist, StoreError> {
        self.data
            .checklists
            .iter()
            .find(|c| c.id == checklist_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownChecklist(checklist_id.to_string()))
    }

    fn action(&self, action_id: &str) -> Result<ChecklistAction, StoreError> {
        self.action_ref(action_id).cloned()
    }

    fn insert_action(
        &mut self,
        checklist_id: &str,
        description: &str,
        schedule: Option<ScheduleRecord>,
    ) -> Result<ChecklistAction, StoreError> {
        self.checklist(checklist_id)?;
        let action = ChecklistAction {
            id: self.next_id('a'),
            checklist_id: checklist_id.to_string(),
            description: description.to_string(),
            schedule,
            completion: None,
            due: None,
        };
        self.data.actions.push(action.clone());
        Ok(action)
    }

    fn record_session(&mut self, session: Session) -> Result<(), StoreError> {
        self.model(&session.model_id)?;
        self.data.sessions.push(session);
        Ok(())
    }

    fn record_completion(
        &mut self,
        action_id: &str,
        record: CompletionRecord,
    ) -> Result<(), StoreError> {
        self.action_mut(action_id)?.completion = Some(record);
        Ok(())
    }

    fn replace_schedule(
        &mut self,
        action_id: &str,
        schedule: ScheduleRecord,
    ) -> Result<(), StoreError> {
        self.action_mut(action_id)?.schedule = Some(schedule);
        Ok(())
    }
}
