//! Maintenance tracker: the surface the session-logging, maintenance-logging
//! and badge-rendering flows talk to.
//!
//! Every mutation ends with a recompute of the affected model, so stored due
//! states never lag behind the usage snapshot they were computed from. A
//! mutation whose recompute the store refuses fails with
//! [`TrackerError::NotRecomputed`]; the mutation itself has been recorded.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::checklist::{CompletionRecord, ScheduleRecord, Session};
use crate::due::DueState;
use crate::error::{Result, StoreError, TrackerError};
use crate::recompute::{self, RecomputeReport};
use crate::schedule::{ScheduleDefinition, ScheduleSpec};
use crate::store::{ChecklistStore, MaintenanceLog, UsageProvider};
use crate::usage::{ScheduleUnit, UsageSnapshot};

/// One line of a model's due report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueLine {
    pub action_id: String,
    pub description: String,
    pub schedule: ScheduleSpec,
    pub state: Option<DueState>,
}

#[derive(Debug, Clone)]
pub struct MaintenanceTracker<S> {
    store: S,
}

impl<S> MaintenanceTracker<S>
where
    S: UsageProvider + ChecklistStore + MaintenanceLog,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn model_of_action(&self, action_id: &str) -> Result<String> {
        let action = self.store.action(action_id)?;
        Ok(self.store.checklist(&action.checklist_id)?.model_id)
    }

    fn refresh(&mut self, model_id: &str) -> Result<RecomputeReport> {
        let report = recompute::recompute_model(&mut self.store, model_id);
        if report.skipped() > 0 {
            return Err(TrackerError::NotRecomputed(model_id.to_string()));
        }
        Ok(report)
    }

    fn usage(&self, model_id: &str) -> Result<UsageSnapshot> {
        self.store
            .current_usage(model_id)
            .ok_or_else(|| TrackerError::MissingUsage(model_id.to_string()))
    }

    /// Attach an action to a checklist. The install snapshot (and for one-time
    /// schedules the baseline) is captured here and never again.
    pub fn add_action(
        &mut self,
        checklist_id: &str,
        description: &str,
        spec: Option<&ScheduleSpec>,
    ) -> Result<String> {
        let checklist = self.store.checklist(checklist_id)?;

        let record = match spec {
            None => None,
            Some(spec) => {
                spec.validate()?;
                if checklist.kind.schedule_kind() != Some(spec.kind) {
                    return Err(StoreError::Rejected(format!(
                        "a {} checklist cannot hold '{}' actions",
                        checklist.kind, spec
                    ))
                    .into());
                }
                let install = self.usage(&checklist.model_id)?;
                let def = ScheduleDefinition::install(spec, &install)?;
                Some(ScheduleRecord::from_definition(&def, install))
            }
        };

        let action = self.store.insert_action(checklist_id, description, record)?;
        info!(action_id = %action.id, checklist_id, "action added");
        self.refresh(&checklist.model_id)?;
        Ok(action.id)
    }

    pub fn log_session(
        &mut self,
        model_id: &str,
        started_at: DateTime<Utc>,
        duration_seconds: u64,
    ) -> Result<RecomputeReport> {
        self.store.record_session(Session {
            model_id: model_id.to_string(),
            started_at,
            duration_seconds,
        })?;
        info!(model_id, duration_seconds, "session logged");
        self.refresh(model_id)
    }

    /// Mark an action performed at the model's current usage. `at` backdates
    /// the calendar part of the record.
    pub fn complete_action(
        &mut self,
        action_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Option<DueState>> {
        let model_id = self.model_of_action(action_id)?;
        let mut snapshot = self.usage(&model_id)?;
        if let Some(at) = at {
            snapshot.as_of = at;
        }

        self.store.record_completion(
            action_id,
            CompletionRecord {
                completed_at: snapshot,
            },
        )?;
        info!(action_id, model_id = %model_id, "action completed");
        self.refresh(&model_id)?;
        Ok(self.store.due_state(action_id))
    }

    /// Change unit and threshold of a scheduled action. The captured baseline
    /// stays as it was; a unit it cannot measure is refused.
    pub fn edit_schedule(
        &mut self,
        action_id: &str,
        unit: ScheduleUnit,
        threshold: u32,
    ) -> Result<ScheduleDefinition> {
        let action = self.store.action(action_id)?;
        let record = action.schedule.ok_or_else(|| {
            StoreError::Rejected(format!("action '{action_id}' has no schedule"))
        })?;

        let edited = record.definition()?.edit(unit, threshold)?;
        self.store
            .replace_schedule(action_id, ScheduleRecord::from_definition(&edited, record.attached_at))?;

        let model_id = self.model_of_action(action_id)?;
        info!(action_id, model_id = %model_id, %unit, threshold, "schedule edited");
        self.refresh(&model_id)?;
        Ok(edited)
    }

    /// Edit from a full expression; the kind must stay the same.
    pub fn edit_schedule_expr(&mut self, action_id: &str, spec: &ScheduleSpec) -> Result<ScheduleDefinition> {
        spec.validate()?;
        let current = self
            .store
            .action(action_id)?
            .schedule
            .map(|r| r.kind);
        if current.is_some_and(|kind| kind != spec.kind) {
            return Err(StoreError::Rejected(format!(
                "action '{action_id}' cannot change schedule kind"
            ))
            .into());
        }
        self.edit_schedule(action_id, spec.unit, spec.threshold)
    }

    pub fn due_state(&self, action_id: &str) -> Option<DueState> {
        self.store.due_state(action_id)
    }

    pub fn recompute_all<I>(&mut self, model_ids: I) -> RecomputeReport
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        recompute::recompute_all(&mut self.store, model_ids)
    }

    pub fn is_maintenance_due(&self, model_id: &str) -> Result<bool> {
        Ok(recompute::is_maintenance_due(&self.store, model_id)?)
    }

    /// Scheduled actions of a model, most urgent first.
    pub fn due_report(&self, model_id: &str) -> Result<Vec<DueLine>> {
        let mut lines = Vec::new();
        for item in self.store.schedules_for_model(model_id)? {
            let action = self.store.action(&item.action_id)?;
            let record = item.schedule;
            let schedule = match record.definition() {
                Ok(def) => def.spec(),
                Err(e) => {
                    warn!(
                        model_id,
                        action_id = %item.action_id,
                        error = %e,
                        "inconsistent schedule in report"
                    );
                    ScheduleSpec {
                        kind: record.kind,
                        unit: record.unit,
                        threshold: record.threshold,
                        anchor: record.baseline.map(|b| b.anchor()),
                    }
                }
            };
            lines.push(DueLine {
                action_id: item.action_id,
                description: action.description,
                schedule,
                state: action.due,
            });
        }

        lines.sort_by(|a, b| {
            let rank = |l: &DueLine| l.state.map(|s| (s.status, s.progress));
            rank(b).cmp(&rank(a))
        });
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{Checklist, ChecklistAction, ChecklistKind};
    use crate::due::DueStatus;
    use crate::schedule::ScheduleKind;
    use crate::store::{Clock, DueUpdate, MemoryStore, ScheduledAction};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap()
    }

    fn tracker() -> (MaintenanceTracker<MemoryStore>, String) {
        let mut store = MemoryStore::new(Clock::Fixed(t0()));
        let model = store.add_model("Cub");
        (MaintenanceTracker::new(store), model.id)
    }

    #[test]
    fn session_logging_recomputes() {
        let (mut tr, model) = tracker();
        let svc = tr
            .store_mut()
            .add_checklist(&model, "Service", ChecklistKind::Maintenance)
            .unwrap();
        let spec: ScheduleSpec = "every 2 events".parse().unwrap();
        let id = tr.add_action(&svc.id, "Inspect servos", Some(&spec)).unwrap();
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::NotDue);

        tr.log_session(&model, t0(), 300).unwrap();
        tr.log_session(&model, t0(), 300).unwrap();
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::Due);
        assert!(tr.is_maintenance_due(&model).unwrap());

        tr.complete_action(&id, None).unwrap();
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::NotDue);
        assert!(!tr.is_maintenance_due(&model).unwrap());
    }

    #[test]
    fn one_time_completion_retires_action() {
        let (mut tr, model) = tracker();
        let once = tr
            .store_mut()
            .add_checklist(&model, "Break-in", ChecklistKind::OneTimeMaintenance)
            .unwrap();
        let spec: ScheduleSpec = "once 1 event after install".parse().unwrap();
        let id = tr.add_action(&once.id, "Retighten prop nut", Some(&spec)).unwrap();

        tr.log_session(&model, t0(), 60).unwrap();
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::Due);

        tr.complete_action(&id, None).unwrap();
        for _ in 0..5 {
            tr.log_session(&model, t0(), 60).unwrap();
        }
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::NotDue);
    }

    #[test]
    fn schedule_kind_must_match_checklist() {
        let (mut tr, model) = tracker();
        let svc = tr
            .store_mut()
            .add_checklist(&model, "Service", ChecklistKind::Maintenance)
            .unwrap();
        let pre = tr
            .store_mut()
            .add_checklist(&model, "Preflight", ChecklistKind::PreSession)
            .unwrap();
        let once: ScheduleSpec = "once 5 days after install".parse().unwrap();

        assert!(matches!(
            tr.add_action(&svc.id, "x", Some(&once)),
            Err(TrackerError::Store(StoreError::Rejected(_)))
        ));
        assert!(tr.add_action(&pre.id, "x", Some(&once)).is_err());
        let plain = tr.add_action(&pre.id, "Range check", None).unwrap();
        assert_eq!(tr.due_state(&plain), None);
    }

    #[test]
    fn editing_threshold_keeps_baseline_and_recomputes() {
        let (mut tr, model) = tracker();
        tr.log_session(&model, t0(), 60).unwrap();
        let once = tr
            .store_mut()
            .add_checklist(&model, "Break-in", ChecklistKind::OneTimeMaintenance)
            .unwrap();
        let spec: ScheduleSpec = "once 4 events after install".parse().unwrap();
        let id = tr.add_action(&once.id, "Check gear mesh", Some(&spec)).unwrap();
        let before = tr.store().action(&id).unwrap().schedule.unwrap().baseline;

        for _ in 0..2 {
            tr.log_session(&model, t0(), 60).unwrap();
        }
        let edited = tr.edit_schedule(&id, ScheduleUnit::Events, 2).unwrap();
        assert_eq!(edited.baseline().copied(), before);
        assert_eq!(tr.store().action(&id).unwrap().schedule.unwrap().baseline, before);
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::Due);

        assert!(tr.edit_schedule(&id, ScheduleUnit::Months, 2).is_err());
        assert!(tr.edit_schedule(&id, ScheduleUnit::Events, 0).is_err());
        let repeating: ScheduleSpec = "every 2 events".parse().unwrap();
        assert!(tr.edit_schedule_expr(&id, &repeating).is_err());
    }

    #[test]
    fn due_report_orders_overdue_first() {
        let (mut tr, model) = tracker();
        let svc = tr
            .store_mut()
            .add_checklist(&model, "Service", ChecklistKind::Maintenance)
            .unwrap();
        let every1: ScheduleSpec = "every 1 event".parse().unwrap();
        let every2: ScheduleSpec = "every 2 events".parse().unwrap();
        let monthly: ScheduleSpec = "every 1 month".parse().unwrap();
        let due = tr.add_action(&svc.id, "due", Some(&every2)).unwrap();
        let calm = tr.add_action(&svc.id, "calm", Some(&monthly)).unwrap();
        let overdue = tr.add_action(&svc.id, "overdue", Some(&every1)).unwrap();

        tr.log_session(&model, t0() + Duration::hours(1), 60).unwrap();
        tr.log_session(&model, t0() + Duration::hours(2), 60).unwrap();

        let order: Vec<String> = tr
            .due_report(&model)
            .unwrap()
            .into_iter()
            .map(|l| l.action_id)
            .collect();
        assert_eq!(order, vec![overdue, due, calm]);
    }

    #[test]
    fn missing_usage_is_reported() {
        let (mut tr, _) = tracker();
        assert!(matches!(
            tr.log_session("m404", t0(), 60),
            Err(TrackerError::Store(StoreError::UnknownModel(_)))
        ));
    }

    #[test]
    fn one_time_early_completion_still_comes_due() {
        let (mut tr, model) = tracker();
        let once = tr
            .store_mut()
            .add_checklist(&model, "Break-in", ChecklistKind::OneTimeMaintenance)
            .unwrap();
        let spec: ScheduleSpec = "once 3 events after install".parse().unwrap();
        let id = tr.add_action(&once.id, "Retorque wing bolts", Some(&spec)).unwrap();

        tr.log_session(&model, t0(), 60).unwrap();
        tr.complete_action(&id, None).unwrap();
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::NotDue);

        tr.log_session(&model, t0(), 60).unwrap();
        tr.log_session(&model, t0(), 60).unwrap();
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::Due);

        tr.complete_action(&id, None).unwrap();
        tr.log_session(&model, t0(), 60).unwrap();
        assert_eq!(tr.due_state(&id).unwrap().status, DueStatus::NotDue);
    }

    #[test]
    fn due_report_lists_corrupt_schedules() {
        let (mut tr, model) = tracker();
        let svc = tr
            .store_mut()
            .add_checklist(&model, "Service", ChecklistKind::Maintenance)
            .unwrap();
        let spec: ScheduleSpec = "every 1 event".parse().unwrap();
        let good = tr.add_action(&svc.id, "Lube chain", Some(&spec)).unwrap();
        let corrupt = tr
            .store_mut()
            .insert_action(
                &svc.id,
                "Broken",
                Some(ScheduleRecord {
                    kind: ScheduleKind::Repeating,
                    unit: ScheduleUnit::Events,
                    threshold: 0,
                    baseline: None,
                    attached_at: UsageSnapshot::zero(t0()),
                }),
            )
            .unwrap()
            .id;

        let report = tr.log_session(&model, t0(), 60).unwrap();
        assert_eq!(report.inconsistent_actions, vec![corrupt.clone()]);

        let lines = tr.due_report(&model).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].action_id, good);
        assert_eq!(lines[1].action_id, corrupt);
        assert_eq!(lines[1].schedule.threshold, 0);
        assert_eq!(lines[1].state, None);
    }

    /// Delegates to a [`MemoryStore`] but refuses every due-state batch.
    struct RefusingStore(MemoryStore);

    impl UsageProvider for RefusingStore {
        fn current_usage(&self, model_id: &str) -> Option<UsageSnapshot> {
            self.0.current_usage(model_id)
        }
    }

    impl ChecklistStore for RefusingStore {
        fn schedules_for_model(&self, model_id: &str) -> Result<Vec<ScheduledAction>, StoreError> {
            self.0.schedules_for_model(model_id)
        }

        fn last_completion(&self, action_id: &str) -> Option<CompletionRecord> {
            self.0.last_completion(action_id)
        }

        fn due_state(&self, action_id: &str) -> Option<DueState> {
            self.0.due_state(action_id)
        }

        fn apply_due_states(&mut self, _: &str, _: &[DueUpdate]) -> Result<(), StoreError> {
            Err(StoreError::Rejected("read-only".into()))
        }
    }

    impl MaintenanceLog for RefusingStore {
        fn checklist(&self, checklist_id: &str) -> Result<Checklist, StoreError> {
            self.0.checklist(checklist_id)
        }

        fn action(&self, action_id: &str) -> Result<ChecklistAction, StoreError> {
            self.0.action(action_id)
        }

        fn insert_action(
            &mut self,
            checklist_id: &str,
            description: &str,
            schedule: Option<ScheduleRecord>,
        ) -> Result<ChecklistAction, StoreError> {
            self.0.insert_action(checklist_id, description, schedule)
        }

        fn record_session(&mut self, session: Session) -> Result<(), StoreError> {
            self.0.record_session(session)
        }

        fn record_completion(
            &mut self,
            action_id: &str,
            record: CompletionRecord,
        ) -> Result<(), StoreError> {
            self.0.record_completion(action_id, record)
        }

        fn replace_schedule(
            &mut self,
            action_id: &str,
            schedule: ScheduleRecord,
        ) -> Result<(), StoreError> {
            self.0.replace_schedule(action_id, schedule)
        }
    }

    #[test]
    fn refused_recompute_fails_the_mutation() {
        let (tr, model) = tracker();
        let mut store = tr.into_inner();
        let svc = store
            .add_checklist(&model, "Service", ChecklistKind::Maintenance)
            .unwrap();
        let mut tr = MaintenanceTracker::new(RefusingStore(store));

        let spec: ScheduleSpec = "every 1 event".parse().unwrap();
        assert!(matches!(
            tr.add_action(&svc.id, "Lube chain", Some(&spec)),
            Err(TrackerError::NotRecomputed(ref m)) if *m == model
        ));
        assert_eq!(tr.store().0.actions_for(&svc.id).count(), 1);

        assert!(matches!(
            tr.log_session(&model, t0(), 60),
            Err(TrackerError::NotRecomputed(_))
        ));
        let id = tr.store().0.actions_for(&svc.id).next().unwrap().id.clone();
        assert!(matches!(
            tr.complete_action(&id, None),
            Err(TrackerError::NotRecomputed(_))
        ));
        assert_eq!(tr.due_state(&id), None);
    }
}
