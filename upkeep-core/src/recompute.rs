//! Checklist recompute pass.
//!
//! Walks every scheduled action of a model, recomputes its due state against the
//! model's latest usage snapshot and hands the whole batch to the store in one
//! write. A model either gets every action refreshed or none; other models are
//! unaffected by its failure.

use tracing::{debug, info, warn};

use crate::due::compute;
use crate::error::StoreError;
use crate::store::{ChecklistStore, DueUpdate, UsageProvider};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    pub models_recomputed: usize,
    pub actions_updated: usize,
    /// Models whose usage was unavailable or whose batch the store refused.
    pub skipped_models: Vec<String>,
    /// Actions left at their last known state because their schedule is invalid.
    pub inconsistent_actions: Vec<String>,
}

impl RecomputeReport {
    pub fn skipped(&self) -> usize {
        self.skipped_models.len()
    }

    pub fn merge(&mut self, other: RecomputeReport) {
        self.models_recomputed += other.models_recomputed;
        self.actions_updated += other.actions_updated;
        self.skipped_models.extend(other.skipped_models);
        self.inconsistent_actions.extend(other.inconsistent_actions);
    }

    pub fn summary(&self) -> String {
        format!(
            "recompute: {} models, {} actions updated, {} models skipped, {} inconsistent actions",
            self.models_recomputed,
            self.actions_updated,
            self.skipped(),
            self.inconsistent_actions.len()
        )
    }
}

/// Recompute every scheduled action of one model.
pub fn recompute_model<S>(store: &mut S, model_id: &str) -> RecomputeReport
where
    S: UsageProvider + ChecklistStore,
{
    let mut report = RecomputeReport::default();

    let Some(usage) = store.current_usage(model_id) else {
        warn!(model_id, "no usage statistics; skipping model");
        report.skipped_models.push(model_id.to_string());
        return report;
    };

    let scheduled = match store.schedules_for_model(model_id) {
        Ok(scheduled) => scheduled,
        Err(e) => {
            warn!(model_id, error = %e, "cannot read schedules; skipping model");
            report.skipped_models.push(model_id.to_string());
            return report;
        }
    };

    let mut updates = Vec::with_capacity(scheduled.len());
    for item in scheduled {
        let def = match item.schedule.definition() {
            Ok(def) => def,
            Err(e) => {
                warn!(
                    model_id,
                    action_id = %item.action_id,
                    error = %e,
                    "inconsistent schedule; keeping last known due state"
                );
                report.inconsistent_actions.push(item.action_id);
                continue;
            }
        };

        let completion = store.last_completion(&item.action_id);
        let state = compute(&def, &usage, completion.as_ref());
        debug!(
            model_id,
            action_id = %item.action_id,
            status = ?state.status,
            consumed = state.progress.consumed,
            threshold = state.progress.threshold,
            "recomputed"
        );
        updates.push(DueUpdate {
            action_id: item.action_id,
            state,
        });
    }

    match store.apply_due_states(model_id, &updates) {
        Ok(()) => {
            report.models_recomputed = 1;
            report.actions_updated = updates.len();
            info!(model_id, actions = updates.len(), "due states updated");
        }
        Err(e) => {
            warn!(model_id, error = %e, "due-state batch rejected; model left unchanged");
            report.skipped_models.push(model_id.to_string());
        }
    }

    report
}

/// Recompute every model in `model_ids`, tolerating per-model failures.
pub fn recompute_all<S, I>(store: &mut S, model_ids: I) -> RecomputeReport
where
    S: UsageProvider + ChecklistStore,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut report = RecomputeReport::default();
    for model_id in model_ids {
        report.merge(recompute_model(store, model_id.as_ref()));
    }
    if report.skipped() > 0 {
        warn!(skipped = report.skipped(), "{}", report.summary());
    } else {
        info!("{}", report.summary());
    }
    report
}

/// True iff a maintenance action of the model is currently `Due` or `Overdue`.
///
/// Reads stored states only; it never recomputes.
pub fn is_maintenance_due<S: ChecklistStore>(store: &S, model_id: &str) -> Result<bool, StoreError> {
    let scheduled = store.schedules_for_model(model_id)?;
    Ok(scheduled
        .iter()
        .filter(|s| s.checklist_kind.is_maintenance())
        .filter_map(|s| store.due_state(&s.action_id))
        .any(|state| state.is_due()))
}
