//! Badge rendering for `upkeep status`.

use anyhow::Result;
use upkeep_core::{DueLine, MaintenanceTracker, MemoryStore, Model};

pub fn render_line(line: &DueLine) -> String {
    match line.state {
        Some(state) => format!(
            "  {:<8}{:>5}%  {:<32} {:<28} due at {}",
            state.status.badge(),
            state.progress.percent(),
            line.description,
            line.schedule.to_string(),
            state.projected_at
        ),
        None => format!(
            "  {:<8}{:>6}  {:<32} {:<28} (not computed)",
            "?",
            "",
            line.description,
            line.schedule.to_string()
        ),
    }
}

pub fn render_model(tracker: &MaintenanceTracker<MemoryStore>, model: &Model) -> Result<String> {
    let due = tracker.is_maintenance_due(&model.id)?;
    let mut out = format!(
        "{} [{}]: {}\n",
        model.name,
        model.id,
        if due { "maintenance due" } else { "up to date" }
    );

    let lines = tracker.due_report(&model.id)?;
    if lines.is_empty() {
        out.push_str("  (no scheduled actions)\n");
    }
    for line in &lines {
        out.push_str(&render_line(line));
        out.push('\n');
    }
    Ok(out)
}
