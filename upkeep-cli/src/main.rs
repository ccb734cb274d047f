use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use upkeep_core::{
    ChecklistKind, Clock, MaintenanceLog, MaintenanceTracker, MemoryStore, ScheduleSpec,
    parse_local_datetime_to_utc,
};

mod config;
mod state;
mod status;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "upkeep", version, about = "Maintenance due-state tracker for usage-tracked equipment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage models (tracked equipment)
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Manage checklists attached to a model
    Checklist {
        #[command(subcommand)]
        command: ChecklistCommand,
    },

    /// Manage checklist actions
    Action {
        #[command(subcommand)]
        command: ActionCommand,
    },

    /// Log usage sessions
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Show due/overdue badges
    Status {
        /// Only this model (default: all)
        #[arg(long)]
        model: Option<String>,
    },

    /// Recompute every action's due state against current usage
    Recompute,

    /// Show or initialize ~/.upkeep/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ModelCommand {
    Add { name: String },
    List,
}

#[derive(Subcommand, Debug)]
enum ChecklistCommand {
    Add {
        #[arg(long)]
        model: String,

        /// pre-session | post-session | maintenance | one-time-maintenance
        #[arg(long)]
        kind: ChecklistKind,

        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum ActionCommand {
    /// Add an action; scheduled actions need --schedule
    Add {
        #[arg(long)]
        checklist: String,

        /// e.g. "every 10 events", "every 3 months", "once 5 hours after install"
        #[arg(long)]
        schedule: Option<ScheduleSpec>,

        description: String,
    },

    /// Mark an action performed at current usage
    Complete {
        id: String,

        /// Local date/time the work was done ("YYYY-MM-DD" or "YYYY-MM-DD HH:MM")
        #[arg(long)]
        at: Option<String>,
    },

    /// Change an action's unit/threshold; the install baseline is kept
    Edit {
        id: String,

        #[arg(long)]
        schedule: ScheduleSpec,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    Log {
        #[arg(long)]
        model: String,

        /// Session length in minutes
        #[arg(long)]
        minutes: f64,

        /// Local start time (default: now)
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let home = state::ensure_upkeep_home()?;
    let cfg = config::load_config(&home)?;
    init_logging(&cfg);

    let ws = Workspace {
        store_path: cfg.store_path(&home),
        home,
        cfg,
    };

    match cli.command {
        Command::Model { command } => match command {
            ModelCommand::Add { name } => {
                let mut tracker = ws.open()?;
                let model = tracker.store_mut().add_model(name.trim());
                ws.save(tracker)?;
                println!("Added model {} [{}]", model.name, model.id);
            }
            ModelCommand::List => {
                let tracker = ws.open()?;
                for model in tracker.store().models() {
                    let checklists = tracker.store().checklists_for(&model.id).count();
                    let sessions = tracker.store().sessions_for(&model.id).count();
                    println!(
                        "{} [{}] checklists={} sessions={}",
                        model.name, model.id, checklists, sessions
                    );
                }
            }
        },

        Command::Checklist { command } => match command {
            ChecklistCommand::Add { model, kind, name } => {
                let mut tracker = ws.open()?;
                let checklist = tracker.store_mut().add_checklist(&model, name.trim(), kind)?;
                ws.save(tracker)?;
                println!(
                    "Added {} checklist {} [{}] to {}",
                    checklist.kind, checklist.name, checklist.id, model
                );
            }
        },

        Command::Action { command } => match command {
            ActionCommand::Add {
                checklist,
                schedule,
                description,
            } => {
                let mut tracker = ws.open()?;
                let id = tracker.add_action(&checklist, description.trim(), schedule.as_ref())?;
                let due = tracker.due_state(&id);
                ws.save(tracker)?;
                match due {
                    Some(state) => println!("Added action [{id}] due at {}", state.projected_at),
                    None => println!("Added action [{id}]"),
                }
            }
            ActionCommand::Complete { id, at } => {
                let at = at.map(|s| ws.parse_local(&s)).transpose()?;
                let mut tracker = ws.open()?;
                let state = tracker.complete_action(&id, at)?;
                let description = tracker.store().action(&id)?.description;
                ws.save(tracker)?;
                match state {
                    Some(state) => println!(
                        "Completed '{}' [{}]; next due at {}",
                        description, id, state.projected_at
                    ),
                    None => println!("Completed '{}' [{}]", description, id),
                }
            }
            ActionCommand::Edit { id, schedule } => {
                let mut tracker = ws.open()?;
                let def = tracker.edit_schedule_expr(&id, &schedule)?;
                ws.save(tracker)?;
                println!("Action [{id}] now {}", def.spec());
            }
        },

        Command::Session { command } => match command {
            SessionCommand::Log { model, minutes, at } => {
                if !minutes.is_finite() || minutes <= 0.0 {
                    bail!("--minutes must be a positive number");
                }
                let started_at = match at {
                    Some(s) => ws.parse_local(&s)?,
                    None => Utc::now(),
                };
                let duration_seconds = (minutes * 60.0).round() as u64;

                let mut tracker = ws.open()?;
                let report = tracker.log_session(&model, started_at, duration_seconds)?;
                let due = tracker.is_maintenance_due(&model)?;
                ws.save(tracker)?;

                println!("Logged {minutes} min session on {model}");
                if due {
                    println!("Maintenance is due: run `upkeep status --model {model}`");
                }
                if !report.inconsistent_actions.is_empty() {
                    println!(
                        "Warning: {} action(s) have inconsistent schedules: {}",
                        report.inconsistent_actions.len(),
                        report.inconsistent_actions.join(", ")
                    );
                }
            }
        },

        Command::Status { model } => {
            let tracker = ws.open()?;
            let models: Vec<_> = match model {
                Some(id) => vec![tracker.store().model(&id)?.clone()],
                None => tracker.store().models().to_vec(),
            };
            if models.is_empty() {
                println!("No models yet. Add one: upkeep model add <name>");
            }
            for model in &models {
                print!("{}", status::render_model(&tracker, model)?);
            }
        }

        Command::Recompute => {
            let mut tracker = ws.open()?;
            let models = tracker.store().model_ids();
            let report = tracker.recompute_all(&models);
            ws.save(tracker)?;
            println!("{}", report.summary());
            for id in &report.skipped_models {
                println!("  skipped model {id}");
            }
            for id in &report.inconsistent_actions {
                println!("  inconsistent action {id}");
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(&ws.home)?,
            ConfigCommand::Show => {
                println!("# {}", config::config_path(&ws.home).display());
                println!("# store file: {}", ws.store_path.display());
                print!("{}", toml::to_string_pretty(&ws.cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn init_logging(cfg: &Config) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    tracing::debug!(build = env!("UPKEEP_BUILD_SHA"), "logging initialized");
}

struct Workspace {
    home: PathBuf,
    cfg: Config,
    store_path: PathBuf,
}

impl Workspace {
    fn open(&self) -> Result<MaintenanceTracker<MemoryStore>> {
        let data = state::load_store(&self.store_path)?;
        Ok(MaintenanceTracker::new(MemoryStore::from_data(data, Clock::System)))
    }

    fn save(&self, tracker: MaintenanceTracker<MemoryStore>) -> Result<()> {
        state::save_store(&self.store_path, &tracker.into_inner().into_data())
    }

    fn parse_local(&self, s: &str) -> Result<DateTime<Utc>> {
        Ok(parse_local_datetime_to_utc(s, &self.cfg.calendar.timezone)?)
    }
}
