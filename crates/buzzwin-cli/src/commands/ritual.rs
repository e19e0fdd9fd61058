//! Ritual management commands for CLI.

use buzzwin_core::ritual::{EffortLevel, NewRitual, RitualUpdate, TimeOfDay};
use buzzwin_core::{parse_rrule, Config, RecurrenceRule, RitualScope, SqliteStore};
use chrono::{NaiveDate, Utc};
use clap::{Subcommand, ValueEnum};
use serde_json::json;

use super::{parse_date, print_json, ritual_service, split_list, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    Public,
    Personalized,
    Global,
}

impl From<ScopeArg> for RitualScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Public => RitualScope::Public,
            ScopeArg::Personalized => RitualScope::Personalized,
            ScopeArg::Global => RitualScope::Global,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EffortArg {
    Low,
    Medium,
    High,
}

impl From<EffortArg> for EffortLevel {
    fn from(arg: EffortArg) -> Self {
        match arg {
            EffortArg::Low => EffortLevel::Low,
            EffortArg::Medium => EffortLevel::Medium,
            EffortArg::High => EffortLevel::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TimeOfDayArg {
    Morning,
    Afternoon,
    Evening,
    Anytime,
}

impl From<TimeOfDayArg> for TimeOfDay {
    fn from(arg: TimeOfDayArg) -> Self {
        match arg {
            TimeOfDayArg::Morning => TimeOfDay::Morning,
            TimeOfDayArg::Afternoon => TimeOfDay::Afternoon,
            TimeOfDayArg::Evening => TimeOfDay::Evening,
            TimeOfDayArg::Anytime => TimeOfDay::Anytime,
        }
    }
}

#[derive(Subcommand)]
pub enum RitualAction {
    /// Create a new ritual
    Create {
        /// Ritual title
        title: String,
        /// Creating user
        #[arg(long)]
        user: String,
        /// Recurrence rule (default: every day)
        #[arg(long, default_value = "FREQ=DAILY")]
        rrule: String,
        /// Visibility
        #[arg(long, value_enum, default_value = "public")]
        scope: ScopeArg,
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long, value_enum, default_value = "low")]
        effort: EffortArg,
        #[arg(long, value_enum, default_value = "anytime")]
        time_of_day: TimeOfDayArg,
        /// Free-form estimate, e.g. "5 minutes"
        #[arg(long)]
        duration: Option<String>,
    },
    /// Get ritual details
    Show {
        id: String,
    },
    /// Edit a ritual (creator only)
    Update {
        id: String,
        /// Editing user
        #[arg(long)]
        user: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long, value_enum)]
        effort: Option<EffortArg>,
        #[arg(long)]
        rrule: Option<String>,
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
    },
    /// List public rituals
    List,
    /// Join a ritual
    Join {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Leave a ritual
    Leave {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Record a completion
    Complete {
        id: String,
        #[arg(long)]
        user: String,
        /// Day the completion counts for (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Impact moment shared with this completion
        #[arg(long)]
        moment: Option<String>,
    },
    /// Rituals due for a user on a date
    Due {
        #[arg(long)]
        user: String,
        /// Date to check (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Assign the global ritual of a day
    SetGlobal {
        id: String,
        /// Day to assign (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

fn rule_arg(rrule: &str) -> Result<RecurrenceRule, String> {
    parse_rrule(rrule).ok_or_else(|| format!("not a recurrence rule: {rrule}"))
}

pub fn run(action: RitualAction) -> CliResult {
    let config = Config::load()?;
    let store = SqliteStore::open()?;
    let svc = ritual_service(&store, &config);
    let now = Utc::now();
    let today = now.date_naive();

    match action {
        RitualAction::Create {
            title,
            user,
            rrule,
            scope,
            description,
            tags,
            effort,
            time_of_day,
            duration,
        } => {
            let input = NewRitual {
                title,
                description: description.unwrap_or_default(),
                tags: split_list(tags.as_deref()),
                effort: effort.into(),
                time_of_day: time_of_day.into(),
                duration: duration.unwrap_or_default(),
                rule: rule_arg(&rrule)?,
                scope: scope.into(),
            };
            let ritual = svc.create_ritual(&user, input, now)?;
            svc.ensure_state(&user, now)?;
            print_json(&ritual)?;
        }
        RitualAction::Show { id } => print_json(&svc.ritual(&id)?)?,
        RitualAction::Update {
            id,
            user,
            title,
            description,
            tags,
            effort,
            rrule,
            scope,
        } => {
            let update = RitualUpdate {
                title,
                description,
                tags: tags.as_deref().map(|t| split_list(Some(t))),
                effort: effort.map(Into::into),
                rule: rrule.as_deref().map(rule_arg).transpose()?,
                scope: scope.map(Into::into),
            };
            print_json(&svc.update_ritual(&id, &user, update, now)?)?;
        }
        RitualAction::List => print_json(&svc.list_public()?)?,
        RitualAction::Join { id, user } => {
            let joined = svc.join(&id, &user, now)?;
            svc.ensure_state(&user, now)?;
            print_json(&json!({ "ritual_id": id, "user_id": user, "joined": joined }))?;
        }
        RitualAction::Leave { id, user } => {
            let left = svc.leave(&id, &user, now)?;
            print_json(&json!({ "ritual_id": id, "user_id": user, "left": left }))?;
        }
        RitualAction::Complete {
            id,
            user,
            date,
            moment,
        } => {
            let date = date.unwrap_or(today);
            let recorded = svc.record_completion(&user, &id, date, moment, now)?;
            let state = svc.ensure_state(&user, now)?;
            print_json(&json!({ "recorded": recorded, "state": state }))?;
        }
        RitualAction::Due { user, date } => {
            print_json(&svc.rituals_due(&user, date.unwrap_or(today))?)?;
        }
        RitualAction::SetGlobal { id, date } => {
            let date = date.unwrap_or(today);
            svc.set_global(date, &id)?;
            print_json(&json!({ "date": date, "ritual_id": id }))?;
        }
    }
    Ok(())
}
