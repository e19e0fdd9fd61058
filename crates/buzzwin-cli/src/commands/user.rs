//! User account, preference and streak commands.

use buzzwin_core::ritual::UserAccount;
use buzzwin_core::{ClockTime, Config, SqliteStore};
use chrono::{NaiveDate, Utc};
use clap::Subcommand;

use super::{parse_date, print_json, ritual_service, CliResult};

#[derive(Subcommand)]
pub enum UserAction {
    /// Register or update a user and enable ritual scheduling
    Add {
        user: String,
        #[arg(long)]
        email: Option<String>,
        /// Name shown to other users
        #[arg(long)]
        name: Option<String>,
    },
    /// Show or change reminder and email preferences
    Prefs {
        user: String,
        /// Ritual scheduling on/off
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        morning: Option<bool>,
        #[arg(long)]
        evening: Option<bool>,
        /// HH:MM
        #[arg(long)]
        morning_time: Option<ClockTime>,
        /// HH:MM
        #[arg(long)]
        evening_time: Option<ClockTime>,
        /// Start of quiet hours, HH:MM
        #[arg(long)]
        quiet_start: Option<ClockTime>,
        /// End of quiet hours, HH:MM
        #[arg(long)]
        quiet_end: Option<ClockTime>,
        /// Remove quiet hours
        #[arg(long, conflicts_with_all = ["quiet_start", "quiet_end"])]
        clear_quiet: bool,
        /// Ritual reminder emails
        #[arg(long)]
        ritual_reminders: Option<bool>,
        /// Weekly summary emails
        #[arg(long)]
        weekly_summary: Option<bool>,
        /// "Someone joined your action" emails
        #[arg(long)]
        joined_action: Option<bool>,
    },
    /// Streak statistics computed from the completion log
    Stats {
        user: String,
        /// Day to compute for (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

pub fn run(action: UserAction) -> CliResult {
    let config = Config::load()?;
    let store = SqliteStore::open()?;
    let svc = ritual_service(&store, &config);
    let now = Utc::now();

    match action {
        UserAction::Add { user, email, name } => {
            let existing = store.get_account(&user)?;
            let account = UserAccount {
                user_id: user.clone(),
                email: email.or_else(|| existing.as_ref().and_then(|a| a.email.clone())),
                display_name: name
                    .or_else(|| existing.map(|a| a.display_name))
                    .unwrap_or_default(),
            };
            store.upsert_account(&account)?;
            let state = svc.update_state(&user, now, |s| s.rituals_enabled = true)?;
            tracing::info!(user = %user, "user registered");
            print_json(&state)?;
        }
        UserAction::Prefs {
            user,
            enabled,
            morning,
            evening,
            morning_time,
            evening_time,
            quiet_start,
            quiet_end,
            clear_quiet,
            ritual_reminders,
            weekly_summary,
            joined_action,
        } => {
            let state = svc.update_state(&user, now, |s| {
                if let Some(v) = enabled {
                    s.rituals_enabled = v;
                }
                let prefs = &mut s.notification_preferences;
                prefs.morning = morning.or(prefs.morning);
                prefs.evening = evening.or(prefs.evening);
                prefs.morning_time = morning_time.or(prefs.morning_time);
                prefs.evening_time = evening_time.or(prefs.evening_time);
                if clear_quiet {
                    prefs.quiet_hours_start = None;
                    prefs.quiet_hours_end = None;
                } else {
                    prefs.quiet_hours_start = quiet_start.or(prefs.quiet_hours_start);
                    prefs.quiet_hours_end = quiet_end.or(prefs.quiet_hours_end);
                }
                let email = &mut s.email_preferences;
                email.ritual_reminders = ritual_reminders.or(email.ritual_reminders);
                email.weekly_summary = weekly_summary.or(email.weekly_summary);
                email.joined_action = joined_action.or(email.joined_action);
            })?;
            print_json(&state)?;
        }
        UserAction::Stats { user, date } => {
            let today = date.unwrap_or_else(|| now.date_naive());
            print_json(&svc.stats(&user, today)?)?;
        }
    }
    Ok(())
}
