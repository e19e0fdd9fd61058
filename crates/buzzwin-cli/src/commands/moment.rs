use buzzwin_core::ritual::NewMoment;
use buzzwin_core::{Config, ReminderConfig, ReminderScheduler, SqliteStore};
use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use super::{email_sink, print_json, ritual_service, split_list, CliResult};

#[derive(Subcommand)]
pub enum MomentAction {
    /// Log an impact moment
    Log {
        text: String,
        #[arg(long)]
        user: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Ritual this moment belongs to
        #[arg(long)]
        ritual: Option<String>,
    },
    /// Join another user's moment and notify its author
    Join {
        id: String,
        #[arg(long)]
        user: String,
        /// Log the notification instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
}

pub fn run(action: MomentAction) -> CliResult {
    let config = Config::load()?;
    let store = SqliteStore::open()?;
    let svc = ritual_service(&store, &config);
    let now = Utc::now();

    match action {
        MomentAction::Log {
            text,
            user,
            tags,
            ritual,
        } => {
            let input = NewMoment {
                text,
                tags: split_list(tags.as_deref()),
                ritual_id: ritual,
            };
            print_json(&svc.log_moment(&user, input, now)?)?;
        }
        MomentAction::Join { id, user, dry_run } => {
            let moment = svc.join_moment(&id, &user, now)?;
            let report = match email_sink(&config, dry_run) {
                Ok(sink) => {
                    let reminder_config = ReminderConfig::from_config(&config)?;
                    let scheduler = ReminderScheduler::new(&store, &store, sink.as_ref(), reminder_config);
                    Some(scheduler.notify_joined_action(&moment.id, &user, now)?)
                }
                Err(e) => {
                    tracing::warn!("moment joined but no notification was sent: {e}");
                    None
                }
            };
            print_json(&json!({ "moment": moment, "notification": report }))?;
        }
    }
    Ok(())
}
