//! Scheduled notification jobs.

use std::time::Duration;

use buzzwin_core::{Config, CoreError, ReminderConfig, ReminderScheduler, RunReport, SqliteStore};
use chrono::{DateTime, Utc};
use clap::Subcommand;

use super::{email_sink, parse_instant, print_json, CliResult};

#[derive(Subcommand)]
pub enum RemindersAction {
    /// Run one reminder tick
    Run {
        /// Evaluate as of this instant (RFC 3339, default: now)
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
        /// Log emails instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Tick forever, also sending the weekly summary at its configured hour
    Watch {
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum SummaryAction {
    /// Send the weekly summary now
    Run {
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
        #[arg(long)]
        dry_run: bool,
    },
}

pub fn run(action: RemindersAction) -> CliResult {
    let config = Config::load()?;
    let store = SqliteStore::open()?;

    match action {
        RemindersAction::Run { at, dry_run } => {
            let sink = email_sink(&config, dry_run)?;
            let scheduler =
                ReminderScheduler::new(&store, &store, sink.as_ref(), ReminderConfig::from_config(&config)?);
            let report = scheduler.run_ritual_reminders(at.unwrap_or_else(Utc::now))?;
            print_json(&report)?;
        }
        RemindersAction::Watch { dry_run } => {
            let sink = email_sink(&config, dry_run)?;
            let scheduler =
                ReminderScheduler::new(&store, &store, sink.as_ref(), ReminderConfig::from_config(&config)?);
            let tick = Duration::from_secs(u64::from(config.reminders.tick_minutes.max(1)) * 60);
            tracing::info!(tick_minutes = tick.as_secs() / 60, "watching for due reminders");

            loop {
                let now = Utc::now();
                // The next tick retries whatever failed.
                log_tick("ritual_reminders", scheduler.run_ritual_reminders(now));
                if scheduler.config().summary_due(now) {
                    log_tick("weekly_summary", scheduler.run_weekly_summary(now));
                }
                std::thread::sleep(tick);
            }
        }
    }
    Ok(())
}

fn log_tick(job: &str, result: Result<RunReport, CoreError>) {
    match result {
        Ok(report) if report.failed.is_empty() => {
            tracing::info!(job, sent = report.sent, skipped = report.skipped.len(), "tick finished");
        }
        Ok(report) => tracing::warn!(
            job,
            sent = report.sent,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "tick finished with failures"
        ),
        Err(e) => tracing::error!(job, "tick aborted: {e}"),
    }
}

pub fn run_summary(action: SummaryAction) -> CliResult {
    let config = Config::load()?;
    let store = SqliteStore::open()?;

    match action {
        SummaryAction::Run { at, dry_run } => {
            let sink = email_sink(&config, dry_run)?;
            let scheduler =
                ReminderScheduler::new(&store, &store, sink.as_ref(), ReminderConfig::from_config(&config)?);
            let report = scheduler.run_weekly_summary(at.unwrap_or_else(Utc::now))?;
            print_json(&report)?;
        }
    }
    Ok(())
}
