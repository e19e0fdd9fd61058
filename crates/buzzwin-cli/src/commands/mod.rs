pub mod auth;
pub mod config;
pub mod invite;
pub mod moment;
pub mod quiet;
pub mod reminders;
pub mod ritual;
pub mod rrule;
pub mod user;

use buzzwin_core::{
    Config, DryRunEmailSink, EmailSink, HttpEmailSink, RitualService, SqliteStore, StreakTracker,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a `YYYY-MM-DD` argument.
pub fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{input}' (expected YYYY-MM-DD): {e}"))
}

/// Parse an RFC 3339 instant.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(input)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{input}' (expected RFC 3339): {e}"))
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(input: Option<&str>) -> Vec<String> {
    input
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Ritual operations using the configured trend settings.
pub fn ritual_service<'a>(store: &'a SqliteStore, config: &Config) -> RitualService<'a> {
    RitualService::with_tracker(store, StreakTracker::with_config(config.trend_config()))
}

/// Dry-run sink or the configured HTTP relay.
pub fn email_sink(config: &Config, dry_run: bool) -> Result<Box<dyn EmailSink>, Box<dyn std::error::Error>> {
    if dry_run {
        return Ok(Box::new(DryRunEmailSink::new()));
    }
    Ok(Box::new(HttpEmailSink::from_config(&config.email)?))
}
