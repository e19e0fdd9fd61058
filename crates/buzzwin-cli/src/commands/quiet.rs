use buzzwin_core::quiet_hours::is_in_quiet_hours_str;
use clap::Subcommand;
use serde_json::json;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum QuietAction {
    /// Check whether NOW falls inside START..END (HH:MM, may wrap midnight)
    Check {
        now: String,
        start: String,
        end: String,
    },
}

pub fn run(action: QuietAction) -> CliResult {
    match action {
        QuietAction::Check { now, start, end } => {
            let quiet = is_in_quiet_hours_str(&now, &start, &end)?;
            print_json(&json!({ "now": now, "start": start, "end": end, "quiet": quiet }))
        }
    }
}
