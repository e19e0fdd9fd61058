//! Recurrence rule commands.

use buzzwin_core::recurrence::{default_anchor, next_occurrences};
use buzzwin_core::{parse_rrule, Frequency, RecurrenceRule, WeekdaySpec};
use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use serde_json::json;

use super::{parse_date, print_json, CliResult};

#[derive(Subcommand)]
pub enum RruleAction {
    /// Decode an RRULE string; prints null when it is not a rule
    Parse {
        /// Rule text, e.g. "FREQ=WEEKLY;BYDAY=MO,WE"
        rrule: String,
    },
    /// Encode a rule from its parts
    Generate {
        /// daily, weekly or monthly
        #[arg(long)]
        freq: Frequency,
        /// Repeat every N periods
        #[arg(long, default_value = "1")]
        interval: u32,
        /// Comma-separated weekday tokens (MO, -1FR, 2TU)
        #[arg(long, value_delimiter = ',')]
        by_day: Vec<WeekdaySpec>,
        /// Comma-separated days of the month (1-31)
        #[arg(long, value_delimiter = ',')]
        by_month_day: Vec<u8>,
    },
    /// Check whether a rule fires on a date
    Due {
        rrule: String,
        /// Date to check (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
        /// Interval anchor (default: 1970-01-01)
        #[arg(long, value_parser = parse_date)]
        anchor: Option<NaiveDate>,
    },
    /// List upcoming due dates
    Next {
        rrule: String,
        /// First date to consider (default: today)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Interval anchor (default: 1970-01-01)
        #[arg(long, value_parser = parse_date)]
        anchor: Option<NaiveDate>,
        /// Number of dates to list
        #[arg(long, default_value = "5")]
        count: usize,
    },
}

pub fn run(action: RruleAction) -> CliResult {
    match action {
        RruleAction::Parse { rrule } => print_json(&parse_rrule(&rrule))?,
        RruleAction::Generate {
            freq,
            interval,
            by_day,
            by_month_day,
        } => {
            let rule = RecurrenceRule {
                frequency: freq,
                interval,
                by_day,
                by_month_day,
            };
            rule.validate()?;
            println!("{rule}");
        }
        RruleAction::Due { rrule, date, anchor } => {
            let rule = RecurrenceRule::parse_or_default(&rrule);
            let anchor = anchor.unwrap_or_else(default_anchor);
            print_json(&json!({
                "rule": rule.to_string(),
                "date": date,
                "anchor": anchor,
                "due": rule.is_due(date, anchor),
            }))?;
        }
        RruleAction::Next {
            rrule,
            from,
            anchor,
            count,
        } => {
            let rule = RecurrenceRule::parse_or_default(&rrule);
            let from = from.unwrap_or_else(|| Utc::now().date_naive());
            let anchor = anchor.unwrap_or_else(default_anchor);
            print_json(&next_occurrences(&rule, from, anchor, count))?;
        }
    }
    Ok(())
}
