//! RRULE text encoding and decoding.
//!
//! The wire format is a subset of RFC 5545 recurrence rules:
//!
//! - `FREQ=DAILY;INTERVAL=<n>`
//! - `FREQ=WEEKLY;BYDAY=MO,WE,FR`
//! - `FREQ=MONTHLY;BYMONTHDAY=1,15`
//! - `FREQ=MONTHLY;BYDAY=2FR` (`-1` is the last occurrence)
//!
//! Stored ritual schedules use exactly this format, so encoding must stay
//! stable. Decoding is lenient: unknown keys and malformed tokens are
//! dropped, and only a missing or unsupported `FREQ` makes a string
//! unreadable.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::Weekday;
use regex::Regex;

use super::{Frequency, RecurrenceRule, WeekdaySpec};
use crate::error::ValidationError;

/// Two-letter iCalendar weekday codes, indexed Sunday-first.
const ICAL_DAYS: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

fn by_day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(-?\d+)?([A-Z]{2})$").expect("BYDAY pattern is valid"))
}

/// Map a day-of-week number (0 = Sunday .. 6 = Saturday) to its iCal code.
pub fn day_of_week_to_ical(day: u8) -> Option<&'static str> {
    ICAL_DAYS.get(day as usize).copied()
}

/// Map an iCal weekday code back to its day-of-week number (0 = Sunday).
pub fn ical_to_day_of_week(code: &str) -> Option<u8> {
    ICAL_DAYS
        .iter()
        .position(|c| *c == code)
        .map(|idx| idx as u8)
}

/// iCal code for a chrono weekday.
pub fn weekday_code(weekday: Weekday) -> &'static str {
    ICAL_DAYS[weekday.num_days_from_sunday() as usize]
}

/// Chrono weekday for an iCal code.
pub fn weekday_from_code(code: &str) -> Option<Weekday> {
    ical_to_day_of_week(code).map(weekday_from_sunday_index)
}

pub(crate) fn weekday_from_sunday_index(index: u8) -> Weekday {
    match index % 7 {
        0 => Weekday::Sun,
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        _ => Weekday::Sat,
    }
}

impl Frequency {
    /// The `FREQ` value for this frequency.
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            _ => None,
        }
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    /// Case-insensitive `FREQ` value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frequency::from_token(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| ValidationError::InvalidRecurrence(format!("unsupported frequency '{s}'")))
    }
}

impl FromStr for WeekdaySpec {
    type Err = ValidationError;

    /// A single `BYDAY` token such as `MO` or `-1FR`, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_by_day_token(&s.to_ascii_uppercase())
            .ok_or_else(|| ValidationError::InvalidRecurrence(format!("invalid weekday token '{s}'")))
    }
}

impl fmt::Display for WeekdaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ordinal) = self.ordinal {
            write!(f, "{ordinal}")?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

/// Encode a rule in the stored RRULE format.
///
/// This is a pure formatter: it does not check the rule's invariants.
/// Day lists are written in the order supplied.
pub fn generate_rrule(rule: &RecurrenceRule) -> String {
    let body = match rule.frequency {
        Frequency::Daily => {
            let interval = if rule.interval == 0 { 1 } else { rule.interval };
            return format!("FREQ=DAILY;INTERVAL={interval}");
        }
        Frequency::Weekly => format!("FREQ=WEEKLY;BYDAY={}", join_by_day(&rule.by_day)),
        Frequency::Monthly => {
            if rule.by_month_day.is_empty() {
                format!("FREQ=MONTHLY;BYDAY={}", join_by_day(&rule.by_day))
            } else {
                let days = rule
                    .by_month_day
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("FREQ=MONTHLY;BYMONTHDAY={days}")
            }
        }
    };
    // Weekly and monthly rules only carry INTERVAL when it is not 1.
    if rule.interval > 1 {
        format!("{body};INTERVAL={}", rule.interval)
    } else {
        body
    }
}

fn join_by_day(days: &[WeekdaySpec]) -> String {
    days.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a stored RRULE string.
///
/// Returns `None` when `FREQ` is missing or unsupported; callers decide
/// whether to fall back (see [`RecurrenceRule::parse_or_default`]).
pub fn parse_rrule(input: &str) -> Option<RecurrenceRule> {
    let parts: HashMap<&str, &str> = input
        .trim()
        .split(';')
        .filter_map(|segment| segment.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    let frequency = Frequency::from_token(parts.get("FREQ")?)?;

    let interval = parts
        .get("INTERVAL")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1);

    let by_day = parts
        .get("BYDAY")
        .map(|v| v.split(',').filter_map(parse_by_day_token).collect())
        .unwrap_or_default();

    let by_month_day = parts
        .get("BYMONTHDAY")
        .map(|v| {
            v.split(',')
                .filter_map(|t| t.trim().parse::<u8>().ok())
                .filter(|d| (1..=31).contains(d))
                .collect()
        })
        .unwrap_or_default();

    Some(RecurrenceRule {
        frequency,
        interval,
        by_day,
        by_month_day,
    })
}

fn parse_by_day_token(token: &str) -> Option<WeekdaySpec> {
    let caps = by_day_pattern().captures(token.trim())?;
    let weekday = weekday_from_code(caps.get(2)?.as_str())?;
    let ordinal = match caps.get(1) {
        Some(m) => Some(m.as_str().parse::<i8>().ok()?),
        None => None,
    };
    Some(WeekdaySpec { ordinal, weekday })
}
