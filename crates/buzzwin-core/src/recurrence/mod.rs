//! Ritual recurrence rules.
//!
//! A ritual's schedule is persisted as RRULE-style text (see [`codec`]) and
//! evaluated against calendar dates by [`due`].
//!
//! ## Day numbering
//!
//! Weekday numbers are Sunday-first (`SU=0 .. SA=6`). Stored rules and the
//! due-date evaluator both depend on this, so it must not change.

mod codec;
mod due;

pub use codec::{
    day_of_week_to_ical, generate_rrule, ical_to_day_of_week, parse_rrule, weekday_code,
    weekday_from_code,
};
pub(crate) use codec::weekday_from_sunday_index;
pub use due::{days_in_month, default_anchor, is_due, next_occurrences};

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How often a rule repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// A weekday selector, optionally qualified by its position in the month.
///
/// `ordinal` is `1..=5` counting from the start of the month or `-1..=-5`
/// counting from the end (`-1` = last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekdaySpec {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdaySpec {
    pub fn plain(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    pub fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

/// Parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Repeat every `interval` periods; always at least 1 once parsed.
    pub interval: u32,
    #[serde(default)]
    pub by_day: Vec<WeekdaySpec>,
    #[serde(default)]
    pub by_month_day: Vec<u8>,
}

impl RecurrenceRule {
    /// Every `interval` days.
    pub fn daily(interval: u32) -> Self {
        Self {
            frequency: Frequency::Daily,
            interval,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
        }
    }

    /// On the given weekdays every week.
    pub fn weekly(days: Vec<Weekday>) -> Self {
        Self {
            frequency: Frequency::Weekly,
            interval: 1,
            by_day: days.into_iter().map(WeekdaySpec::plain).collect(),
            by_month_day: Vec::new(),
        }
    }

    /// On fixed dates of every month.
    pub fn monthly_on_days(days: Vec<u8>) -> Self {
        Self {
            frequency: Frequency::Monthly,
            interval: 1,
            by_day: Vec::new(),
            by_month_day: days,
        }
    }

    /// On the n-th (or, negative, n-th from last) weekday of every month.
    pub fn monthly_on_ordinal(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            frequency: Frequency::Monthly,
            interval: 1,
            by_day: vec![WeekdaySpec::nth(ordinal, weekday)],
            by_month_day: Vec::new(),
        }
    }

    /// Parse stored text, substituting the daily default for legacy or
    /// unreadable values.
    ///
    /// This is the only place that applies the fallback.
    pub fn parse_or_default(input: &str) -> Self {
        match parse_rrule(input) {
            Some(rule) => rule,
            None => {
                tracing::warn!(rrule = input, "unreadable recurrence rule, using daily default");
                Self::default()
            }
        }
    }

    /// Check the shape invariants for each frequency.
    ///
    /// Used when a rule is created or edited. Stored rules are never
    /// rejected on read.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |msg: &str| Err(ValidationError::InvalidRecurrence(msg.to_string()));

        if self.interval == 0 {
            return invalid("interval must be at least 1");
        }
        if self.by_month_day.iter().any(|d| !(1..=31).contains(d)) {
            return invalid("month days must be between 1 and 31");
        }
        for spec in &self.by_day {
            if let Some(n) = spec.ordinal {
                if n == 0 || !(-5..=5).contains(&n) {
                    return invalid("weekday ordinal must be 1..=5 or -5..=-1");
                }
            }
        }

        match self.frequency {
            Frequency::Daily => {
                if !self.by_day.is_empty() || !self.by_month_day.is_empty() {
                    return invalid("daily rules take no day selectors");
                }
            }
            Frequency::Weekly => {
                if self.by_day.is_empty() {
                    return invalid("weekly rules need at least one weekday");
                }
                if self.by_day.iter().any(|d| d.ordinal.is_some()) {
                    return invalid("weekly rules cannot use ordinal weekdays");
                }
                if !self.by_month_day.is_empty() {
                    return invalid("weekly rules cannot use month days");
                }
            }
            Frequency::Monthly => {
                if self.by_day.is_empty() == self.by_month_day.is_empty() {
                    return invalid("monthly rules need either month days or weekdays, not both");
                }
            }
        }
        Ok(())
    }

    /// Same frequency, normalized interval and day sets, ignoring order.
    pub fn same_schedule(&self, other: &Self) -> bool {
        let days = |r: &Self| {
            r.by_day
                .iter()
                .map(|d| (d.ordinal, d.weekday.num_days_from_sunday()))
                .collect::<BTreeSet<_>>()
        };
        let month_days = |r: &Self| r.by_month_day.iter().copied().collect::<BTreeSet<_>>();

        self.frequency == other.frequency
            && self.interval.max(1) == other.interval.max(1)
            && days(self) == days(other)
            && month_days(self) == month_days(other)
    }

    /// Whether the rule fires on `date`, counting intervals from `anchor`.
    pub fn is_due(&self, date: NaiveDate, anchor: NaiveDate) -> bool {
        is_due(self, date, anchor)
    }
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::daily(1)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&generate_rrule(self))
    }
}
