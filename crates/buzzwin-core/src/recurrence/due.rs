//! "Is this ritual due on this date?"
//!
//! All dates are UTC calendar dates. Intervals greater than one are counted
//! from an anchor date, normally the ritual's creation date.

use chrono::{Datelike, Duration, NaiveDate};

use super::{Frequency, RecurrenceRule, WeekdaySpec};

/// Longest look-ahead for [`next_occurrences`], in days.
const MAX_SEARCH_DAYS: i64 = 3 * 366;

/// Anchor used when a rule is evaluated without an owning ritual.
pub fn default_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Decide whether `rule` has an occurrence on `date`.
pub fn is_due(rule: &RecurrenceRule, date: NaiveDate, anchor: NaiveDate) -> bool {
    let interval = rule.interval.max(1) as i64;
    match rule.frequency {
        Frequency::Daily => {
            let days = (date - anchor).num_days();
            days >= 0 && days % interval == 0
        }
        Frequency::Weekly => {
            // Ordinals carry no meaning for weekly rules.
            let weekday_match = rule.by_day.iter().any(|d| d.weekday == date.weekday());
            let week_match = interval == 1
                || (date >= anchor && weeks_between(anchor, date) % interval == 0);
            weekday_match && week_match
        }
        Frequency::Monthly => {
            if interval > 1 {
                let months = months_between(anchor, date);
                if months < 0 || months % interval != 0 {
                    return false;
                }
            }
            if rule.by_month_day.is_empty() {
                rule.by_day.iter().any(|spec| matches_monthly_weekday(spec, date))
            } else {
                rule.by_month_day.iter().any(|d| *d as u32 == date.day())
            }
        }
    }
}

/// Next `count` due dates on or after `from`.
///
/// Stops early if nothing fires within about three years, which is the
/// case for rules like "the 5th Monday" combined with a large interval.
pub fn next_occurrences(
    rule: &RecurrenceRule,
    from: NaiveDate,
    anchor: NaiveDate,
    count: usize,
) -> Vec<NaiveDate> {
    let mut found = Vec::with_capacity(count);
    let mut day = from;
    for _ in 0..MAX_SEARCH_DAYS {
        if found.len() >= count {
            break;
        }
        if is_due(rule, day, anchor) {
            found.push(day);
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    found
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .map(|first_of_next| (first_of_next - Duration::days(1)).day())
        .unwrap_or(31)
}

fn matches_monthly_weekday(spec: &WeekdaySpec, date: NaiveDate) -> bool {
    if spec.weekday != date.weekday() {
        return false;
    }
    match spec.ordinal {
        None => true,
        Some(n) if n > 0 => ((date.day() - 1) / 7 + 1) as i8 == n,
        Some(n) if n < 0 => {
            let from_end = (days_in_month(date) - date.day()) / 7 + 1;
            -(from_end as i8) == n
        }
        Some(_) => false,
    }
}

/// Whole Sunday-started weeks from the week containing `a` to the week
/// containing `b`; negative when `b` is in an earlier week.
fn weeks_between(a: NaiveDate, b: NaiveDate) -> i64 {
    let week_start = |d: NaiveDate| d - Duration::days(d.weekday().num_days_from_sunday() as i64);
    (week_start(b) - week_start(a)).num_days() / 7
}

fn months_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b.year() as i64 - a.year() as i64) * 12 + (b.month() as i64 - a.month() as i64)
}
