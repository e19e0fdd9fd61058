//! Completion streaks and aggregates.
//!
//! Counters are always derived from the completion log (one entry per
//! calendar day); the values cached on a user's state are only a copy.
//!
//! A streak stays alive through "yesterday": it only breaks once a full
//! calendar day has passed with no completion.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::recurrence::weekday_from_sunday_index;

/// Direction of recent activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Tuning knobs for the trend and rate figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Days of history (ending today) used for rate and trend.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Relative change between the two halves of the window needed before
    /// the trend is reported as increasing or decreasing.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_window_days() -> u32 {
    14
}

fn default_threshold() -> f64 {
    0.10
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            threshold: default_threshold(),
        }
    }
}

/// Derived completion statistics for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completed: u32,
    /// Completions in the current Sunday-to-Saturday week.
    pub completed_this_week: u32,
    pub completed_this_month: u32,
    /// Completions per day since the first completion (inclusive of today).
    pub average_completions_per_day: f64,
    /// Share of days in the trend window with a completion, 0.0 - 1.0.
    pub completion_rate: f64,
    /// Weekday with the most completions; earliest weekday wins ties.
    pub best_day: Option<Weekday>,
    pub trend: CompletionTrend,
}

impl StreakStats {
    fn empty() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            total_completed: 0,
            completed_this_week: 0,
            completed_this_month: 0,
            average_completions_per_day: 0.0,
            completion_rate: 0.0,
            best_day: None,
            trend: CompletionTrend::Stable,
        }
    }
}

/// Computes [`StreakStats`] from completion dates.
#[derive(Debug, Clone, Default)]
pub struct StreakTracker {
    config: TrendConfig,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Compute stats as of `today`.
    ///
    /// Input may be unsorted and contain duplicates; dates after `today`
    /// are ignored.
    pub fn compute(&self, dates: &[NaiveDate], today: NaiveDate) -> StreakStats {
        let days: BTreeSet<NaiveDate> = dates.iter().copied().filter(|d| *d <= today).collect();
        let Some(first) = days.iter().next().copied() else {
            return StreakStats::empty();
        };

        let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
        let completed_this_week = days.range(week_start..=today).count() as u32;
        let completed_this_month = days
            .iter()
            .filter(|d| d.year() == today.year() && d.month() == today.month())
            .count() as u32;

        let span_days = (today - first).num_days() + 1;
        let total = days.len() as u32;

        StreakStats {
            current_streak: current_streak(&days, today),
            longest_streak: longest_streak(&days),
            total_completed: total,
            completed_this_week,
            completed_this_month,
            average_completions_per_day: total as f64 / span_days as f64,
            completion_rate: self.completion_rate(&days, today),
            best_day: best_day(&days),
            trend: self.trend(&days, today),
        }
    }

    fn completion_rate(&self, days: &BTreeSet<NaiveDate>, today: NaiveDate) -> f64 {
        let window = self.config.window_days.max(1) as i64;
        let start = today - Duration::days(window - 1);
        days.range(start..=today).count() as f64 / window as f64
    }

    /// Compare the older and newer halves of the trend window.
    fn trend(&self, days: &BTreeSet<NaiveDate>, today: NaiveDate) -> CompletionTrend {
        let half = (self.config.window_days / 2).max(1) as i64;
        let recent_start = today - Duration::days(half - 1);
        let older_start = recent_start - Duration::days(half);

        let recent = days.range(recent_start..=today).count() as f64;
        let older = days.range(older_start..recent_start).count() as f64;

        if older == 0.0 {
            return if recent > 0.0 {
                CompletionTrend::Increasing
            } else {
                CompletionTrend::Stable
            };
        }

        let change = (recent - older) / older;
        if change > self.config.threshold {
            CompletionTrend::Increasing
        } else if change < -self.config.threshold {
            CompletionTrend::Decreasing
        } else {
            CompletionTrend::Stable
        }
    }
}

fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut cursor = if days.contains(&today) {
        today
    } else if days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(p) if *day - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }
    longest
}

fn best_day(days: &BTreeSet<NaiveDate>) -> Option<Weekday> {
    let mut counts = [0u32; 7];
    for day in days {
        counts[day.weekday().num_days_from_sunday() as usize] += 1;
    }
    let (idx, count) = counts
        .iter()
        .enumerate()
        .fold((0usize, 0u32), |best, (i, c)| if *c > best.1 { (i, *c) } else { best });
    (count > 0).then(|| weekday_from_sunday_index(idx as u8))
}
