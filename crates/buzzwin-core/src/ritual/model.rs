//! Ritual, completion, user-state and moment documents.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::quiet_hours::{ClockTime, QuietHours};
use crate::recurrence::RecurrenceRule;
use crate::streaks::StreakStats;

/// Who can see and join a ritual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RitualScope {
    /// Discoverable and joinable by anyone
    Public,
    /// Private to its creator
    Personalized,
    /// Platform-wide "ritual of the day"
    Global,
}

impl RitualScope {
    pub fn as_str(self) -> &'static str {
        match self {
            RitualScope::Public => "public",
            RitualScope::Personalized => "personalized",
            RitualScope::Global => "global",
        }
    }
}

/// How much effort a ritual asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Suggested part of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Anytime,
}

/// A recurring commitment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualDefinition {
    pub id: String,
    pub created_by: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub effort: EffortLevel,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    /// Human-readable estimate, e.g. "5 minutes".
    #[serde(default)]
    pub duration: String,
    /// Stored RRULE text; may be a legacy value.
    pub recurrence: String,
    pub scope: RitualScope,
    /// Joined users. The creator is a member without being listed.
    #[serde(default)]
    pub members: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RitualDefinition {
    /// Decoded schedule, with the legacy fallback applied.
    pub fn rule(&self) -> RecurrenceRule {
        RecurrenceRule::parse_or_default(&self.recurrence)
    }

    /// Interval anchor: the UTC creation date.
    pub fn anchor(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.rule().is_due(date, self.anchor())
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.created_by == user_id || self.members.contains(user_id)
    }
}

/// Input for creating a ritual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRitual {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub effort: EffortLevel,
    #[serde(default)]
    pub time_of_day: TimeOfDay,
    #[serde(default)]
    pub duration: String,
    pub rule: RecurrenceRule,
    pub scope: RitualScope,
}

/// Partial edit; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RitualUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub effort: Option<EffortLevel>,
    pub rule: Option<RecurrenceRule>,
    pub scope: Option<RitualScope>,
}

/// One completed occurrence. Unique per `(user_id, ritual_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualCompletion {
    pub user_id: String,
    pub ritual_id: String,
    /// Calendar day (UTC) the completion counts for.
    pub date: NaiveDate,
    pub shared_moment_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Reminder preferences. Absent fields take the documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    /// Morning reminder; on when absent.
    pub morning: Option<bool>,
    /// Evening reminder; off when absent.
    pub evening: Option<bool>,
    pub morning_time: Option<ClockTime>,
    pub evening_time: Option<ClockTime>,
    pub quiet_hours_start: Option<ClockTime>,
    pub quiet_hours_end: Option<ClockTime>,
}

impl NotificationPreferences {
    pub fn morning_enabled(&self) -> bool {
        self.morning.unwrap_or(true)
    }

    pub fn evening_enabled(&self) -> bool {
        self.evening.unwrap_or(false)
    }

    /// Quiet window, only when both ends are set.
    pub fn quiet_hours(&self) -> Option<QuietHours> {
        match (self.quiet_hours_start, self.quiet_hours_end) {
            (Some(start), Some(end)) => Some(QuietHours::new(start, end)),
            _ => None,
        }
    }
}

/// Email opt-outs. Only an explicit `false` disables a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPreferences {
    pub joined_action: Option<bool>,
    pub ritual_reminders: Option<bool>,
    pub weekly_summary: Option<bool>,
}

impl EmailPreferences {
    pub fn joined_action_enabled(&self) -> bool {
        self.joined_action != Some(false)
    }

    pub fn ritual_reminders_enabled(&self) -> bool {
        self.ritual_reminders != Some(false)
    }

    pub fn weekly_summary_enabled(&self) -> bool {
        self.weekly_summary != Some(false)
    }
}

/// Per-user ritual scheduling state and cached counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRitualState {
    pub user_id: String,
    /// Whether the reminder scheduler considers this user.
    #[serde(default = "default_true")]
    pub rituals_enabled: bool,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub total_completed: u32,
    #[serde(default)]
    pub completed_this_week: u32,
    #[serde(default)]
    pub completed_this_month: u32,
    #[serde(default)]
    pub last_completed: Option<NaiveDate>,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
    #[serde(default)]
    pub email_preferences: EmailPreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl UserRitualState {
    /// Fresh state with default preferences.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            rituals_enabled: true,
            current_streak: 0,
            longest_streak: 0,
            total_completed: 0,
            completed_this_week: 0,
            completed_this_month: 0,
            last_completed: None,
            notification_preferences: NotificationPreferences::default(),
            email_preferences: EmailPreferences::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the cached counters.
    pub fn apply_stats(&mut self, stats: &StreakStats, last_completed: Option<NaiveDate>) {
        self.current_streak = stats.current_streak;
        self.longest_streak = stats.longest_streak;
        self.total_completed = stats.total_completed;
        self.completed_this_week = stats.completed_this_week;
        self.completed_this_month = stats.completed_this_month;
        self.last_completed = last_completed;
    }
}

/// A logged action, optionally joined from another user's moment.
///
/// Joins are one level deep: a joined moment always points at a root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactMoment {
    pub id: String,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ritual_id: Option<String>,
    #[serde(default)]
    pub joined_from_moment_id: Option<String>,
    #[serde(default)]
    pub joined_by_users: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Identity record: where to reach a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_preferences_use_defaults() {
        let json = r#"{
            "user_id": "u1",
            "created_at": "2024-06-01T00:00:00Z",
            "updated_at": "2024-06-01T00:00:00Z"
        }"#;
        let state: UserRitualState = serde_json::from_str(json).unwrap();
        assert!(state.rituals_enabled);
        assert!(state.email_preferences.ritual_reminders_enabled());
        assert!(state.email_preferences.weekly_summary_enabled());
        assert!(state.email_preferences.joined_action_enabled());
        assert!(state.notification_preferences.morning_enabled());
        assert!(!state.notification_preferences.evening_enabled());
        assert!(state.notification_preferences.quiet_hours().is_none());
    }

    #[test]
    fn only_explicit_false_disables_email() {
        let prefs: EmailPreferences =
            serde_json::from_str(r#"{"ritualReminders": false, "weeklySummary": true}"#).unwrap();
        assert!(!prefs.ritual_reminders_enabled());
        assert!(prefs.weekly_summary_enabled());
        assert!(prefs.joined_action_enabled());
    }

    #[test]
    fn notification_times_use_hh_mm() {
        let prefs: NotificationPreferences = serde_json::from_str(
            r#"{"morningTime": "06:30", "quietHoursStart": "22:00", "quietHoursEnd": "07:00"}"#,
        )
        .unwrap();
        assert_eq!(prefs.morning_time.unwrap().to_string(), "06:30");
        let quiet = prefs.quiet_hours().unwrap();
        assert!(quiet.wraps_midnight());

        let bad = serde_json::from_str::<NotificationPreferences>(r#"{"morningTime": "6.30"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn creator_is_implicit_member() {
        let now = Utc::now();
        let ritual = RitualDefinition {
            id: "r1".into(),
            created_by: "alice".into(),
            title: "Gratitude".into(),
            description: String::new(),
            tags: vec![],
            effort: EffortLevel::Low,
            time_of_day: TimeOfDay::Morning,
            duration: "2 minutes".into(),
            recurrence: "legacy-daily".into(),
            scope: RitualScope::Public,
            members: BTreeSet::from(["bob".to_string()]),
            created_at: now,
            updated_at: now,
        };
        assert!(ritual.is_member("alice"));
        assert!(ritual.is_member("bob"));
        assert!(!ritual.is_member("carol"));
        assert_eq!(ritual.rule(), RecurrenceRule::daily(1));
        assert!(ritual.is_due_on(now.date_naive()));
    }
}
