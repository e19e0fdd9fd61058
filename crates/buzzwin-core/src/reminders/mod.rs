//! Scheduled notification jobs.
//!
//! Each run is a stateless, sequential batch over the candidates loaded
//! from the store. Per-user problems, including an unreadable stored
//! state, are logged and recorded in the [`RunReport`]; only a failure to
//! load candidates aborts a run.
//!
//! Sends are recorded in the store's notification log, so a user gets at
//! most one notification of each kind per UTC day no matter how often the
//! scheduler ticks.

mod digest;
mod report;

pub use report::{FailedUser, RunReport, SkipReason, SkippedUser};

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::email::{templates, EmailSink};
use crate::error::{ConfigError, Result};
use crate::quiet_hours::ClockTime;
use crate::ritual::{NotificationPreferences, RitualDefinition, UserRitualState};
use crate::storage::{Config, IdentityProvider, RitualStore};
use crate::streaks::TrendConfig;

/// Settings the jobs need, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Half-width of the match window around a reminder time, in minutes.
    pub window_minutes: u32,
    pub default_morning_time: ClockTime,
    pub default_evening_time: ClockTime,
    pub summary_weekday: Weekday,
    pub summary_hour: u32,
    pub app_url: String,
    pub trend: TrendConfig,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            window_minutes: 15,
            default_morning_time: ClockTime::MORNING,
            default_evening_time: ClockTime::EVENING,
            summary_weekday: Weekday::Sun,
            summary_hour: 9,
            app_url: "https://buzzwin.com".into(),
            trend: TrendConfig::default(),
        }
    }
}

impl ReminderConfig {
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            window_minutes: config.reminders.window_minutes,
            default_morning_time: config.reminders.default_morning_time,
            default_evening_time: config.reminders.default_evening_time,
            summary_weekday: config.summary_weekday()?,
            summary_hour: config.summary.hour,
            app_url: config.app_url.clone(),
            trend: config.trend_config(),
        })
    }

    /// Whether `now` falls in the hour the weekly summary goes out.
    pub fn summary_due(&self, now: DateTime<Utc>) -> bool {
        now.weekday() == self.summary_weekday && now.hour() == self.summary_hour
    }

    /// Half-open window test on the 24-hour circle:
    /// `-window <= now - target < window`.
    fn in_window(&self, now: ClockTime, target: ClockTime) -> bool {
        let window = self.window_minutes as i32;
        let offset = now.offset_from(target);
        -window <= offset && offset < window
    }
}

/// Which daily reminder a tick matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderSlot {
    Morning,
    Evening,
}

impl ReminderSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderSlot::Morning => "morning",
            ReminderSlot::Evening => "evening",
        }
    }

    /// Notification-log kind for this slot.
    fn log_kind(self) -> &'static str {
        match self {
            ReminderSlot::Morning => "morning_reminder",
            ReminderSlot::Evening => "evening_reminder",
        }
    }

    fn enabled(self, prefs: &NotificationPreferences) -> bool {
        match self {
            ReminderSlot::Morning => prefs.morning_enabled(),
            ReminderSlot::Evening => prefs.evening_enabled(),
        }
    }
}

/// Runs the notification jobs against injected collaborators.
pub struct ReminderScheduler<'a> {
    store: &'a dyn RitualStore,
    identity: &'a dyn IdentityProvider,
    sink: &'a dyn EmailSink,
    config: ReminderConfig,
}

impl<'a> ReminderScheduler<'a> {
    pub fn new(
        store: &'a dyn RitualStore,
        identity: &'a dyn IdentityProvider,
        sink: &'a dyn EmailSink,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            identity,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// The reminder slot whose window contains `now`, morning first.
    pub fn matching_slot(&self, prefs: &NotificationPreferences, now: ClockTime) -> Option<ReminderSlot> {
        let morning = prefs.morning_time.unwrap_or(self.config.default_morning_time);
        let evening = prefs.evening_time.unwrap_or(self.config.default_evening_time);
        if self.config.in_window(now, morning) {
            Some(ReminderSlot::Morning)
        } else if self.config.in_window(now, evening) {
            Some(ReminderSlot::Evening)
        } else {
            None
        }
    }

    /// Send today's ritual reminder to every scheduled user whose morning
    /// or evening time is near `now`.
    ///
    /// # Errors
    /// Only when the candidates or the day's global ritual cannot be
    /// loaded. Per-user failures end up in the report.
    pub fn run_ritual_reminders(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let mut report = RunReport::new("ritual_reminders", now);

        let states = self.store.scheduled_states().map_err(|e| {
            tracing::error!("failed to load scheduled users: {e}");
            e
        })?;
        let global = self.store.global_ritual_for(now.date_naive()).map_err(|e| {
            tracing::error!("failed to load global ritual: {e}");
            e
        })?;

        for row in &states {
            match row {
                Ok(state) => self.remind_user(state, global.as_ref(), now, &mut report),
                Err(unreadable) => report.unreadable(unreadable),
            }
        }

        report.log_summary();
        Ok(report)
    }

    fn remind_user(
        &self,
        state: &UserRitualState,
        global: Option<&RitualDefinition>,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) {
        let user = state.user_id.as_str();
        let prefs = &state.notification_preferences;
        let clock = ClockTime::of(now);
        let today = now.date_naive();

        let Some(slot) = self.matching_slot(prefs, clock) else {
            return report.skip(user, SkipReason::OutsideWindow);
        };
        if !slot.enabled(prefs) {
            return report.skip(user, SkipReason::SlotDisabled);
        }
        match self.store.was_notified(user, today, slot.log_kind()) {
            Ok(true) => return report.skip(user, SkipReason::AlreadyNotified),
            Ok(false) => {}
            Err(e) => return report.fail(user, e),
        }
        if prefs.quiet_hours().is_some_and(|q| q.contains(clock)) {
            return report.skip(user, SkipReason::QuietHours);
        }
        if !state.email_preferences.ritual_reminders_enabled() {
            return report.skip(user, SkipReason::EmailOptOut);
        }
        let Some(email) = self.resolve_email(user) else {
            return report.skip(user, SkipReason::NoEmail);
        };
        let Some(ritual) = global else {
            return report.skip(user, SkipReason::NoGlobalRitual);
        };

        let name = self.display_name(user);
        let message = templates::ritual_reminder(
            &email,
            name.as_deref(),
            ritual,
            slot.as_str(),
            &self.config.app_url,
        );
        self.dispatch(user, &message, slot.log_kind(), now, report);
    }

    /// Identity lookups that fail count as "no email on file".
    fn resolve_email(&self, user: &str) -> Option<String> {
        match self.identity.resolve_email(user) {
            Ok(email) => email,
            Err(e) => {
                tracing::warn!(user, "email lookup failed: {e}");
                None
            }
        }
    }

    fn display_name(&self, user: &str) -> Option<String> {
        self.identity.display_name(user).unwrap_or_else(|e| {
            tracing::debug!(user, "display name lookup failed: {e}");
            None
        })
    }

    /// Send once, then record the send in the notification log.
    ///
    /// A send that cannot be recorded still counts as sent and is also
    /// listed among the failures.
    fn dispatch(
        &self,
        user: &str,
        message: &crate::email::EmailMessage,
        kind: &str,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) {
        if let Err(e) = self.sink.send(message) {
            return report.fail(user, e);
        }
        report.sent += 1;
        if let Err(e) = self.store.mark_notified(user, now.date_naive(), kind, now) {
            // The next tick inside the window may send again.
            report.fail(user, format!("sent, unrecorded: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::DryRunEmailSink;
    use crate::error::StoreError;
    use crate::recurrence::RecurrenceRule;
    use crate::ritual::{NewRitual, RitualScope, RitualService, UserAccount};
    use crate::storage::{SqliteStore, StateRow};
    use chrono::{NaiveDate, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
    }

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    /// Store with one global ritual for 2024-06-03 and users u1.. with emails.
    fn seeded(users: &[&str]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let svc = RitualService::new(&store);
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let ritual = svc
            .create_ritual(
                "admin",
                NewRitual {
                    title: "Three breaths".into(),
                    description: String::new(),
                    tags: vec![],
                    effort: Default::default(),
                    time_of_day: Default::default(),
                    duration: "1 minute".into(),
                    rule: RecurrenceRule::daily(1),
                    scope: RitualScope::Global,
                },
                created,
            )
            .unwrap();
        svc.set_global(at(0, 0).date_naive(), &ritual.id).unwrap();
        for user in users {
            store
                .upsert_account(&UserAccount {
                    user_id: user.to_string(),
                    email: Some(format!("{user}@example.com")),
                    display_name: user.to_uppercase(),
                })
                .unwrap();
            svc.ensure_state(user, created).unwrap();
        }
        store
    }

    fn edit(store: &SqliteStore, user: &str, f: impl FnOnce(&mut UserRitualState)) {
        RitualService::new(store).update_state(user, at(0, 0), f).unwrap();
    }

    fn run(store: &SqliteStore, sink: &DryRunEmailSink, now: DateTime<Utc>) -> RunReport {
        ReminderScheduler::new(store, store, sink, ReminderConfig::default())
            .run_ritual_reminders(now)
            .unwrap()
    }

    #[test]
    fn morning_reminder_sent_inside_window_only() {
        let store = seeded(&["u1"]);
        let sink = DryRunEmailSink::new();

        let report = run(&store, &sink, at(8, 20));
        assert_eq!(report.sent, 0);
        assert_eq!(report.skipped_for(SkipReason::OutsideWindow), 1);

        let report = run(&store, &sink, at(8, 5));
        assert_eq!(report.sent, 1);
        let sent = sink.sent();
        assert_eq!(sent[0].to, "u1@example.com");
        assert_eq!(sent[0].subject, "Your morning ritual: Three breaths");
    }

    #[test]
    fn window_is_half_open() {
        let store = seeded(&["u1"]);
        let sink = DryRunEmailSink::new();
        assert_eq!(run(&store, &sink, at(8, 15)).sent, 0);
        assert_eq!(run(&store, &sink, at(7, 45)).sent, 1);
    }

    #[test]
    fn second_tick_same_day_does_not_resend() {
        let store = seeded(&["u1"]);
        let sink = DryRunEmailSink::new();
        assert_eq!(run(&store, &sink, at(8, 0)).sent, 1);
        let report = run(&store, &sink, at(8, 10));
        assert_eq!(report.sent, 0);
        assert_eq!(report.skipped_for(SkipReason::AlreadyNotified), 1);
        assert_eq!(sink.sent().len(), 1);
    }

    #[test]
    fn quiet_hours_suppress_matching_window() {
        let store = seeded(&["u1"]);
        edit(&store, "u1", |s| {
            s.notification_preferences.morning_time = Some(t("06:30"));
            s.notification_preferences.quiet_hours_start = Some(t("22:00"));
            s.notification_preferences.quiet_hours_end = Some(t("07:00"));
        });
        let sink = DryRunEmailSink::new();
        let report = run(&store, &sink, at(6, 35));
        assert_eq!(report.sent, 0);
        assert_eq!(report.skipped_for(SkipReason::QuietHours), 1);
    }

    #[test]
    fn evening_needs_explicit_opt_in() {
        let store = seeded(&["u1", "u2"]);
        edit(&store, "u2", |s| s.notification_preferences.evening = Some(true));
        let sink = DryRunEmailSink::new();
        let report = run(&store, &sink, at(20, 0));
        assert_eq!(report.sent, 1);
        assert_eq!(report.skipped_for(SkipReason::SlotDisabled), 1);
        assert_eq!(sink.sent()[0].to, "u2@example.com");
    }

    #[test]
    fn explicit_email_opt_out_is_respected() {
        let store = seeded(&["u1"]);
        edit(&store, "u1", |s| s.email_preferences.ritual_reminders = Some(false));
        let sink = DryRunEmailSink::new();
        let report = run(&store, &sink, at(8, 0));
        assert_eq!(report.skipped_for(SkipReason::EmailOptOut), 1);
    }

    #[test]
    fn disabled_users_are_not_candidates() {
        let store = seeded(&["u1"]);
        edit(&store, "u1", |s| s.rituals_enabled = false);
        let sink = DryRunEmailSink::new();
        let report = run(&store, &sink, at(8, 0));
        assert_eq!(report.sent, 0);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn missing_email_and_global_ritual_skip() {
        let store = seeded(&["u1"]);
        store
            .upsert_account(&UserAccount {
                user_id: "u1".into(),
                email: None,
                display_name: String::new(),
            })
            .unwrap();
        let sink = DryRunEmailSink::new();
        assert_eq!(run(&store, &sink, at(8, 0)).skipped_for(SkipReason::NoEmail), 1);

        let store = seeded(&["u1"]);
        let next_day = Utc.with_ymd_and_hms(2024, 6, 4, 8, 0, 0).unwrap();
        assert_eq!(
            run(&store, &sink, next_day).skipped_for(SkipReason::NoGlobalRitual),
            1
        );
    }

    #[test]
    fn one_failing_recipient_does_not_block_the_rest() {
        let store = seeded(&["u1", "u2", "u3"]);
        let sink = DryRunEmailSink::failing_for(["u2@example.com"]);
        let report = run(&store, &sink, at(8, 0));
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].user_id, "u2");
        // A failed send is not logged, so the next tick retries it.
        assert!(!store.was_notified("u2", at(8, 0).date_naive(), "morning_reminder").unwrap());
    }

    struct BrokenStore;

    impl RitualStore for BrokenStore {
        fn scheduled_states(&self) -> std::result::Result<Vec<StateRow>, StoreError> {
            Err(StoreError::Locked)
        }
        fn all_states(&self) -> std::result::Result<Vec<StateRow>, StoreError> {
            Err(StoreError::Locked)
        }
        fn state(&self, _: &str) -> std::result::Result<Option<UserRitualState>, StoreError> {
            Err(StoreError::Locked)
        }
        fn global_ritual_for(&self, _: NaiveDate) -> std::result::Result<Option<RitualDefinition>, StoreError> {
            Ok(None)
        }
        fn completion_dates(&self, _: &str) -> std::result::Result<Vec<NaiveDate>, StoreError> {
            Ok(vec![])
        }
        fn moment(&self, _: &str) -> std::result::Result<Option<crate::ritual::ImpactMoment>, StoreError> {
            Ok(None)
        }
        fn was_notified(&self, _: &str, _: NaiveDate, _: &str) -> std::result::Result<bool, StoreError> {
            Ok(false)
        }
        fn mark_notified(&self, _: &str, _: NaiveDate, _: &str, _: DateTime<Utc>) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn candidate_fetch_failure_fails_the_run() {
        let identity = SqliteStore::open_in_memory().unwrap();
        let sink = DryRunEmailSink::new();
        let scheduler = ReminderScheduler::new(&BrokenStore, &identity, &sink, ReminderConfig::default());
        assert!(scheduler.run_ritual_reminders(at(8, 0)).is_err());
    }

    /// Delegates to a real store but cannot write the notification log.
    struct ReadOnlyLog(SqliteStore);

    impl RitualStore for ReadOnlyLog {
        fn scheduled_states(&self) -> std::result::Result<Vec<StateRow>, StoreError> {
            self.0.scheduled_states()
        }
        fn all_states(&self) -> std::result::Result<Vec<StateRow>, StoreError> {
            self.0.all_states()
        }
        fn state(&self, user: &str) -> std::result::Result<Option<UserRitualState>, StoreError> {
            self.0.state(user)
        }
        fn global_ritual_for(&self, date: NaiveDate) -> std::result::Result<Option<RitualDefinition>, StoreError> {
            self.0.global_ritual_for(date)
        }
        fn completion_dates(&self, user: &str) -> std::result::Result<Vec<NaiveDate>, StoreError> {
            self.0.completion_dates(user)
        }
        fn moment(&self, id: &str) -> std::result::Result<Option<crate::ritual::ImpactMoment>, StoreError> {
            self.0.moment(id)
        }
        fn was_notified(&self, user: &str, date: NaiveDate, kind: &str) -> std::result::Result<bool, StoreError> {
            self.0.was_notified(user, date, kind)
        }
        fn mark_notified(&self, _: &str, _: NaiveDate, _: &str, _: DateTime<Utc>) -> std::result::Result<(), StoreError> {
            Err(StoreError::Locked)
        }
    }

    #[test]
    fn unrecorded_send_is_reported() {
        let store = ReadOnlyLog(seeded(&["u1"]));
        let sink = DryRunEmailSink::new();
        let scheduler = ReminderScheduler::new(&store, &store.0, &sink, ReminderConfig::default());

        let report = scheduler.run_ritual_reminders(at(8, 0)).unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].user_id, "u1");
        assert!(report.failed[0].error.starts_with("sent, unrecorded"));
        assert_eq!(sink.sent().len(), 1);
    }

    #[test]
    fn summary_due_on_configured_hour() {
        let config = ReminderConfig::default();
        let sunday_nine = Utc.with_ymd_and_hms(2024, 6, 2, 9, 30, 0).unwrap();
        assert!(config.summary_due(sunday_nine));
        assert!(!config.summary_due(at(9, 30)));
    }
}
