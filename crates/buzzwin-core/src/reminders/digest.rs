//! Weekly summary and "someone joined your action" notices.

use chrono::{DateTime, Utc};

use super::{ReminderScheduler, RunReport, SkipReason};
use crate::email::templates;
use crate::error::Result;
use crate::ritual::UserRitualState;
use crate::streaks::StreakTracker;

const WEEKLY_SUMMARY: &str = "weekly_summary";

impl ReminderScheduler<'_> {
    /// Send every user who has not opted out a recap of their week.
    ///
    /// # Errors
    /// Only when the user list cannot be loaded.
    pub fn run_weekly_summary(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let mut report = RunReport::new(WEEKLY_SUMMARY, now);
        let states = self.store.all_states().map_err(|e| {
            tracing::error!("failed to load users for weekly summary: {e}");
            e
        })?;
        let tracker = StreakTracker::with_config(self.config.trend.clone());

        for row in &states {
            match row {
                Ok(state) => self.summarize_user(state, &tracker, now, &mut report),
                Err(unreadable) => report.unreadable(unreadable),
            }
        }

        report.log_summary();
        Ok(report)
    }

    fn summarize_user(
        &self,
        state: &UserRitualState,
        tracker: &StreakTracker,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) {
        let user = state.user_id.as_str();
        let today = now.date_naive();

        if !state.email_preferences.weekly_summary_enabled() {
            return report.skip(user, SkipReason::EmailOptOut);
        }
        match self.store.was_notified(user, today, WEEKLY_SUMMARY) {
            Ok(true) => return report.skip(user, SkipReason::AlreadyNotified),
            Ok(false) => {}
            Err(e) => return report.fail(user, e),
        }
        let Some(email) = self.resolve_email(user) else {
            return report.skip(user, SkipReason::NoEmail);
        };
        let dates = match self.store.completion_dates(user) {
            Ok(dates) => dates,
            Err(e) => return report.fail(user, e),
        };

        let stats = tracker.compute(&dates, today);
        let name = self.display_name(user);
        let message = templates::weekly_summary(&email, name.as_deref(), &stats, &self.config.app_url);
        self.dispatch(user, &message, WEEKLY_SUMMARY, now, report);
    }

    /// Tell the author of the root moment that `joiner_id` joined it via
    /// the linked moment `moment_id`.
    ///
    /// Missing moments, self-joins and opt-outs are reported as skips.
    ///
    /// # Errors
    /// Only when the store cannot be read.
    pub fn notify_joined_action(
        &self,
        moment_id: &str,
        joiner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RunReport> {
        let mut report = RunReport::new("joined_action", now);

        let Some(joined) = self.store.moment(moment_id)? else {
            report.skip(joiner_id, SkipReason::MissingMoment);
            return Ok(report);
        };
        let parent = match &joined.joined_from_moment_id {
            Some(parent_id) => self.store.moment(parent_id)?,
            None => None,
        };
        let Some(parent) = parent else {
            report.skip(joiner_id, SkipReason::MissingMoment);
            return Ok(report);
        };

        let owner = parent.user_id.as_str();
        if owner == joiner_id {
            report.skip(owner, SkipReason::SelfJoin);
            return Ok(report);
        }
        let opted_in = self
            .store
            .state(owner)?
            .map_or(true, |s| s.email_preferences.joined_action_enabled());
        if !opted_in {
            report.skip(owner, SkipReason::EmailOptOut);
            return Ok(report);
        }
        let kind = format!("joined_action:{}", joined.id);
        if self.store.was_notified(owner, now.date_naive(), &kind)? {
            report.skip(owner, SkipReason::AlreadyNotified);
            return Ok(report);
        }
        let Some(email) = self.resolve_email(owner) else {
            report.skip(owner, SkipReason::NoEmail);
            return Ok(report);
        };

        let owner_name = self.display_name(owner);
        let joiner_name = self
            .display_name(joiner_id)
            .unwrap_or_else(|| "Someone".to_string());
        let message = templates::joined_action(
            &email,
            owner_name.as_deref(),
            &joiner_name,
            &parent,
            &self.config.app_url,
        );
        self.dispatch(owner, &message, &kind, now, &mut report);
        report.log_summary();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::ReminderConfig;
    use super::*;
    use crate::email::DryRunEmailSink;
    use crate::ritual::{NewMoment, RitualService, UserAccount};
    use crate::storage::SqliteStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 9, 9, 0, 0).unwrap()
    }

    fn account(store: &SqliteStore, user: &str, email: Option<&str>) {
        store
            .upsert_account(&UserAccount {
                user_id: user.into(),
                email: email.map(str::to_string),
                display_name: user.to_uppercase(),
            })
            .unwrap();
    }

    #[test]
    fn weekly_summary_uses_completion_log() {
        let store = SqliteStore::open_in_memory().unwrap();
        let svc = RitualService::new(&store);
        account(&store, "u1", Some("u1@example.com"));
        svc.ensure_state("u1", now()).unwrap();
        store
            .conn()
            .execute_batch(
                "INSERT INTO ritual_completions VALUES ('u1', 'r', '2024-06-08', NULL, '2024-06-08T10:00:00Z');
                 INSERT INTO ritual_completions VALUES ('u1', 'r', '2024-06-09', NULL, '2024-06-09T08:00:00Z');",
            )
            .unwrap();

        let sink = DryRunEmailSink::new();
        let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());
        let report = scheduler.run_weekly_summary(now()).unwrap();
        assert_eq!(report.sent, 1);
        let msg = &sink.sent()[0];
        assert!(msg.text.contains("Current streak: 2 days"));
        // 2024-06-09 is a Sunday, so only today counts toward this week.
        assert!(msg.text.contains("Completed this week: 1"));

        let again = scheduler.run_weekly_summary(now()).unwrap();
        assert_eq!(again.skipped_for(SkipReason::AlreadyNotified), 1);
    }

    #[test]
    fn weekly_summary_respects_opt_out() {
        let store = SqliteStore::open_in_memory().unwrap();
        let svc = RitualService::new(&store);
        account(&store, "u1", Some("u1@example.com"));
        svc.update_state("u1", now(), |s| s.email_preferences.weekly_summary = Some(false))
            .unwrap();

        let sink = DryRunEmailSink::new();
        let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());
        let report = scheduler.run_weekly_summary(now()).unwrap();
        assert_eq!(report.skipped_for(SkipReason::EmailOptOut), 1);
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn joined_action_notifies_root_author_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let svc = RitualService::new(&store);
        account(&store, "alice", Some("alice@example.com"));
        account(&store, "bob", None);
        let root = svc
            .log_moment("alice", NewMoment { text: "Fed the birds".into(), ..Default::default() }, now())
            .unwrap();
        let child = svc.join_moment(&root.id, "bob", now()).unwrap();

        let sink = DryRunEmailSink::new();
        let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());
        let report = scheduler.notify_joined_action(&child.id, "bob", now()).unwrap();
        assert_eq!(report.sent, 1);
        let msg = &sink.sent()[0];
        assert_eq!(msg.to, "alice@example.com");
        assert_eq!(msg.subject, "BOB joined your action");

        let again = scheduler.notify_joined_action(&child.id, "bob", now()).unwrap();
        assert_eq!(again.skipped_for(SkipReason::AlreadyNotified), 1);
    }

    #[test]
    fn joined_action_skips_missing_and_opted_out() {
        let store = SqliteStore::open_in_memory().unwrap();
        let svc = RitualService::new(&store);
        account(&store, "alice", Some("alice@example.com"));
        let sink = DryRunEmailSink::new();
        let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());

        let report = scheduler.notify_joined_action("nope", "bob", now()).unwrap();
        assert_eq!(report.skipped_for(SkipReason::MissingMoment), 1);

        let root = svc
            .log_moment("alice", NewMoment { text: "Called grandma".into(), ..Default::default() }, now())
            .unwrap();
        // A root moment has no parent to notify.
        let report = scheduler.notify_joined_action(&root.id, "alice", now()).unwrap();
        assert_eq!(report.skipped_for(SkipReason::MissingMoment), 1);

        svc.update_state("alice", now(), |s| s.email_preferences.joined_action = Some(false))
            .unwrap();
        let child = svc.join_moment(&root.id, "bob", now()).unwrap();
        let report = scheduler.notify_joined_action(&child.id, "bob", now()).unwrap();
        assert_eq!(report.skipped_for(SkipReason::EmailOptOut), 1);
        assert!(sink.sent().is_empty());
    }
}
