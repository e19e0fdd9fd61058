//! Integration tests for the reminder jobs against an in-memory store.

use buzzwin_core::ritual::{NewRitual, RitualUpdate, UserAccount};
use buzzwin_core::{
    ClockTime, DryRunEmailSink, RecurrenceRule, ReminderConfig, ReminderScheduler, RitualScope,
    RitualService, RitualStore, SkipReason, SqliteStore,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, d, h, m, 0).unwrap()
}

fn setup(users: &[&str]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    let svc = RitualService::new(&store);
    let created = at(1, 0, 0);
    let global = svc
        .create_ritual(
            "admin",
            NewRitual {
                title: "Send a kind message".into(),
                description: "Text someone you appreciate.".into(),
                tags: vec!["kindness".into()],
                effort: Default::default(),
                time_of_day: Default::default(),
                duration: "2 minutes".into(),
                rule: RecurrenceRule::daily(1),
                scope: RitualScope::Global,
            },
            created,
        )
        .unwrap();
    for day in 1..=30 {
        svc.set_global(NaiveDate::from_ymd_opt(2024, 6, day).unwrap(), &global.id)
            .unwrap();
    }
    for user in users {
        store
            .upsert_account(&UserAccount {
                user_id: user.to_string(),
                email: Some(format!("{user}@example.com")),
                display_name: String::new(),
            })
            .unwrap();
        svc.ensure_state(user, created).unwrap();
    }
    store
}

#[test]
fn default_morning_reminder_follows_the_window() {
    let store = setup(&["uma"]);
    let sink = DryRunEmailSink::new();
    let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());

    assert_eq!(scheduler.run_ritual_reminders(at(3, 8, 5)).unwrap().sent, 1);
    let late = scheduler.run_ritual_reminders(at(4, 8, 20)).unwrap();
    assert_eq!(late.sent, 0);
    assert_eq!(late.skipped_for(SkipReason::OutsideWindow), 1);
}

#[test]
fn each_day_gets_its_own_reminder() {
    let store = setup(&["uma"]);
    let sink = DryRunEmailSink::new();
    let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());

    // Ticking every five minutes sends once per day.
    for day in [3, 4] {
        for minute in (0..60).step_by(5) {
            scheduler.run_ritual_reminders(at(day, 7, minute)).unwrap();
            scheduler.run_ritual_reminders(at(day, 8, minute)).unwrap();
        }
    }
    assert_eq!(sink.sent().len(), 2);
    assert!(store.was_notified("uma", NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(), "morning_reminder").unwrap());
}

#[test]
fn quiet_hours_override_a_matching_window() {
    let store = setup(&["uma"]);
    RitualService::new(&store)
        .update_state("uma", at(1, 0, 0), |s| {
            let prefs = &mut s.notification_preferences;
            prefs.morning_time = "06:30".parse().ok();
            prefs.quiet_hours_start = "22:00".parse().ok();
            prefs.quiet_hours_end = "07:00".parse().ok();
        })
        .unwrap();
    let sink = DryRunEmailSink::new();
    let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());

    let report = scheduler.run_ritual_reminders(at(3, 6, 35)).unwrap();
    assert_eq!(report.skipped_for(SkipReason::QuietHours), 1);
    assert!(sink.sent().is_empty());
}

#[test]
fn narrower_configured_window_is_honoured() {
    let store = setup(&["uma"]);
    let sink = DryRunEmailSink::new();
    let config = ReminderConfig {
        window_minutes: 5,
        default_morning_time: ClockTime::new(9, 0).unwrap(),
        ..ReminderConfig::default()
    };
    let scheduler = ReminderScheduler::new(&store, &store, &sink, config);

    assert_eq!(scheduler.run_ritual_reminders(at(3, 9, 5)).unwrap().sent, 0);
    assert_eq!(scheduler.run_ritual_reminders(at(3, 8, 55)).unwrap().sent, 1);
}

#[test]
fn state_documents_without_preferences_still_get_mail() {
    let store = setup(&[]);
    store
        .upsert_account(&UserAccount {
            user_id: "legacy".into(),
            email: Some("legacy@example.com".into()),
            display_name: "Lee".into(),
        })
        .unwrap();
    store
        .conn()
        .execute(
            "INSERT INTO user_ritual_states (user_id, rituals_enabled, doc) VALUES (?1, 1, ?2)",
            [
                "legacy",
                r#"{"user_id":"legacy","created_at":"2024-06-01T00:00:00Z","updated_at":"2024-06-01T00:00:00Z"}"#,
            ],
        )
        .unwrap();

    let sink = DryRunEmailSink::new();
    let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());
    assert_eq!(scheduler.run_ritual_reminders(at(3, 8, 0)).unwrap().sent, 1);
    assert!(sink.sent()[0].text.starts_with("Hi Lee,"));

    let summary = scheduler.run_weekly_summary(at(9, 9, 0)).unwrap();
    assert_eq!(summary.sent, 1);
}

#[test]
fn unreadable_state_does_not_block_the_cohort() {
    let store = setup(&["good"]);
    store
        .conn()
        .execute(
            "INSERT INTO user_ritual_states (user_id, rituals_enabled, doc) VALUES (?1, 1, ?2)",
            [
                "bad",
                r#"{"user_id":"bad","notification_preferences":{"morningTime":"8.00"},"created_at":"2024-06-01T00:00:00Z","updated_at":"2024-06-01T00:00:00Z"}"#,
            ],
        )
        .unwrap();

    let sink = DryRunEmailSink::new();
    let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());

    let report = scheduler.run_ritual_reminders(at(3, 8, 0)).unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(sink.sent()[0].to, "good@example.com");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].user_id, "bad");

    let summary = scheduler.run_weekly_summary(at(9, 9, 0)).unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed[0].user_id, "bad");
}

#[test]
fn global_reminder_uses_current_ritual_title() {
    let store = setup(&["uma"]);
    let svc = RitualService::new(&store);
    let global = store.global_ritual_for(at(3, 0, 0).date_naive()).unwrap().unwrap();
    svc.update_ritual(
        &global.id,
        "admin",
        RitualUpdate {
            title: Some("Write a thank-you note".into()),
            ..Default::default()
        },
        at(2, 0, 0),
    )
    .unwrap();

    let sink = DryRunEmailSink::new();
    let scheduler = ReminderScheduler::new(&store, &store, &sink, ReminderConfig::default());
    scheduler.run_ritual_reminders(at(3, 8, 0)).unwrap();
    assert_eq!(sink.sent()[0].subject, "Your morning ritual: Write a thank-you note");
}
