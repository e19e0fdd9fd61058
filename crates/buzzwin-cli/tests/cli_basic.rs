//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each test
//! points BUZZWIN_DATA_DIR at its own temporary directory.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "buzzwin-cli", "--"])
        .args(args)
        .env("BUZZWIN_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command failed: {args:?}\n{stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_rrule_parse_and_generate() {
    let dir = tempfile::tempdir().unwrap();

    let rule = run_json(dir.path(), &["rrule", "parse", "FREQ=WEEKLY;BYDAY=MO,WE"]);
    assert_eq!(rule["frequency"], "WEEKLY");
    assert_eq!(rule["interval"], 1);
    assert_eq!(rule["by_day"].as_array().unwrap().len(), 2);

    let legacy = run_json(dir.path(), &["rrule", "parse", "every day"]);
    assert!(legacy.is_null());

    let (stdout, _, code) = run_cli(
        dir.path(),
        &["rrule", "generate", "--freq", "monthly", "--by-day=-1FR"],
    );
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "FREQ=MONTHLY;BYDAY=-1FR");
}

#[test]
fn test_rrule_generate_rejects_weekly_without_days() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["rrule", "generate", "--freq", "weekly"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_rrule_due_and_next() {
    let dir = tempfile::tempdir().unwrap();

    let due = run_json(
        dir.path(),
        &["rrule", "due", "FREQ=DAILY;INTERVAL=2", "2024-06-03", "--anchor", "2024-06-01"],
    );
    assert_eq!(due["due"], true);

    let not_due = run_json(
        dir.path(),
        &["rrule", "due", "FREQ=DAILY;INTERVAL=2", "2024-06-04", "--anchor", "2024-06-01"],
    );
    assert_eq!(not_due["due"], false);

    let next = run_json(
        dir.path(),
        &["rrule", "next", "FREQ=MONTHLY;BYMONTHDAY=31", "--from", "2024-01-01", "--count", "3"],
    );
    assert_eq!(next, serde_json::json!(["2024-01-31", "2024-03-31", "2024-05-31"]));
}

#[test]
fn test_quiet_check() {
    let dir = tempfile::tempdir().unwrap();

    let inside = run_json(dir.path(), &["quiet", "check", "23:30", "22:00", "07:00"]);
    assert_eq!(inside["quiet"], true);
    let outside = run_json(dir.path(), &["quiet", "check", "12:00", "22:00", "07:00"]);
    assert_eq!(outside["quiet"], false);

    let (_, stderr, code) = run_cli(dir.path(), &["quiet", "check", "25:00", "22:00", "07:00"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_ritual_completion_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["user", "add", "alice", "--email", "alice@example.com"]);

    let ritual = run_json(dir.path(), &["ritual", "create", "Stretch", "--user", "alice"]);
    let id = ritual["id"].as_str().unwrap().to_string();
    assert_eq!(ritual["recurrence"], "FREQ=DAILY;INTERVAL=1");

    let first = run_json(dir.path(), &["ritual", "complete", &id, "--user", "alice"]);
    assert_eq!(first["recorded"], true);
    assert_eq!(first["state"]["current_streak"], 1);

    let second = run_json(dir.path(), &["ritual", "complete", &id, "--user", "alice"]);
    assert_eq!(second["recorded"], false);
    assert_eq!(second["state"]["total_completed"], 1);

    let stats = run_json(dir.path(), &["user", "stats", "alice"]);
    assert_eq!(stats["current_streak"], 1);
}

#[test]
fn test_personal_ritual_cannot_be_joined() {
    let dir = tempfile::tempdir().unwrap();
    let ritual = run_json(
        dir.path(),
        &["ritual", "create", "Journal", "--user", "alice", "--scope", "personalized"],
    );
    let id = ritual["id"].as_str().unwrap();

    let (_, stderr, code) = run_cli(dir.path(), &["ritual", "join", id, "--user", "bob"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_reminders_run_dry_run_sends_once() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["user", "add", "alice", "--email", "alice@example.com"]);
    let global = run_json(
        dir.path(),
        &["ritual", "create", "Send a kind message", "--user", "admin", "--scope", "global"],
    );
    let id = global["id"].as_str().unwrap();
    run_json(dir.path(), &["ritual", "set-global", id, "--date", "2024-06-03"]);

    let args = ["reminders", "run", "--at", "2024-06-03T08:00:00Z", "--dry-run"];
    let report = run_json(dir.path(), &args);
    assert_eq!(report["sent"], 1);

    let again = run_json(dir.path(), &args);
    assert_eq!(again["sent"], 0);
}

#[test]
fn test_invite_rejects_bad_address() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(
        dir.path(),
        &["invite", "send", "--to", "not-an-email", "--subject", "Hi", "--html", "<p>Hi</p>", "--dry-run"],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));

    let ok = run_json(
        dir.path(),
        &["invite", "send", "--to", "friend@example.com", "--subject", "Hi", "--html", "<p>Hi</p>", "--dry-run"],
    );
    assert_eq!(ok["sent"], true);
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "reminders.window_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "15");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "reminders.window_minutes", "10"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "reminders.window_minutes"]);
    assert_eq!(stdout.trim(), "10");

    // The default 15-minute tick would step over a 5-minute window.
    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "reminders.window_minutes", "5"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("tick_minutes"));

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "reminders.window_minutes", "0"]);
    assert_ne!(code, 0);
    let (_, _, code) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_completions() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("buzzwin-cli"));
}
