//! Database schema migrations for the ritual store.
//!
//! Migrations are versioned and applied automatically when opening the store.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!("failed to read schema_version: {e}");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: documents, completions and identities.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_accounts (
            user_id      TEXT PRIMARY KEY,
            email        TEXT,
            display_name TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS user_ritual_states (
            user_id         TEXT PRIMARY KEY,
            rituals_enabled INTEGER NOT NULL DEFAULT 1,
            doc             TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rituals (
            id         TEXT PRIMARY KEY,
            scope      TEXT NOT NULL,
            created_by TEXT NOT NULL,
            doc        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS global_rituals (
            date      TEXT PRIMARY KEY,
            ritual_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ritual_completions (
            user_id          TEXT NOT NULL,
            ritual_id        TEXT NOT NULL,
            date             TEXT NOT NULL,
            shared_moment_id TEXT,
            completed_at     TEXT NOT NULL,
            PRIMARY KEY (user_id, ritual_id, date)
        );

        CREATE TABLE IF NOT EXISTS impact_moments (
            id      TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            doc     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_states_enabled ON user_ritual_states(rituals_enabled);
        CREATE INDEX IF NOT EXISTS idx_rituals_scope ON rituals(scope);
        CREATE INDEX IF NOT EXISTS idx_completions_user_date ON ritual_completions(user_id, date);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: per-day notification log.
///
/// Makes each notification kind at-most-once per user and UTC day,
/// independent of how often the scheduler ticks.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS notification_log (
            user_id TEXT NOT NULL,
            date    TEXT NOT NULL,
            kind    TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            PRIMARY KEY (user_id, date, kind)
        );",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
