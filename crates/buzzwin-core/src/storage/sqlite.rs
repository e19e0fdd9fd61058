//! SQLite-backed document store.
//!
//! Documents are kept as JSON text next to the handful of columns that
//! queries filter on. Completions live in their own table so the
//! `(user, ritual, date)` uniqueness is enforced by the primary key.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{data_dir, migrations, IdentityProvider, RitualStore, StateRow, UnreadableState};
use crate::error::{CoreError, StoreError};
use crate::ritual::{
    ImpactMoment, RitualCompletion, RitualDefinition, RitualScope, UserAccount, UserRitualState,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn encode<T: Serialize>(doc: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(doc)?)
}

fn decode<T: DeserializeOwned>(kind: &'static str, id: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        kind,
        id: id.to_string(),
        message: e.to_string(),
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(kind: &'static str, id: &str, raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| StoreError::Corrupt {
        kind,
        id: id.to_string(),
        message: e.to_string(),
    })
}

/// SQLite store for rituals, completions, user state and identities.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the store at `~/.config/buzzwin/buzzwin.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("buzzwin.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (creating if needed) the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // === Accounts ===

    pub fn upsert_account(&self, account: &UserAccount) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO user_accounts (user_id, email, display_name) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET email = excluded.email,
                                                display_name = excluded.display_name",
            params![account.user_id, account.email, account.display_name],
        )?;
        Ok(())
    }

    pub fn get_account(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError> {
        let account = self
            .conn
            .query_row(
                "SELECT user_id, email, display_name FROM user_accounts WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserAccount {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        display_name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }

    // === User ritual state ===

    pub fn get_state(&self, user_id: &str) -> Result<Option<UserRitualState>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT doc FROM user_ritual_states WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|doc| decode("user state", user_id, &doc)).transpose()
    }

    pub fn save_state(&self, state: &UserRitualState) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO user_ritual_states (user_id, rituals_enabled, doc) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET rituals_enabled = excluded.rituals_enabled,
                                                doc = excluded.doc",
            params![state.user_id, state.rituals_enabled, encode(state)?],
        )?;
        Ok(())
    }

    fn query_states(&self, sql: &str) -> Result<Vec<StateRow>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut states = Vec::new();
        for row in rows {
            let (user_id, doc) = row?;
            let state: Result<UserRitualState, StoreError> = decode("user state", &user_id, &doc);
            states.push(state.map_err(|error| UnreadableState { user_id, error }));
        }
        Ok(states)
    }

    // === Rituals ===

    pub fn insert_ritual(&self, ritual: &RitualDefinition) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rituals (id, scope, created_by, doc) VALUES (?1, ?2, ?3, ?4)",
            params![ritual.id, ritual.scope.as_str(), ritual.created_by, encode(ritual)?],
        )?;
        Ok(())
    }

    pub fn save_ritual(&self, ritual: &RitualDefinition) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE rituals SET scope = ?2, created_by = ?3, doc = ?4 WHERE id = ?1",
            params![ritual.id, ritual.scope.as_str(), ritual.created_by, encode(ritual)?],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "ritual",
                id: ritual.id.clone(),
            });
        }
        Ok(())
    }

    pub fn get_ritual(&self, id: &str) -> Result<Option<RitualDefinition>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT doc FROM rituals WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        raw.map(|doc| decode("ritual", id, &doc)).transpose()
    }

    /// All rituals, optionally restricted to one scope.
    pub fn list_rituals(&self, scope: Option<RitualScope>) -> Result<Vec<RitualDefinition>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, doc FROM rituals WHERE ?1 IS NULL OR scope = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![scope.map(|s| s.as_str())], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut rituals = Vec::new();
        for row in rows {
            let (id, doc) = row?;
            rituals.push(decode("ritual", &id, &doc)?);
        }
        Ok(rituals)
    }

    // === Global ritual of the day ===

    pub fn set_global_ritual(&self, date: NaiveDate, ritual_id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO global_rituals (date, ritual_id) VALUES (?1, ?2)",
            params![format_date(date), ritual_id],
        )?;
        Ok(())
    }

    // === Completions ===

    /// Store a completion unless one already exists for the same
    /// user, ritual and day. Returns whether a row was written.
    pub fn insert_completion(&self, completion: &RitualCompletion) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO ritual_completions
                 (user_id, ritual_id, date, shared_moment_id, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                completion.user_id,
                completion.ritual_id,
                format_date(completion.date),
                completion.shared_moment_id,
                completion.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn completions_for_user(&self, user_id: &str) -> Result<Vec<RitualCompletion>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ritual_id, date, shared_moment_id, completed_at
             FROM ritual_completions WHERE user_id = ?1
             ORDER BY date, ritual_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut completions = Vec::new();
        for row in rows {
            let (ritual_id, date, shared_moment_id, completed_at) = row?;
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StoreError::Corrupt {
                    kind: "completion",
                    id: format!("{user_id}/{ritual_id}/{date}"),
                    message: e.to_string(),
                })?;
            completions.push(RitualCompletion {
                user_id: user_id.to_string(),
                date: parse_date("completion", &ritual_id, &date)?,
                ritual_id,
                shared_moment_id,
                completed_at,
            });
        }
        Ok(completions)
    }

    // === Impact moments ===

    pub fn insert_moment(&self, moment: &ImpactMoment) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO impact_moments (id, user_id, doc) VALUES (?1, ?2, ?3)",
            params![moment.id, moment.user_id, encode(moment)?],
        )?;
        Ok(())
    }

    pub fn save_moment(&self, moment: &ImpactMoment) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE impact_moments SET doc = ?2 WHERE id = ?1",
            params![moment.id, encode(moment)?],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: "moment",
                id: moment.id.clone(),
            });
        }
        Ok(())
    }
}

impl RitualStore for SqliteStore {
    fn scheduled_states(&self) -> Result<Vec<StateRow>, StoreError> {
        self.query_states(
            "SELECT user_id, doc FROM user_ritual_states WHERE rituals_enabled = 1 ORDER BY user_id",
        )
    }

    fn all_states(&self) -> Result<Vec<StateRow>, StoreError> {
        self.query_states("SELECT user_id, doc FROM user_ritual_states ORDER BY user_id")
    }

    fn state(&self, user_id: &str) -> Result<Option<UserRitualState>, StoreError> {
        self.get_state(user_id)
    }

    fn global_ritual_for(&self, date: NaiveDate) -> Result<Option<RitualDefinition>, StoreError> {
        let ritual_id: Option<String> = self
            .conn
            .query_row(
                "SELECT ritual_id FROM global_rituals WHERE date = ?1",
                params![format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        match ritual_id {
            Some(id) => self.get_ritual(&id),
            None => Ok(None),
        }
    }

    fn completion_dates(&self, user_id: &str) -> Result<Vec<NaiveDate>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT date FROM ritual_completions WHERE user_id = ?1 ORDER BY date",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut dates = Vec::new();
        for row in rows {
            dates.push(parse_date("completion", user_id, &row?)?);
        }
        Ok(dates)
    }

    fn moment(&self, id: &str) -> Result<Option<ImpactMoment>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT doc FROM impact_moments WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|doc| decode("moment", id, &doc)).transpose()
    }

    fn was_notified(&self, user_id: &str, date: NaiveDate, kind: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notification_log WHERE user_id = ?1 AND date = ?2 AND kind = ?3",
            params![user_id, format_date(date), kind],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn mark_notified(
        &self,
        user_id: &str,
        date: NaiveDate,
        kind: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO notification_log (user_id, date, kind, sent_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, format_date(date), kind, at.to_rfc3339()],
        )?;
        Ok(())
    }
}

impl IdentityProvider for SqliteStore {
    fn resolve_email(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .get_account(user_id)?
            .and_then(|a| a.email)
            .filter(|e| !e.trim().is_empty()))
    }

    fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .get_account(user_id)?
            .map(|a| a.display_name)
            .filter(|n| !n.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ritual::{EffortLevel, TimeOfDay};
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ritual(id: &str, scope: RitualScope) -> RitualDefinition {
        let now = Utc::now();
        RitualDefinition {
            id: id.into(),
            created_by: "alice".into(),
            title: "Breathe".into(),
            description: String::new(),
            tags: vec![],
            effort: EffortLevel::Low,
            time_of_day: TimeOfDay::Anytime,
            duration: "1 minute".into(),
            recurrence: "FREQ=DAILY;INTERVAL=1".into(),
            scope,
            members: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn completion(user: &str, ritual: &str, day: NaiveDate) -> RitualCompletion {
        RitualCompletion {
            user_id: user.into(),
            ritual_id: ritual.into(),
            date: day,
            shared_moment_id: None,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn completions_are_unique_per_user_ritual_day() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = date(2024, 6, 1);
        assert!(store.insert_completion(&completion("u1", "r1", day)).unwrap());
        assert!(!store.insert_completion(&completion("u1", "r1", day)).unwrap());
        assert!(store.insert_completion(&completion("u1", "r2", day)).unwrap());
        assert_eq!(store.completions_for_user("u1").unwrap().len(), 2);
        // Two rituals on the same day count as one completion day.
        assert_eq!(store.completion_dates("u1").unwrap(), vec![day]);
    }

    #[test]
    fn scheduled_states_filter_on_enabled_flag() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.save_state(&UserRitualState::new("on", now)).unwrap();
        let mut off = UserRitualState::new("off", now);
        off.rituals_enabled = false;
        store.save_state(&off).unwrap();

        let scheduled = store.scheduled_states().unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].as_ref().unwrap().user_id, "on");
        assert_eq!(store.all_states().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_state_only_spoils_its_own_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_state(&UserRitualState::new("good", Utc::now())).unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO user_ritual_states (user_id, rituals_enabled, doc) VALUES ('bad', 1, '{not json')",
                [],
            )
            .unwrap();

        let rows = store.scheduled_states().unwrap();
        assert_eq!(rows.len(), 2);
        let unreadable = rows[0].as_ref().unwrap_err();
        assert_eq!(unreadable.user_id, "bad");
        assert!(matches!(unreadable.error, StoreError::Corrupt { .. }));
        assert_eq!(rows[1].as_ref().unwrap().user_id, "good");
    }

    #[test]
    fn rituals_round_trip_and_filter_by_scope() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_ritual(&ritual("a", RitualScope::Public)).unwrap();
        store.insert_ritual(&ritual("b", RitualScope::Global)).unwrap();

        assert_eq!(store.get_ritual("a").unwrap().unwrap().title, "Breathe");
        assert!(store.get_ritual("zzz").unwrap().is_none());
        assert_eq!(store.list_rituals(None).unwrap().len(), 2);
        assert_eq!(store.list_rituals(Some(RitualScope::Global)).unwrap()[0].id, "b");

        let missing = store.save_ritual(&ritual("nope", RitualScope::Public));
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn global_ritual_lookup_by_date() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_ritual(&ritual("g", RitualScope::Global)).unwrap();
        store.set_global_ritual(date(2024, 6, 1), "g").unwrap();

        assert_eq!(store.global_ritual_for(date(2024, 6, 1)).unwrap().unwrap().id, "g");
        assert!(store.global_ritual_for(date(2024, 6, 2)).unwrap().is_none());
    }

    #[test]
    fn notification_log_is_per_day_and_kind() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = date(2024, 6, 1);
        assert!(!store.was_notified("u1", day, "morning").unwrap());
        store.mark_notified("u1", day, "morning", Utc::now()).unwrap();
        store.mark_notified("u1", day, "morning", Utc::now()).unwrap();
        assert!(store.was_notified("u1", day, "morning").unwrap());
        assert!(!store.was_notified("u1", day, "evening").unwrap());
        assert!(!store.was_notified("u1", date(2024, 6, 2), "morning").unwrap());
    }

    #[test]
    fn identity_ignores_blank_email() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_account(&UserAccount {
                user_id: "u1".into(),
                email: Some("  ".into()),
                display_name: "Uma".into(),
            })
            .unwrap();
        assert_eq!(store.resolve_email("u1").unwrap(), None);
        assert_eq!(store.display_name("u1").unwrap().as_deref(), Some("Uma"));
        assert_eq!(store.resolve_email("ghost").unwrap(), None);
    }

    #[test]
    fn corrupt_documents_are_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO user_ritual_states (user_id, rituals_enabled, doc) VALUES ('bad', 1, '{')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.get_state("bad"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buzzwin.db");
        {
            let store = SqliteStore::open_at(&path).unwrap();
            store.save_state(&UserRitualState::new("u1", Utc::now())).unwrap();
        }
        let store = SqliteStore::open_at(&path).unwrap();
        assert!(store.get_state("u1").unwrap().is_some());
    }
}
