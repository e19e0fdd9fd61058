//! Persistence: document store, identity lookup, configuration.
//!
//! The reminder jobs only see the [`RitualStore`] and [`IdentityProvider`]
//! traits. [`SqliteStore`] implements both on a local SQLite file.

mod config;
pub mod credentials;
pub mod migrations;
mod sqlite;

pub use config::{Config, EmailConfig, RemindersConfig, StreaksConfig, SummaryConfig};
pub use sqlite::SqliteStore;

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{ConfigError, StoreError};
use crate::ritual::{ImpactMoment, RitualDefinition, UserRitualState};

/// A stored state whose document could not be decoded.
#[derive(Debug)]
pub struct UnreadableState {
    pub user_id: String,
    pub error: StoreError,
}

/// One row of a state scan: the decoded state, or why it was unreadable.
pub type StateRow = Result<UserRitualState, UnreadableState>;

/// Read/write access the scheduled jobs need from the document store.
pub trait RitualStore {
    /// States with ritual scheduling turned on.
    ///
    /// The outer error means the scan itself failed. A corrupt document
    /// only spoils its own row.
    fn scheduled_states(&self) -> Result<Vec<StateRow>, StoreError>;

    /// Every stored state, decoded row by row like [`Self::scheduled_states`].
    fn all_states(&self) -> Result<Vec<StateRow>, StoreError>;

    fn state(&self, user_id: &str) -> Result<Option<UserRitualState>, StoreError>;

    /// The global ritual assigned to `date`, if any.
    fn global_ritual_for(&self, date: NaiveDate) -> Result<Option<RitualDefinition>, StoreError>;

    /// Distinct days on which the user completed any ritual, ascending.
    fn completion_dates(&self, user_id: &str) -> Result<Vec<NaiveDate>, StoreError>;

    fn moment(&self, id: &str) -> Result<Option<ImpactMoment>, StoreError>;

    /// Whether a notification of `kind` already went out for this user and day.
    fn was_notified(&self, user_id: &str, date: NaiveDate, kind: &str) -> Result<bool, StoreError>;

    /// Remember that a notification of `kind` went out.
    fn mark_notified(
        &self,
        user_id: &str,
        date: NaiveDate,
        kind: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Resolves users to contact details.
pub trait IdentityProvider {
    /// Email address on file; `None` when the user has none.
    fn resolve_email(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    /// Name to show other users; `None` when unknown.
    fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}

/// Returns `~/.config/buzzwin[-dev]/` based on BUZZWIN_ENV.
///
/// Set BUZZWIN_ENV=dev to use development data directory.
/// BUZZWIN_DATA_DIR, when set, replaces the directory entirely.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os("BUZZWIN_DATA_DIR").filter(|v| !v.is_empty()) {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir)
            .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("BUZZWIN_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("buzzwin-dev")
    } else {
        base_dir.join("buzzwin")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
