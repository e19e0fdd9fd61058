//! Ritual operations: create, join, complete, and share moments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::model::{
    ImpactMoment, NewRitual, RitualCompletion, RitualDefinition, RitualScope, RitualUpdate,
    UserRitualState,
};
use crate::error::{Result, StoreError, ValidationError};
use crate::storage::{RitualStore, SqliteStore};
use crate::streaks::{StreakStats, StreakTracker};

/// Input for logging an impact moment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMoment {
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ritual_id: Option<String>,
}

/// Ritual operations over the local store.
pub struct RitualService<'a> {
    store: &'a SqliteStore,
    tracker: StreakTracker,
}

fn not_found(kind: &'static str, id: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn require_text(field: &'static str, value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

impl<'a> RitualService<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self::with_tracker(store, StreakTracker::new())
    }

    pub fn with_tracker(store: &'a SqliteStore, tracker: StreakTracker) -> Self {
        Self { store, tracker }
    }

    // === Rituals ===

    /// Create a ritual owned by `creator`.
    ///
    /// # Errors
    /// Returns a validation error for an empty title or a malformed rule.
    pub fn create_ritual(
        &self,
        creator: &str,
        input: NewRitual,
        now: DateTime<Utc>,
    ) -> Result<RitualDefinition> {
        require_text("created_by", creator)?;
        require_text("title", &input.title)?;
        input.rule.validate()?;

        let ritual = RitualDefinition {
            id: uuid::Uuid::new_v4().to_string(),
            created_by: creator.to_string(),
            title: input.title.trim().to_string(),
            description: input.description,
            tags: input.tags,
            effort: input.effort,
            time_of_day: input.time_of_day,
            duration: input.duration,
            recurrence: input.rule.to_string(),
            scope: input.scope,
            members: Default::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_ritual(&ritual)?;
        tracing::info!(ritual = %ritual.id, creator, "created ritual");
        Ok(ritual)
    }

    pub fn ritual(&self, id: &str) -> Result<RitualDefinition> {
        Ok(self
            .store
            .get_ritual(id)?
            .ok_or_else(|| not_found("ritual", id))?)
    }

    /// Apply a partial edit. Only the creator may edit a ritual.
    pub fn update_ritual(
        &self,
        id: &str,
        editor: &str,
        update: RitualUpdate,
        now: DateTime<Utc>,
    ) -> Result<RitualDefinition> {
        let mut ritual = self.ritual(id)?;
        if ritual.created_by != editor {
            return Err(StoreError::Rejected(format!(
                "only the creator can edit ritual '{id}'"
            ))
            .into());
        }

        if let Some(title) = update.title {
            require_text("title", &title)?;
            ritual.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            ritual.description = description;
        }
        if let Some(tags) = update.tags {
            ritual.tags = tags;
        }
        if let Some(effort) = update.effort {
            ritual.effort = effort;
        }
        if let Some(rule) = update.rule {
            rule.validate()?;
            ritual.recurrence = rule.to_string();
        }
        if let Some(scope) = update.scope {
            ritual.scope = scope;
        }
        ritual.updated_at = now;

        self.store.save_ritual(&ritual)?;
        Ok(ritual)
    }

    pub fn list_public(&self) -> Result<Vec<RitualDefinition>> {
        Ok(self.store.list_rituals(Some(RitualScope::Public))?)
    }

    /// Add `user_id` to a ritual's members. Returns `false` when the user
    /// already belonged to it.
    pub fn join(&self, ritual_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        require_text("user_id", user_id)?;
        let mut ritual = self.ritual(ritual_id)?;
        if ritual.is_member(user_id) {
            return Ok(false);
        }
        if ritual.scope == RitualScope::Personalized {
            return Err(StoreError::Rejected(format!(
                "ritual '{ritual_id}' is personal to its creator"
            ))
            .into());
        }
        ritual.members.insert(user_id.to_string());
        ritual.updated_at = now;
        self.store.save_ritual(&ritual)?;
        Ok(true)
    }

    /// Remove `user_id` from a ritual. The creator cannot leave their own
    /// ritual. Returns `false` when the user was not a member.
    pub fn leave(&self, ritual_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut ritual = self.ritual(ritual_id)?;
        if ritual.created_by == user_id {
            return Err(StoreError::Rejected(format!(
                "the creator cannot leave ritual '{ritual_id}'"
            ))
            .into());
        }
        if !ritual.members.remove(user_id) {
            return Ok(false);
        }
        ritual.updated_at = now;
        self.store.save_ritual(&ritual)?;
        Ok(true)
    }

    /// Assign the global ritual of the day.
    pub fn set_global(&self, date: NaiveDate, ritual_id: &str) -> Result<()> {
        let ritual = self.ritual(ritual_id)?;
        if ritual.scope != RitualScope::Global {
            return Err(StoreError::Rejected(format!(
                "ritual '{ritual_id}' is {}, not global",
                ritual.scope.as_str()
            ))
            .into());
        }
        self.store.set_global_ritual(date, ritual_id)?;
        Ok(())
    }

    pub fn global(&self, date: NaiveDate) -> Result<Option<RitualDefinition>> {
        Ok(self.store.global_ritual_for(date)?)
    }

    /// Rituals the user belongs to that fall due on `date`, plus the
    /// global ritual assigned to that date.
    pub fn rituals_due(&self, user_id: &str, date: NaiveDate) -> Result<Vec<RitualDefinition>> {
        let mut due: Vec<RitualDefinition> = self
            .store
            .list_rituals(None)?
            .into_iter()
            .filter(|r| r.is_member(user_id) && r.is_due_on(date))
            .collect();

        if let Some(global) = self.global(date)? {
            if !due.iter().any(|r| r.id == global.id) {
                due.push(global);
            }
        }
        Ok(due)
    }

    // === User state ===

    /// Load the user's state, creating it with defaults on first use.
    pub fn ensure_state(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserRitualState> {
        require_text("user_id", user_id)?;
        if let Some(state) = self.store.get_state(user_id)? {
            return Ok(state);
        }
        let state = UserRitualState::new(user_id, now);
        self.store.save_state(&state)?;
        tracing::debug!(user = user_id, "created ritual state");
        Ok(state)
    }

    /// Load, modify and save the user's state.
    pub fn update_state<F>(&self, user_id: &str, now: DateTime<Utc>, edit: F) -> Result<UserRitualState>
    where
        F: FnOnce(&mut UserRitualState),
    {
        let mut state = self.ensure_state(user_id, now)?;
        edit(&mut state);
        state.updated_at = now;
        self.store.save_state(&state)?;
        Ok(state)
    }

    // === Completions ===

    /// Record that `user_id` completed `ritual_id` on `date`.
    ///
    /// Completing the same ritual twice on one day is a no-op and returns
    /// `false`. Otherwise the user's cached counters are recomputed from
    /// the completion log.
    pub fn record_completion(
        &self,
        user_id: &str,
        ritual_id: &str,
        date: NaiveDate,
        shared_moment_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let ritual = self.ritual(ritual_id)?;
        let is_todays_global = ritual.scope == RitualScope::Global
            && self.global(date)?.is_some_and(|g| g.id == ritual.id);
        if !ritual.is_member(user_id) && !is_todays_global {
            return Err(StoreError::Rejected(format!(
                "user '{user_id}' has not joined ritual '{ritual_id}'"
            ))
            .into());
        }
        if date > now.date_naive() {
            return Err(ValidationError::InvalidValue {
                field: "date".into(),
                message: format!("{date} is in the future"),
            }
            .into());
        }

        let inserted = self.store.insert_completion(&RitualCompletion {
            user_id: user_id.to_string(),
            ritual_id: ritual_id.to_string(),
            date,
            shared_moment_id,
            completed_at: now,
        })?;
        if !inserted {
            tracing::debug!(user = user_id, ritual = ritual_id, %date, "completion already recorded");
            return Ok(false);
        }

        self.refresh_counters(user_id, now)?;
        Ok(true)
    }

    /// Recompute the cached counters on the user's state from the log.
    pub fn refresh_counters(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserRitualState> {
        let dates = self.store.completion_dates(user_id)?;
        let stats = self.tracker.compute(&dates, now.date_naive());
        let last = dates.last().copied();
        self.update_state(user_id, now, |state| state.apply_stats(&stats, last))
    }

    pub fn stats(&self, user_id: &str, today: NaiveDate) -> Result<StreakStats> {
        let dates = self.store.completion_dates(user_id)?;
        Ok(self.tracker.compute(&dates, today))
    }

    // === Impact moments ===

    pub fn log_moment(&self, user_id: &str, input: NewMoment, now: DateTime<Utc>) -> Result<ImpactMoment> {
        require_text("user_id", user_id)?;
        require_text("text", &input.text)?;
        if let Some(ritual_id) = &input.ritual_id {
            self.ritual(ritual_id)?;
        }
        let moment = ImpactMoment {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            text: input.text.trim().to_string(),
            tags: input.tags,
            ritual_id: input.ritual_id,
            joined_from_moment_id: None,
            joined_by_users: Vec::new(),
            created_at: now,
        };
        self.store.insert_moment(&moment)?;
        Ok(moment)
    }

    /// Join another user's moment, creating a linked moment for `joiner`.
    ///
    /// Joining a moment that was itself joined links to its root, so the
    /// relation never grows deeper than one level.
    pub fn join_moment(&self, moment_id: &str, joiner: &str, now: DateTime<Utc>) -> Result<ImpactMoment> {
        require_text("user_id", joiner)?;
        let joined = self
            .store
            .moment(moment_id)?
            .ok_or_else(|| not_found("moment", moment_id))?;
        let mut root = match &joined.joined_from_moment_id {
            Some(parent_id) => self
                .store
                .moment(parent_id)?
                .ok_or_else(|| not_found("moment", parent_id))?,
            None => joined,
        };

        if root.user_id == joiner {
            return Err(StoreError::Rejected("cannot join your own moment".into()).into());
        }
        if root.joined_by_users.iter().any(|u| u == joiner) {
            return Err(StoreError::Rejected(format!(
                "user '{joiner}' already joined moment '{}'",
                root.id
            ))
            .into());
        }

        let child = ImpactMoment {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: joiner.to_string(),
            text: root.text.clone(),
            tags: root.tags.clone(),
            ritual_id: root.ritual_id.clone(),
            joined_from_moment_id: Some(root.id.clone()),
            joined_by_users: Vec::new(),
            created_at: now,
        };
        root.joined_by_users.push(joiner.to_string());

        let tx = self.store.conn().unchecked_transaction()?;
        self.store.save_moment(&root)?;
        self.store.insert_moment(&child)?;
        tx.commit()?;

        tracing::info!(moment = %root.id, joiner, "moment joined");
        Ok(child)
    }
}
