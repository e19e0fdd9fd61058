//! Rituals, completions, per-user state and impact moments.
//!
//! [`model`] holds the persisted documents; [`RitualService`] implements
//! the user-facing operations on top of a [`crate::storage::SqliteStore`].

mod model;
mod service;

pub use model::{
    EffortLevel, EmailPreferences, ImpactMoment, NewRitual, NotificationPreferences,
    RitualCompletion, RitualDefinition, RitualScope, RitualUpdate, TimeOfDay, UserAccount,
    UserRitualState,
};
pub use service::{NewMoment, RitualService};
