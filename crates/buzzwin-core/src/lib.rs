//! # Buzzwin Core Library
//!
//! This library provides the scheduling logic behind Buzzwin rituals: small
//! recurring commitments users can create, join and complete. All operations
//! are exposed through the `buzzwin-cli` binary, which is a thin layer over
//! this crate.
//!
//! ## Architecture
//!
//! - **Recurrence**: RRULE-style codec and due-date evaluator
//! - **Streaks**: completion streaks and aggregates derived from the log
//! - **Quiet hours**: suppression windows that may wrap past midnight
//! - **Rituals**: documents and the operations users perform on them
//! - **Storage**: SQLite document store and TOML configuration
//! - **Email**: sinks, templates and invitation validation
//! - **Reminders**: the scheduled notification jobs
//!
//! ## Key Components
//!
//! - [`RecurrenceRule`]: decoded ritual schedule
//! - [`StreakTracker`]: computes [`StreakStats`] from completion dates
//! - [`RitualService`]: ritual, completion and moment operations
//! - [`SqliteStore`]: local implementation of the store and identity traits
//! - [`ReminderScheduler`]: ritual reminder, weekly summary and join notices

pub mod email;
pub mod error;
pub mod quiet_hours;
pub mod recurrence;
pub mod reminders;
pub mod ritual;
pub mod storage;
pub mod streaks;

pub use email::{DryRunEmailSink, EmailMessage, EmailSink, HttpEmailSink, InvitationRequest};
pub use error::{ConfigError, CoreError, EmailError, StoreError, ValidationError};
pub use quiet_hours::{is_in_quiet_hours, ClockTime, QuietHours};
pub use recurrence::{generate_rrule, parse_rrule, Frequency, RecurrenceRule, WeekdaySpec};
pub use reminders::{ReminderConfig, ReminderScheduler, RunReport, SkipReason};
pub use ritual::{
    ImpactMoment, RitualCompletion, RitualDefinition, RitualScope, RitualService,
    UserRitualState,
};
pub use storage::{Config, IdentityProvider, RitualStore, SqliteStore, StateRow, UnreadableState};
pub use streaks::{CompletionTrend, StreakStats, StreakTracker};
