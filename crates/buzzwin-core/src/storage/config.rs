//! TOML-based application configuration.
//!
//! Stores operator settings including:
//! - Reminder window and default reminder times
//! - Weekly summary schedule
//! - Email relay endpoint and sender
//! - Streak trend tuning
//!
//! Configuration is stored at `~/.config/buzzwin/config.toml`. The relay
//! API key is kept in the OS keyring, see [`super::credentials`].

use std::path::{Path, PathBuf};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::quiet_hours::{ClockTime, MINUTES_PER_DAY};
use crate::streaks::TrendConfig;

/// Reminder scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Minutes either side of the target time that count as "now".
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,
    /// Interval between scheduler ticks in `reminders watch`.
    #[serde(default = "default_tick_minutes")]
    pub tick_minutes: u32,
    #[serde(default = "default_morning_time")]
    pub default_morning_time: ClockTime,
    #[serde(default = "default_evening_time")]
    pub default_evening_time: ClockTime,
}

/// Weekly summary schedule (UTC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_weekday")]
    pub weekday: String,
    #[serde(default = "default_summary_hour")]
    pub hour: u32,
}

/// Outbound email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// HTTP JSON relay URL. Without it only dry runs can send.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Streak trend tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreaksConfig {
    #[serde(default = "default_trend_window_days")]
    pub trend_window_days: u32,
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold: f64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/buzzwin/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub streaks: StreaksConfig,
    /// Base URL for links in outgoing email.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

// Default functions
fn default_window_minutes() -> u32 {
    15
}
fn default_tick_minutes() -> u32 {
    15
}
fn default_morning_time() -> ClockTime {
    ClockTime::MORNING
}
fn default_evening_time() -> ClockTime {
    ClockTime::EVENING
}
fn default_summary_weekday() -> String {
    "sun".into()
}
fn default_summary_hour() -> u32 {
    9
}
fn default_from() -> String {
    "Buzzwin <hello@buzzwin.com>".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_trend_window_days() -> u32 {
    TrendConfig::default().window_days
}
fn default_trend_threshold() -> f64 {
    TrendConfig::default().threshold
}
fn default_app_url() -> String {
    "https://buzzwin.com".into()
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            tick_minutes: default_tick_minutes(),
            default_morning_time: default_morning_time(),
            default_evening_time: default_evening_time(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            weekday: default_summary_weekday(),
            hour: default_summary_hour(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            from: default_from(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StreaksConfig {
    fn default() -> Self {
        Self {
            trend_window_days: default_trend_window_days(),
            trend_threshold: default_trend_threshold(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reminders: RemindersConfig::default(),
            summary: SummaryConfig::default(),
            email: EmailConfig::default(),
            streaks: StreaksConfig::default(),
            app_url: default_app_url(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(key, e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(key, format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(key, format!("cannot parse '{value}' as number")));
                        }
                    }
                    // Optional strings start out as null.
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Path of the config file inside the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit file, writing defaults when it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value by dot-separated key without touching disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the new value is invalid.
    /// On error `self` is left unchanged.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(key, e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Check cross-field constraints the types alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = self.reminders.window_minutes;
        if window == 0 || window >= u32::from(MINUTES_PER_DAY) / 2 {
            return Err(invalid(
                "reminders.window_minutes",
                "must be between 1 and 719",
            ));
        }
        let tick = self.reminders.tick_minutes;
        if tick == 0 {
            return Err(invalid("reminders.tick_minutes", "must be positive"));
        }
        // A longer tick can step over a whole window.
        if tick > 2 * window {
            return Err(invalid(
                "reminders.tick_minutes",
                format!("must be at most twice reminders.window_minutes ({})", 2 * window),
            ));
        }
        self.summary_weekday()?;
        if self.summary.hour > 23 {
            return Err(invalid("summary.hour", "must be between 0 and 23"));
        }
        if let Some(endpoint) = &self.email.endpoint {
            url::Url::parse(endpoint).map_err(|e| invalid("email.endpoint", e.to_string()))?;
        }
        if self.email.timeout_secs == 0 {
            return Err(invalid("email.timeout_secs", "must be positive"));
        }
        if self.streaks.trend_window_days < 2 {
            return Err(invalid("streaks.trend_window_days", "must be at least 2"));
        }
        if !(0.0..=1.0).contains(&self.streaks.trend_threshold) {
            return Err(invalid("streaks.trend_threshold", "must be between 0 and 1"));
        }
        url::Url::parse(&self.app_url).map_err(|e| invalid("app_url", e.to_string()))?;
        Ok(())
    }

    /// Weekday on which the weekly summary goes out.
    pub fn summary_weekday(&self) -> Result<Weekday, ConfigError> {
        self.summary
            .weekday
            .parse::<Weekday>()
            .map_err(|_| invalid("summary.weekday", format!("unknown weekday '{}'", self.summary.weekday)))
    }

    pub fn trend_config(&self) -> TrendConfig {
        TrendConfig {
            window_days: self.streaks.trend_window_days,
            threshold: self.streaks.trend_threshold,
        }
    }
}
