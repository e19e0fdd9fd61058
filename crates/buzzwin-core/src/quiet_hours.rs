//! Quiet hours - suppress notifications inside a daily time window.
//!
//! Windows are half-open (`start` inclusive, `end` exclusive) and may wrap
//! past midnight, e.g. 22:00 - 07:00. Every minute of the day falls either
//! inside or outside a given window.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Minutes in one day.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Time of day with minute precision, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime { minutes: 0 };
    /// Default morning reminder time.
    pub const MORNING: ClockTime = ClockTime { minutes: 8 * 60 };
    /// Default evening reminder time.
    pub const EVENING: ClockTime = ClockTime { minutes: 20 * 60 };

    /// Build from hour (0-23) and minute (0-59).
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self {
                minutes: hour as u16 * 60 + minute as u16,
            })
        } else {
            None
        }
    }

    /// Build from minutes since midnight (0-1439).
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self { minutes })
    }

    /// UTC wall-clock time of an instant.
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self {
            minutes: (instant.hour() * 60 + instant.minute()) as u16,
        }
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.minutes
    }

    pub fn hour(self) -> u8 {
        (self.minutes / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.minutes % 60) as u8
    }

    /// Signed distance from `other` to `self` on the 24-hour circle, in
    /// the range `-720..720`.
    pub fn offset_from(self, other: ClockTime) -> i32 {
        let day = MINUTES_PER_DAY as i32;
        let raw = (self.minutes as i32 - other.minutes as i32).rem_euclid(day);
        if raw >= day / 2 {
            raw - day
        } else {
            raw
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidClockTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        ClockTime::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A daily quiet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl QuietHours {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// Whether the window crosses midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, time: ClockTime) -> bool {
        is_in_quiet_hours(time, self.start, self.end)
    }
}

/// Check if `current` falls inside the quiet window `[start, end)`.
///
/// An empty window (`start == end`) never suppresses anything.
pub fn is_in_quiet_hours(current: ClockTime, start: ClockTime, end: ClockTime) -> bool {
    // Overnight window (e.g., 22:00 - 07:00)
    if start > end {
        return current >= start || current < end;
    }

    // Daytime window (e.g., 12:00 - 17:00)
    current >= start && current < end
}

/// String form of [`is_in_quiet_hours`]; all three arguments are `HH:MM`.
pub fn is_in_quiet_hours_str(current: &str, start: &str, end: &str) -> Result<bool, ValidationError> {
    Ok(is_in_quiet_hours(
        current.parse()?,
        start.parse()?,
        end.parse()?,
    ))
}
