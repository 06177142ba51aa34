//! Compiler configuration.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// ISO-8601 calendar date.
pub const ISO_LOCAL_DATE: &str = "%Y-%m-%d";
/// ISO-8601 local date-time, optional fractional seconds.
pub const ISO_LOCAL_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";
/// Last-resort pattern for legacy timestamps.
pub const LEGACY_DATE_TIME: &str = "%Y-%m-%d %H:%M:%S";

/// Default escape character for `LIKE` patterns.
pub const DEFAULT_LIKE_ESCAPE: char = '\\';

/// Date and time parsing policy used by the value coercer.
///
/// Pattern lists use `chrono` format syntax and are tried in order; the ISO
/// pattern is always first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateTimeSettings {
    /// Offset from UTC used to interpret zone-less values.
    pub utc_offset_seconds: i32,
    /// Patterns for calendar dates.
    pub local_date_patterns: Vec<String>,
    /// Patterns for local date-times.
    pub local_date_time_patterns: Vec<String>,
    /// When a date-only value is the upper bound of a `BETWEEN` on a
    /// timestamp, move it to the last instant of that day.
    pub end_of_day_on_between_upper_bound: bool,
}

impl Default for DateTimeSettings {
    fn default() -> Self {
        Self {
            utc_offset_seconds: 0,
            local_date_patterns: vec![ISO_LOCAL_DATE.to_string(), "%d/%m/%Y".to_string()],
            local_date_time_patterns: vec![
                ISO_LOCAL_DATE_TIME.to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%d/%m/%Y %H:%M:%S".to_string(),
            ],
            end_of_day_on_between_upper_bound: true,
        }
    }
}

impl DateTimeSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the offset used for zone-less values.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset_seconds = offset.local_minus_utc();
        self
    }

    /// Replace the calendar date patterns (ISO stays first).
    pub fn with_local_date_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_date_patterns = iso_first(ISO_LOCAL_DATE, patterns);
        self
    }

    /// Replace the local date-time patterns (ISO stays first).
    pub fn with_local_date_time_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_date_time_patterns = iso_first(ISO_LOCAL_DATE_TIME, patterns);
        self
    }

    /// Enable or disable the end-of-day `BETWEEN` upper bound.
    pub fn with_end_of_day_on_between_upper_bound(mut self, enabled: bool) -> Self {
        self.end_of_day_on_between_upper_bound = enabled;
        self
    }

    /// The configured offset. Out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or_else(|| Utc.fix())
    }
}

fn iso_first<I, S>(iso: &str, patterns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut all = vec![iso.to_string()];
    for pattern in patterns {
        let pattern = pattern.into();
        if !all.contains(&pattern) {
            all.push(pattern);
        }
    }
    all
}

/// Settings shared by every compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Date and time parsing policy.
    pub date_time: DateTimeSettings,
    /// Escape character written into `LIKE` patterns.
    pub like_escape: char,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            date_time: DateTimeSettings::default(),
            like_escape: DEFAULT_LIKE_ESCAPE,
        }
    }
}

impl CompilerConfig {
    /// Create configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from JSON; absent keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Set the date and time parsing policy.
    pub fn with_date_time(mut self, date_time: DateTimeSettings) -> Self {
        self.date_time = date_time;
        self
    }

    /// Set the `LIKE` escape character.
    pub fn with_like_escape(mut self, escape: char) -> Self {
        self.like_escape = escape;
        self
    }
}
