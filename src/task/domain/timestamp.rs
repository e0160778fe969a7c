//! Second-precision UTC timestamps used for watermarks and scheduling.
//!
//! Every timestamp that enters or leaves a persisted record passes through
//! [`Timestamp`]. Admission compares the client's precise instant from
//! [`Timestamp::parse_instant`] against the stored watermark; scheduling and
//! storage use the truncated value.

use super::TaskDomainError;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use mockable::Clock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const RFC3339_SECONDS: &str = "%Y-%m-%dT%H:%M:%SZ";

const OFFSET_FORMATS: [&str; 1] = ["%Y-%m-%d %H:%M:%S%.f%:z"];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// UTC instant truncated to whole seconds.
///
/// Rendered as RFC3339 with a literal `Z` suffix and no fractional part, for
/// example `2025-09-25T20:00:00Z`. Ordering and equality compare instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Normalises an instant by discarding its sub-second component.
    #[must_use]
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self(instant.trunc_subsecs(0))
    }

    /// Reads the current time from `clock`, truncated to whole seconds.
    #[must_use]
    pub fn now(clock: &impl Clock) -> Self {
        Self::from_instant(clock.utc())
    }

    /// Parses a client-supplied timestamp.
    ///
    /// Values carrying an offset are converted to UTC. Values without any
    /// timezone designator are interpreted as UTC.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTimestamp`] when the value matches
    /// none of the accepted layouts.
    pub fn parse(value: &str) -> Result<Self, TaskDomainError> {
        Self::parse_instant(value).map(Self::from_instant)
    }

    /// Parses a client-supplied timestamp into a UTC instant, keeping any
    /// sub-second component.
    ///
    /// # Errors
    ///
    /// Same as [`Timestamp::parse`].
    pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, TaskDomainError> {
        let trimmed = value.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(parsed.with_timezone(&Utc));
        }
        for format in OFFSET_FORMATS {
            if let Ok(parsed) = DateTime::parse_from_str(trimmed, format) {
                return Ok(parsed.with_timezone(&Utc));
            }
        }
        for format in NAIVE_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(parsed.and_utc());
            }
        }
        Err(TaskDomainError::InvalidTimestamp(value.to_owned()))
    }

    /// Returns the wrapped instant.
    #[must_use]
    pub const fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Formats the timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        self.0.format(RFC3339_SECONDS).to_string()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::from_instant(instant)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl FromStr for Timestamp {
    type Err = TaskDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(RFC3339_SECONDS))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
