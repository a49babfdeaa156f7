//! Calendar frequency units.
//!
//! A [`Frequency`] names both the cadence of a repeating timer and the
//! calendar boundary its first tick can be aligned to.

use crate::error::TickError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The calendar units a timer can tick at or align to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One tick per second, aligned to whole seconds.
    Second,
    /// One tick per minute, aligned to whole minutes.
    Minute,
    /// One tick per hour, aligned to whole hours.
    Hour,
    /// One tick per day, aligned to midnight.
    Day,
    /// One tick per week, aligned to the start of Monday.
    Week,
}

impl Frequency {
    /// The canonical interval of one unit at this frequency.
    #[must_use]
    pub fn interval(self) -> Duration {
        match self {
            Self::Second => Duration::from_secs(1),
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3_600),
            Self::Day => Duration::from_secs(86_400),
            Self::Week => Duration::from_secs(604_800),
        }
    }

    /// Lowercase unit name, as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = TickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "second" => Ok(Self::Second),
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            other => Err(TickError::UnsupportedFrequency(other.to_string())),
        }
    }
}
