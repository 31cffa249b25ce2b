use chrono::{DateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{BarError, BarResult};
use crate::values::Timestamp;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;
/// Calendar months are approximated by 30 days
const MS_PER_MONTH: i64 = 30 * MS_PER_DAY;

/// A bar timeframe: a display label plus a fixed positive duration.
///
/// Two intervals are equal when their durations are equal, so `"60m"` and
/// `"1h"` describe the same bucket grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    label: String,
    duration: TimeDelta,
}

impl Interval {
    /// Create an interval from a label and duration
    pub fn new(label: impl Into<String>, duration: TimeDelta) -> BarResult<Self> {
        let ms = duration.num_milliseconds();
        if ms <= 0 {
            return Err(BarError::NonPositiveInterval(ms));
        }
        Ok(Self {
            label: label.into(),
            duration,
        })
    }

    /// Parse labels such as `"30s"`, `"1m"`, `"4h"`, `"1d"`, `"1w"` and `"1M"`.
    ///
    /// Lowercase `m` is minutes, uppercase `M` is a 30-day month. Hour, day and
    /// week suffixes are case-insensitive.
    pub fn parse(label: &str) -> BarResult<Self> {
        let label = label.trim();
        let invalid = || BarError::InvalidInterval(label.to_string());

        let unit = label.chars().last().ok_or_else(invalid)?;
        let count: i64 = label[..label.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;

        let unit_ms = match unit {
            's' | 'S' => MS_PER_SECOND,
            'm' => MS_PER_MINUTE,
            'M' => MS_PER_MONTH,
            'h' | 'H' => MS_PER_HOUR,
            'd' | 'D' => MS_PER_DAY,
            'w' | 'W' => MS_PER_WEEK,
            _ => return Err(invalid()),
        };

        let ms = count.checked_mul(unit_ms).ok_or_else(invalid)?;
        let duration = TimeDelta::try_milliseconds(ms).ok_or_else(invalid)?;
        Self::new(label, duration)
    }

    /// Shorthand for the common minute-based timeframes
    pub fn minutes(count: i64) -> BarResult<Self> {
        Self::parse(&format!("{count}m"))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration.num_milliseconds()
    }

    /// Start of the bucket containing `time`: epoch time floored to the duration
    pub fn bucket_start(&self, time: Timestamp) -> Timestamp {
        let ms = time.timestamp_millis();
        let step = self.duration_ms();
        let floored = ms.div_euclid(step) * step;
        DateTime::from_timestamp_millis(floored).unwrap_or(time)
    }

    /// Whether `time` sits exactly on a bucket boundary
    pub fn is_aligned(&self, time: Timestamp) -> bool {
        self.bucket_start(time) == time
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.duration == other.duration
    }
}

impl Eq for Interval {}

impl Hash for Interval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.duration.hash(state);
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl TryFrom<String> for Interval {
    type Error = BarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Interval::parse(&value)
    }
}

impl From<Interval> for String {
    fn from(interval: Interval) -> Self {
        interval.label
    }
}
