use serde::{Deserialize, Serialize};

use crate::error::{BarError, BarResult};
use crate::values::{Price, Quantity, Timestamp};

/// OHLCV summary over one interval.
///
/// Fields are private: a bar that exists always satisfies
/// `high >= max(open, close)`, `low <= min(open, close)` and `volume >= 0`.
/// A forming bar is represented by producing new values ([`Bar::merge`]),
/// never by mutating one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBar")]
pub struct Bar {
    time: Timestamp,
    open: Price,
    high: Price,
    low: Price,
    close: Price,
    volume: Quantity,
}

impl Bar {
    /// Create a bar, validating the OHLCV invariant
    pub fn new(
        time: Timestamp,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Quantity,
    ) -> BarResult<Self> {
        if high < open.max(close) {
            return Err(BarError::HighBelowBody { high, open, close });
        }
        if low > open.min(close) {
            return Err(BarError::LowAboveBody { low, open, close });
        }
        if volume < Quantity::ZERO {
            return Err(BarError::NegativeVolume(volume));
        }
        Ok(Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Start time of the interval this bar summarises
    #[inline]
    pub fn time(&self) -> Timestamp {
        self.time
    }

    #[inline]
    pub fn open(&self) -> Price {
        self.open
    }

    #[inline]
    pub fn high(&self) -> Price {
        self.high
    }

    #[inline]
    pub fn low(&self) -> Price {
        self.low
    }

    #[inline]
    pub fn close(&self) -> Price {
        self.close
    }

    #[inline]
    pub fn volume(&self) -> Quantity {
        self.volume
    }

    /// Closed at or above its open
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    /// High minus low
    pub fn range(&self) -> Price {
        self.high - self.low
    }

    /// Same values, different start time
    pub fn with_time(self, time: Timestamp) -> Self {
        Self { time, ..self }
    }

    /// Fold a later bar into this one.
    ///
    /// Open and time are kept, high/low widen, close is taken from
    /// `incoming` and volumes add up. Both inputs satisfy the invariant, so
    /// the result does as well.
    pub fn merge(&self, incoming: &Bar) -> Bar {
        Bar {
            time: self.time,
            open: self.open,
            high: self.high.max(incoming.high),
            low: self.low.min(incoming.low),
            close: incoming.close,
            volume: self.volume + incoming.volume,
        }
    }
}

/// Unvalidated wire shape, used so deserialization goes through [`Bar::new`]
#[derive(Deserialize)]
struct RawBar {
    time: Timestamp,
    open: Price,
    high: Price,
    low: Price,
    close: Price,
    volume: Quantity,
}

impl TryFrom<RawBar> for Bar {
    type Error = BarError;

    fn try_from(raw: RawBar) -> Result<Self, Self::Error> {
        Bar::new(raw.time, raw.open, raw.high, raw.low, raw.close, raw.volume)
    }
}
