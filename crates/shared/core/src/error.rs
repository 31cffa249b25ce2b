use thiserror::Error;

use crate::values::{Price, Quantity};

/// Errors raised while constructing core market data values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarError {
    #[error("High {high} is below the bar body (open {open}, close {close})")]
    HighBelowBody {
        high: Price,
        open: Price,
        close: Price,
    },

    #[error("Low {low} is above the bar body (open {open}, close {close})")]
    LowAboveBody {
        low: Price,
        open: Price,
        close: Price,
    },

    #[error("Negative volume: {0}")]
    NegativeVolume(Quantity),

    #[error("Interval duration must be positive, got {0} ms")]
    NonPositiveInterval(i64),

    #[error("Invalid interval label: {0}")]
    InvalidInterval(String),
}

pub type BarResult<T> = std::result::Result<T, BarError>;
