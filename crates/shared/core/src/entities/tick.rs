use serde::{Deserialize, Serialize};

use super::AggressorSide;
use crate::values::{Price, Quantity, Timestamp};

/// A single executed trade as reported by the feed.
///
/// Only needed when precise price-level volume is required; everything
/// else works from bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTick {
    pub time: Timestamp,
    pub price: Price,
    pub quantity: Quantity,
    pub side: AggressorSide,
}

impl TradeTick {
    pub fn new(time: Timestamp, price: Price, quantity: Quantity, side: AggressorSide) -> Self {
        Self {
            time,
            price,
            quantity,
            side,
        }
    }
}
