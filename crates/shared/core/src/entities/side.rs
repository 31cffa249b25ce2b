use serde::{Deserialize, Serialize};

/// Aggressor side of a trade (the side that crossed the spread)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggressorSide {
    Buy,
    Sell,
}
