use serde::{Deserialize, Serialize};

use super::Bar;
use crate::values::Timestamp;

/// Position a persisted session resumes from.
///
/// External session storage keeps its own snapshot format; the only thing
/// it hands back to the engine is where replay should continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayCursor {
    /// Resume at this index into the base bar history
    Index(usize),
    /// Resume at the first bar starting at or after this time
    Timestamp(Timestamp),
}

impl ReplayCursor {
    /// Index of the first bar at or after the cursor
    pub fn position(&self, bars: &[Bar]) -> usize {
        match *self {
            ReplayCursor::Index(index) => index.min(bars.len()),
            ReplayCursor::Timestamp(time) => bars.partition_point(|bar| bar.time() < time),
        }
    }

    /// The suffix of `bars` that replay should process
    pub fn slice<'a>(&self, bars: &'a [Bar]) -> &'a [Bar] {
        &bars[self.position(bars)..]
    }
}
