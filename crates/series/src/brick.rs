//! Brick (Renko) series: fixed-size bricks driven by closing prices.

use meridian_core::{Bar, Price, Timestamp};
use meridian_ports::{ConfigError, ConfigResult, SeriesGenerator};
use serde::{Deserialize, Serialize};

use crate::direction::Direction;
use crate::quantize::floor_to_step;

/// One brick of the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brick {
    /// Time the previous brick completed (or the first bar seen)
    pub start: Timestamp,
    /// Time of the bar whose close completed this brick
    pub end: Timestamp,
    pub open: Price,
    pub close: Price,
    pub high: Price,
    pub low: Price,
    pub direction: Direction,
}

/// Emits one brick for every whole brick size the close moves away from
/// the current base, then advances the base by what was emitted.
///
/// The base starts at the first close floored to a brick multiple.
#[derive(Debug, Clone)]
pub struct BrickGenerator {
    brick_size: Price,
    base: Option<Price>,
    last_time: Option<Timestamp>,
    bricks: Vec<Brick>,
}

impl BrickGenerator {
    pub fn new(brick_size: Price) -> ConfigResult<Self> {
        let brick_size = ConfigError::require_positive("brick size", brick_size)?;
        Ok(Self {
            brick_size,
            base: None,
            last_time: None,
            bricks: Vec::new(),
        })
    }

    pub fn brick_size(&self) -> Price {
        self.brick_size
    }

    /// Price the next brick will be measured from
    pub fn base(&self) -> Option<Price> {
        self.base
    }

    fn push_brick(&mut self, open: Price, close: Price, end: Timestamp, direction: Direction) {
        let start = self.last_time.unwrap_or(end);
        self.bricks.push(Brick {
            start,
            end,
            open,
            close,
            high: open.max(close),
            low: open.min(close),
            direction,
        });
    }
}

impl SeriesGenerator for BrickGenerator {
    type Output = Brick;

    fn reset(&mut self) {
        self.base = None;
        self.last_time = None;
        self.bricks.clear();
    }

    fn update(&mut self, bar: &Bar) -> &[Brick] {
        let close = bar.close();
        let size = self.brick_size;

        let Some(mut base) = self.base else {
            self.base = Some(floor_to_step(close, size));
            self.last_time = Some(bar.time());
            return &self.bricks;
        };

        let before = self.bricks.len();
        while close >= base + size {
            self.push_brick(base, base + size, bar.time(), Direction::Up);
            base += size;
        }
        while close <= base - size {
            self.push_brick(base, base - size, bar.time(), Direction::Down);
            base -= size;
        }

        if self.bricks.len() > before {
            tracing::trace!(
                "{} brick(s) at {}, base now {}",
                self.bricks.len() - before,
                bar.time(),
                base
            );
            self.last_time = Some(bar.time());
        }
        self.base = Some(base);

        &self.bricks
    }

    fn series(&self) -> &[Brick] {
        &self.bricks
    }
}
