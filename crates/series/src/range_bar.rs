//! Range bars: a new bar every time the traded range reaches a fixed size.

use meridian_core::{Bar, Price, Quantity, Timestamp};
use meridian_ports::{ConfigError, ConfigResult, SeriesGenerator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBar {
    pub start: Timestamp,
    pub end: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
    /// False only for the last, still forming bar
    pub closed: bool,
}

impl RangeBar {
    pub fn range(&self) -> Price {
        self.high - self.low
    }

    fn absorb(&mut self, bar: &Bar) {
        self.high = self.high.max(bar.high());
        self.low = self.low.min(bar.low());
        self.close = bar.close();
        self.volume += bar.volume();
        self.end = bar.time();
    }
}

#[derive(Debug, Clone)]
pub struct RangeBarGenerator {
    range_size: Price,
    /// Close of the last completed bar; the next bar opens here
    seed: Option<Price>,
    bars: Vec<RangeBar>,
}

impl RangeBarGenerator {
    pub fn new(range_size: Price) -> ConfigResult<Self> {
        let range_size = ConfigError::require_positive("range size", range_size)?;
        Ok(Self {
            range_size,
            seed: None,
            bars: Vec::new(),
        })
    }

    pub fn range_size(&self) -> Price {
        self.range_size
    }

    /// The bar still accumulating, if any
    pub fn forming(&self) -> Option<&RangeBar> {
        self.bars.last().filter(|bar| !bar.closed)
    }

    fn open_bar(&self, bar: &Bar) -> RangeBar {
        let open = self.seed.unwrap_or(bar.open());
        RangeBar {
            start: bar.time(),
            end: bar.time(),
            open,
            high: bar.high().max(open),
            low: bar.low().min(open),
            close: bar.close(),
            volume: bar.volume(),
            closed: false,
        }
    }
}

impl SeriesGenerator for RangeBarGenerator {
    type Output = RangeBar;

    fn reset(&mut self) {
        self.seed = None;
        self.bars.clear();
    }

    fn update(&mut self, bar: &Bar) -> &[RangeBar] {
        match self.bars.last_mut() {
            Some(forming) if !forming.closed => forming.absorb(bar),
            _ => {
                let opened = self.open_bar(bar);
                self.bars.push(opened);
            }
        }

        let range_size = self.range_size;
        let Some(forming) = self.bars.last_mut() else {
            return &self.bars;
        };
        if forming.range() >= range_size {
            forming.closed = true;
            self.seed = Some(forming.close);
            tracing::trace!(
                "Range bar closed {}..{} at {}",
                forming.low,
                forming.high,
                forming.end
            );
        }

        &self.bars
    }

    fn series(&self) -> &[RangeBar] {
        &self.bars
    }
}
