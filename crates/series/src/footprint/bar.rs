use std::cell::Cell;
use std::collections::BTreeMap;

use meridian_core::{AggressorSide, Bar, Price, Quantity, Timestamp, TradeTick};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::quantize::floor_to_step;

/// Upper bound on the buckets an estimated footprint spreads one bar over
pub const MAX_BUCKETS_PER_BAR: usize = 1_000;

/// Smallest multiple of `step` that covers `range` in at most
/// [`MAX_BUCKETS_PER_BAR`] buckets
fn bounded_step(range: Price, step: Price) -> Price {
    let buckets = (range / step).ceil();
    let limit = Decimal::from(MAX_BUCKETS_PER_BAR);
    if buckets <= limit {
        return step;
    }
    // One spare bucket absorbs a low that is not on the grid
    let factor = (buckets / (limit - Decimal::ONE)).ceil();
    tracing::trace!(step = %step, factor = %factor, "Widening footprint step");
    step * factor
}

/// Aggressor-split volume at one price bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceLevel {
    /// Volume sold into the bid (sell aggressor)
    pub bid: Quantity,
    /// Volume bought from the ask (buy aggressor)
    pub ask: Quantity,
}

impl PriceLevel {
    pub fn total(&self) -> Quantity {
        self.bid + self.ask
    }

    pub fn delta(&self) -> Quantity {
        self.ask - self.bid
    }

    /// `(ask - bid) / (ask + bid)` in `[-1, 1]`; `None` for an empty level
    pub fn imbalance(&self) -> Option<Decimal> {
        let total = self.total();
        (!total.is_zero()).then(|| self.delta() / total)
    }

    fn add(&mut self, side: AggressorSide, quantity: Quantity) {
        match side {
            AggressorSide::Buy => self.ask += quantity,
            AggressorSide::Sell => self.bid += quantity,
        }
    }
}

/// Derived per-bar numbers, recomputed only after a mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FootprintMetrics {
    /// Price of the bucket with the largest total volume
    pub poc: Option<Price>,
    pub delta: Quantity,
    pub total_bid: Quantity,
    pub total_ask: Quantity,
}

/// Price-bucketed bid/ask volume for one bar
#[derive(Debug, Clone)]
pub struct FootprintBar {
    time: Timestamp,
    step: Price,
    levels: BTreeMap<Price, PriceLevel>,
    dirty: Cell<bool>,
    cached: Cell<FootprintMetrics>,
}

impl PartialEq for FootprintBar {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.step == other.step && self.levels == other.levels
    }
}

impl FootprintBar {
    /// Empty footprint for the bar starting at `time`
    pub fn new(time: Timestamp, step: Price) -> Self {
        Self {
            time,
            step,
            levels: BTreeMap::new(),
            dirty: Cell::new(false),
            cached: Cell::new(FootprintMetrics::default()),
        }
    }

    /// Estimate a footprint from OHLCV alone.
    ///
    /// Volume is spread evenly over the buckets covering `[low, high)`, one
    /// bucket when the bar has no range. Up bars split 60/40 ask/bid, down
    /// bars 40/60 and unchanged bars 50/50.
    ///
    /// A step too small for the bar's range is widened to a multiple of
    /// itself so the bar gets at most [`MAX_BUCKETS_PER_BAR`] buckets.
    pub fn approximate_from_bar(bar: &Bar, step: Price) -> Self {
        let step = bounded_step(bar.high() - bar.low(), step);
        let mut footprint = Self::new(bar.time(), step);

        let first = floor_to_step(bar.low(), step);
        let mut buckets = Vec::new();
        let mut price = first;
        while price < bar.high() {
            buckets.push(price);
            price += step;
        }
        if buckets.is_empty() {
            buckets.push(first);
        }

        let ask_share = if bar.close() > bar.open() {
            dec!(0.6)
        } else if bar.close() < bar.open() {
            dec!(0.4)
        } else {
            dec!(0.5)
        };

        let per_bucket = bar.volume() / Decimal::from(buckets.len());
        let ask = per_bucket * ask_share;
        let bid = per_bucket - ask;

        for price in buckets {
            footprint.levels.insert(price, PriceLevel { bid, ask });
        }
        footprint.dirty.set(true);
        footprint
    }

    /// Start time of the owning bar
    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn step(&self) -> Price {
        self.step
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Add one trade to the bucket its price floors into
    pub fn add_trade(&mut self, tick: &TradeTick) {
        let bucket = floor_to_step(tick.price, self.step);
        self.levels
            .entry(bucket)
            .or_default()
            .add(tick.side, tick.quantity);
        self.dirty.set(true);
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.dirty.set(true);
    }

    /// Levels in ascending price order
    pub fn levels(&self) -> impl DoubleEndedIterator<Item = (Price, PriceLevel)> + '_ {
        self.levels.iter().map(|(price, level)| (*price, *level))
    }

    pub fn level(&self, price: Price) -> Option<PriceLevel> {
        self.levels.get(&floor_to_step(price, self.step)).copied()
    }

    pub fn imbalance(&self, price: Price) -> Option<Decimal> {
        self.level(price).and_then(|level| level.imbalance())
    }

    /// True when cached metrics are stale
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Metrics for the current levels, recomputed on first access after a
    /// mutation.
    pub fn metrics(&self) -> FootprintMetrics {
        if self.dirty.get() {
            self.cached.set(self.compute_metrics());
            self.dirty.set(false);
        }
        self.cached.get()
    }

    pub fn poc(&self) -> Option<Price> {
        self.metrics().poc
    }

    pub fn delta(&self) -> Quantity {
        self.metrics().delta
    }

    fn compute_metrics(&self) -> FootprintMetrics {
        let mut metrics = FootprintMetrics::default();
        let mut max_total = Quantity::ZERO;

        // Ascending walk with `>=` so ties resolve to the higher price
        for (price, level) in &self.levels {
            metrics.total_bid += level.bid;
            metrics.total_ask += level.ask;
            if metrics.poc.is_none() || level.total() >= max_total {
                max_total = level.total();
                metrics.poc = Some(*price);
            }
        }
        metrics.delta = metrics.total_ask - metrics.total_bid;
        metrics
    }
}
