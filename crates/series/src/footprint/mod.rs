//! Footprint: per-bar volume split by price bucket and aggressor side.
//!
//! Two sources feed it. With trade ticks ([`FootprintMode::Precise`]) every
//! trade lands in its exact bucket. Without them
//! ([`FootprintMode::Approximate`]) each bar's volume is spread over its
//! range.

mod bar;
mod step;

pub use bar::{FootprintBar, FootprintMetrics, MAX_BUCKETS_PER_BAR, PriceLevel};
pub use step::{ATR_WINDOW, DEFAULT_TARGET_BUCKETS, dynamic_price_step};

use meridian_core::{Bar, Price, Timestamp, TradeTick};
use meridian_ports::{ConfigError, ConfigResult, SeriesGenerator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootprintMode {
    /// Built from trade ticks via [`FootprintAggregator::add_trade`]
    Precise,
    /// Estimated from each bar's OHLCV
    #[default]
    Approximate,
}

/// Owns the footprint of every bar seen, ordered by bar start
#[derive(Debug, Clone)]
pub struct FootprintAggregator {
    step: Price,
    mode: FootprintMode,
    bars: Vec<FootprintBar>,
}

impl FootprintAggregator {
    pub fn new(step: Price, mode: FootprintMode) -> ConfigResult<Self> {
        let step = ConfigError::require_positive("price step", step)?;
        Ok(Self {
            step,
            mode,
            bars: Vec::new(),
        })
    }

    pub fn step(&self) -> Price {
        self.step
    }

    pub fn mode(&self) -> FootprintMode {
        self.mode
    }

    /// Add a trade to the footprint of the bar starting at `bar_start`.
    ///
    /// The owning bar is chosen by the caller; the tick's own timestamp is
    /// not used for bucketing in time.
    pub fn add_trade(&mut self, tick: &TradeTick, bar_start: Timestamp) {
        let index = self.entry(bar_start);
        self.bars[index].add_trade(tick);
    }

    pub fn bar_at(&self, bar_start: Timestamp) -> Option<&FootprintBar> {
        self.bars
            .binary_search_by_key(&bar_start, FootprintBar::time)
            .ok()
            .map(|i| &self.bars[i])
    }

    /// Drop everything, e.g. when the instrument changes
    pub fn clear(&mut self) {
        tracing::debug!("Clearing {} footprint bar(s)", self.bars.len());
        self.bars.clear();
    }

    /// Index of the footprint for `bar_start`, inserting an empty one
    fn entry(&mut self, bar_start: Timestamp) -> usize {
        match self
            .bars
            .binary_search_by_key(&bar_start, FootprintBar::time)
        {
            Ok(i) => i,
            Err(i) => {
                self.bars.insert(i, FootprintBar::new(bar_start, self.step));
                i
            }
        }
    }
}

impl SeriesGenerator for FootprintAggregator {
    type Output = FootprintBar;

    fn reset(&mut self) {
        self.bars.clear();
    }

    /// Approximate mode rebuilds the bar's footprint from its OHLCV, so a
    /// re-sent forming bar replaces the earlier estimate. Precise mode only
    /// makes sure an entry exists; its volume comes from trades.
    fn update(&mut self, bar: &Bar) -> &[FootprintBar] {
        let index = self.entry(bar.time());
        if self.mode == FootprintMode::Approximate {
            self.bars[index] = FootprintBar::approximate_from_bar(bar, self.step);
        }
        &self.bars
    }

    fn series(&self) -> &[FootprintBar] {
        &self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};
    use meridian_core::AggressorSide;
    use rust_decimal_macros::dec;

    fn at(minute: i64) -> Timestamp {
        DateTime::from_timestamp_millis(0).unwrap() + TimeDelta::minutes(minute)
    }

    #[test]
    fn test_rejects_non_positive_step() {
        assert!(FootprintAggregator::new(dec!(0), FootprintMode::Precise).is_err());
    }

    #[test]
    fn test_trade_keyed_by_owning_bar() {
        let mut agg = FootprintAggregator::new(dec!(1), FootprintMode::Precise).unwrap();
        // Tick stamped inside minute 1 but attributed to the bar at minute 0
        let tick = TradeTick::new(at(1), dec!(100.4), dec!(2), AggressorSide::Buy);
        agg.add_trade(&tick, at(0));

        assert!(agg.bar_at(at(1)).is_none());
        let fp = agg.bar_at(at(0)).unwrap();
        assert_eq!(fp.level(dec!(100)).unwrap().ask, dec!(2));
    }

    #[test]
    fn test_out_of_order_bars_stay_sorted() {
        let mut agg = FootprintAggregator::new(dec!(1), FootprintMode::Precise).unwrap();
        let tick = TradeTick::new(at(0), dec!(100), dec!(1), AggressorSide::Sell);
        agg.add_trade(&tick, at(2));
        agg.add_trade(&tick, at(0));
        agg.add_trade(&tick, at(1));

        let times: Vec<_> = agg.series().iter().map(FootprintBar::time).collect();
        assert_eq!(times, vec![at(0), at(1), at(2)]);
    }

    #[test]
    fn test_precise_update_keeps_trades() {
        let mut agg = FootprintAggregator::new(dec!(1), FootprintMode::Precise).unwrap();
        let tick = TradeTick::new(at(0), dec!(100), dec!(3), AggressorSide::Buy);
        agg.add_trade(&tick, at(0));

        let bar = Bar::new(at(0), dec!(100), dec!(101), dec!(99), dec!(100), dec!(50)).unwrap();
        agg.update(&bar);
        assert_eq!(agg.bar_at(at(0)).unwrap().delta(), dec!(3));
    }

    #[test]
    fn test_approximate_update_replaces_estimate() {
        let mut agg = FootprintAggregator::new(dec!(1), FootprintMode::Approximate).unwrap();
        let first = Bar::new(at(0), dec!(100), dec!(101), dec!(100), dec!(101), dec!(10)).unwrap();
        let resent = Bar::new(at(0), dec!(100), dec!(101), dec!(100), dec!(101), dec!(20)).unwrap();
        agg.update(&first);
        agg.update(&resent);

        assert_eq!(agg.series().len(), 1);
        assert_eq!(agg.series()[0].metrics().total_ask, dec!(12));
    }

    #[test]
    fn test_clear() {
        let mut agg = FootprintAggregator::new(dec!(1), FootprintMode::Approximate).unwrap();
        let bar = Bar::new(at(0), dec!(100), dec!(101), dec!(100), dec!(101), dec!(10)).unwrap();
        agg.update(&bar);
        agg.clear();
        assert!(agg.series().is_empty());
    }
}
