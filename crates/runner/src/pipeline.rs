//! Chart pipeline for one instrument and base interval.
//!
//! Owns every derived series of the instrument. History loads go through
//! the bulk `generate` path; closed live bars go through `update`, so both
//! produce the same series.

use std::fmt;
use std::sync::Arc;

use meridian_core::{Bar, Interval, Price, ReplayCursor, Symbol, Timestamp, TradeTick};
use meridian_indicators::{CalcOutput, IndicatorRuntime};
use meridian_ports::SeriesGenerator;
use meridian_series::{
    Brick, BrickGenerator, DEFAULT_TARGET_BUCKETS, FootprintAggregator, FootprintBar,
    FootprintMode, KagiGenerator, KagiLine, PnfColumn, PointFigureGenerator, RangeBar,
    RangeBarGenerator, Resampler, dynamic_price_step,
};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::{GeneratorConfig, InstrumentConfig};
use crate::error::RunnerResult;

pub struct Pipeline {
    symbol: Symbol,
    base: Interval,
    visible_bars: usize,
    history: Vec<Bar>,
    resamplers: Vec<Resampler>,
    bricks: BrickGenerator,
    kagi: KagiGenerator,
    point_figure: PointFigureGenerator,
    range_bars: RangeBarGenerator,
    footprint_mode: FootprintMode,
    /// Configured bucket size; `None` derives one from history
    fixed_step: Option<Price>,
    footprint: Option<FootprintAggregator>,
    indicators: Arc<IndicatorRuntime>,
}

impl Pipeline {
    pub fn new(
        symbol: impl Into<Symbol>,
        base: Interval,
        targets: Vec<Interval>,
        generators: &GeneratorConfig,
        indicators: Arc<IndicatorRuntime>,
    ) -> RunnerResult<Self> {
        let footprint = generators
            .footprint_step
            .map(|step| FootprintAggregator::new(step, generators.footprint_mode))
            .transpose()?;

        Ok(Self {
            symbol: symbol.into(),
            base,
            visible_bars: usize::MAX,
            history: Vec::new(),
            resamplers: targets.into_iter().map(Resampler::new).collect(),
            bricks: BrickGenerator::new(generators.brick_size)?,
            kagi: KagiGenerator::new(generators.kagi)?,
            point_figure: PointFigureGenerator::new(
                generators.pnf_box_size,
                generators.pnf_reversal,
            )?,
            range_bars: RangeBarGenerator::new(generators.range_size)?,
            footprint_mode: generators.footprint_mode,
            fixed_step: generators.footprint_step,
            footprint,
            indicators,
        })
    }

    pub fn from_config(
        config: &InstrumentConfig,
        visible_bars: usize,
        indicators: Arc<IndicatorRuntime>,
    ) -> RunnerResult<Self> {
        Ok(Self::new(
            config.symbol.to_uppercase(),
            config.base()?,
            config.target_intervals()?,
            &config.generators,
            indicators,
        )?
        .with_visible_bars(visible_bars))
    }

    /// Limit indicator passes to the trailing `bars` of history
    pub fn with_visible_bars(mut self, bars: usize) -> Self {
        self.visible_bars = bars.max(1);
        self
    }

    /// Replace the history and rebuild every series from scratch
    pub fn load_history(&mut self, bars: Vec<Bar>) -> Vec<CalcOutput> {
        self.rebuild(&bars, ReplayCursor::Index(0));
        info!(symbol = %self.symbol, bars = self.history.len(), "History loaded");
        self.recalculate()
    }

    /// Rebuild from the bars at or after `cursor`, as when a saved session
    /// is reopened
    pub fn resume(&mut self, bars: &[Bar], cursor: ReplayCursor) -> Vec<CalcOutput> {
        self.rebuild(bars, cursor);
        info!(
            symbol = %self.symbol,
            cursor = ?cursor,
            bars = self.history.len(),
            "Session resumed"
        );
        self.recalculate()
    }

    /// Extend every series with a closed base bar.
    ///
    /// A bar with the same open time as the last one replaces it: the bar
    /// series are rebuilt and only the last footprint entry is refreshed,
    /// so trade-built levels survive. Older bars are ignored.
    pub fn on_closed_bar(&mut self, bar: Bar) -> Vec<CalcOutput> {
        let last_time = self.history.last().map(Bar::time);

        match last_time {
            Some(last) if bar.time() < last => {
                warn!(
                    symbol = %self.symbol,
                    time = %bar.time(),
                    last = %last,
                    "Ignoring out-of-order bar"
                );
                return Vec::new();
            }
            Some(last) if bar.time() == last => {
                debug!(symbol = %self.symbol, time = %bar.time(), "Replacing re-sent bar");
                let mut bars = std::mem::take(&mut self.history);
                if let Some(previous) = bars.last_mut() {
                    *previous = bar;
                }
                self.rebuild_bar_series(&bars, ReplayCursor::Index(0));
                match self.footprint.as_mut() {
                    Some(footprint) => {
                        footprint.update(&bar);
                    }
                    None => self.derive_footprint(),
                }
            }
            _ => {
                self.history.push(bar);
                for resampler in &mut self.resamplers {
                    resampler.update(&bar);
                }
                self.bricks.update(&bar);
                self.kagi.update(&bar);
                self.point_figure.update(&bar);
                self.range_bars.update(&bar);
                match self.footprint.as_mut() {
                    Some(footprint) => {
                        footprint.update(&bar);
                    }
                    None => self.derive_footprint(),
                }
            }
        }

        self.recalculate()
    }

    /// Feed a trade into the footprint of the bar starting at `bar_start`.
    /// Returns false when the footprint is not trade-driven.
    pub fn on_trade(&mut self, tick: &TradeTick, bar_start: Timestamp) -> bool {
        if self.footprint_mode != FootprintMode::Precise {
            trace!(symbol = %self.symbol, "Footprint is approximated, trade ignored");
            return false;
        }
        match self.footprint.as_mut() {
            Some(footprint) => {
                footprint.add_trade(tick, bar_start);
                true
            }
            None => {
                debug!(symbol = %self.symbol, "No footprint step yet, trade ignored");
                false
            }
        }
    }

    /// Run every indicator instance over the visible tail of the history
    pub fn recalculate(&self) -> Vec<CalcOutput> {
        let end = self.history.len();
        let start = end.saturating_sub(self.visible_bars);
        let outputs = self.indicators.recalculate(&self.history, start..end);
        for output in outputs.iter().filter(|o| o.error.is_some()) {
            warn!(
                symbol = %self.symbol,
                indicator = %output.name,
                error = output.error.as_deref().unwrap_or_default(),
                "Indicator failed"
            );
        }
        outputs
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn base(&self) -> &Interval {
        &self.base
    }

    pub fn history(&self) -> &[Bar] {
        &self.history
    }

    pub fn indicators(&self) -> &Arc<IndicatorRuntime> {
        &self.indicators
    }

    pub fn resampled(&self, target: &Interval) -> Option<&[Bar]> {
        self.resamplers
            .iter()
            .find(|r| r.target() == target)
            .map(|r| r.series())
    }

    pub fn bricks(&self) -> &[Brick] {
        self.bricks.series()
    }

    pub fn kagi_lines(&self) -> &[KagiLine] {
        self.kagi.series()
    }

    pub fn pnf_columns(&self) -> &[PnfColumn] {
        self.point_figure.series()
    }

    pub fn range_bars(&self) -> &[RangeBar] {
        self.range_bars.series()
    }

    pub fn footprints(&self) -> &[FootprintBar] {
        match &self.footprint {
            Some(footprint) => footprint.series(),
            None => &[],
        }
    }

    pub fn footprint_step(&self) -> Option<Price> {
        self.footprint.as_ref().map(FootprintAggregator::step)
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            symbol: self.symbol.clone(),
            base: self.base.label().to_string(),
            bars: self.history.len(),
            resampled: self
                .resamplers
                .iter()
                .map(|r| (r.target().label().to_string(), r.series().len()))
                .collect(),
            bricks: self.bricks().len(),
            kagi_lines: self.kagi_lines().len(),
            pnf_columns: self.pnf_columns().len(),
            range_bars: self.range_bars().len(),
            footprints: self.footprints().len(),
            footprint_step: self.footprint_step(),
            last_close: self.history.last().map(Bar::close),
        }
    }

    /// Recompute everything from scratch, footprint and indicator state
    /// included
    fn rebuild(&mut self, bars: &[Bar], cursor: ReplayCursor) {
        self.rebuild_bar_series(bars, cursor);
        self.indicators.reset_state();

        if self.fixed_step.is_none() {
            self.footprint = None;
        }
        match self.footprint.as_mut() {
            Some(footprint) => {
                footprint.generate_from(bars, cursor);
            }
            None => self.derive_footprint(),
        }
    }

    /// History plus every series derived from bars alone
    fn rebuild_bar_series(&mut self, bars: &[Bar], cursor: ReplayCursor) {
        self.history = cursor.slice(bars).to_vec();
        for resampler in &mut self.resamplers {
            resampler.generate_from(bars, cursor);
        }
        self.bricks.generate_from(bars, cursor);
        self.kagi.generate_from(bars, cursor);
        self.point_figure.generate_from(bars, cursor);
        self.range_bars.generate_from(bars, cursor);
    }

    /// Build the footprint with a step sized to the current history
    fn derive_footprint(&mut self) {
        let Some(step) = dynamic_price_step(&self.history, DEFAULT_TARGET_BUCKETS) else {
            return;
        };
        match FootprintAggregator::new(step, self.footprint_mode) {
            Ok(mut footprint) => {
                footprint.generate(&self.history);
                debug!(symbol = %self.symbol, step = %step, "Derived footprint step");
                self.footprint = Some(footprint);
            }
            Err(e) => warn!(symbol = %self.symbol, error = %e, "Cannot build footprint"),
        }
    }
}

/// Series sizes of one pipeline, for logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub symbol: Symbol,
    pub base: String,
    pub bars: usize,
    pub resampled: Vec<(String, usize)>,
    pub bricks: usize,
    pub kagi_lines: usize,
    pub pnf_columns: usize,
    pub range_bars: usize,
    pub footprints: usize,
    pub footprint_step: Option<Price>,
    pub last_close: Option<Price>,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {} bars", self.symbol, self.base, self.bars)?;
        for (label, count) in &self.resampled {
            write!(f, ", {label}={count}")?;
        }
        write!(
            f,
            ", bricks={}, kagi={}, pnf={}, range={}, footprint={}",
            self.bricks, self.kagi_lines, self.pnf_columns, self.range_bars, self.footprints
        )?;
        if let Some(close) = self.last_close {
            write!(f, ", last close {close}")?;
        }
        Ok(())
    }
}
