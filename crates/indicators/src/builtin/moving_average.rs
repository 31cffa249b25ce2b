use std::collections::HashMap;

use meridian_core::{Price, Timestamp};
use rust_decimal::Decimal;

use crate::context::{CalcContext, InstanceState};
use crate::drawable::{Drawable, Point};
use crate::error::IndicatorResult;
use crate::indicator::Indicator;
use crate::meta::{IndicatorMeta, ParamSpec, Placement, Settings};

/// Simple or exponential moving average of closes
pub struct MovingAverage;

impl MovingAverage {
    pub const NAME: &'static str = "moving_average";
}

/// Values already computed for closed bars, keyed by bar start
#[derive(Debug, Default)]
pub(crate) struct AverageCache {
    values: HashMap<Timestamp, Price>,
}

impl AverageCache {
    /// Forget values for bars before `first`
    fn prune_before(&mut self, first: Timestamp) {
        self.values.retain(|time, _| *time >= first);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

impl Indicator for MovingAverage {
    fn meta(&self) -> IndicatorMeta {
        IndicatorMeta::new(Self::NAME, Placement::Overlay)
            .param(ParamSpec::integer("period", 20))
            .param(ParamSpec::choice("kind", "sma", &["sma", "ema"]))
            .param(ParamSpec::color("color", "#2962FF"))
            .lookback(20)
    }

    fn lookback(&self, settings: &Settings) -> usize {
        settings.period("period").unwrap_or(20)
    }

    fn calculate(&self, ctx: &mut CalcContext<'_>) -> IndicatorResult<Vec<Drawable>> {
        let period = ctx.settings().period("period")?;
        let exponential = ctx.settings().choice("kind")? == "ema";
        let color = ctx.settings().color("color")?.to_string();

        let bars = ctx.bars();
        let visible_offset = ctx.visible_offset();
        let last = bars.len().saturating_sub(1);
        let alpha = Decimal::TWO / Decimal::from(period + 1);
        let cache = ctx.state().get_or_default::<AverageCache>();

        let mut points = Vec::new();
        let mut previous: Option<Price> = None;
        for i in 0..bars.len() {
            let bar = &bars[i];
            // The last bar may still be forming, never trust a cached value for it
            let cached = (i < last)
                .then(|| cache.values.get(&bar.time()).copied())
                .flatten();

            let value = match cached {
                Some(value) => Some(value),
                None if exponential => match previous {
                    Some(prev) => Some(prev + alpha * (bar.close() - prev)),
                    None => sma(&bars[..=i], period),
                },
                None => sma(&bars[..=i], period),
            };

            if let Some(value) = value {
                if i < last {
                    cache.values.insert(bar.time(), value);
                }
                if i >= visible_offset {
                    points.push(Point::new(bar.time(), value));
                }
            }
            previous = value;
        }
        if let Some(first) = bars.first() {
            cache.prune_before(first.time());
        }

        if points.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Drawable::line(points, Some(&color)).labelled(if exponential {
            "EMA"
        } else {
            "SMA"
        })])
    }

    fn on_settings_changed(&self, _old: &Settings, _new: &Settings, state: &mut InstanceState) {
        state.remove::<AverageCache>();
    }
}

/// Mean close of the last `period` bars of `bars`
pub(crate) fn sma(bars: &[meridian_core::Bar], period: usize) -> Option<Price> {
    if bars.len() < period {
        return None;
    }
    let sum: Decimal = bars[bars.len() - period..].iter().map(|b| b.close()).sum();
    Some(sum / Decimal::from(period))
}
