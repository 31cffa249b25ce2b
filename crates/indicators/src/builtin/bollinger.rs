use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use super::moving_average::sma;
use crate::context::CalcContext;
use crate::drawable::{Drawable, Point};
use crate::error::{IndicatorError, IndicatorResult};
use crate::indicator::Indicator;
use crate::meta::{IndicatorMeta, ParamSpec, Placement, Settings};

/// SMA with bands `width` standard deviations above and below
pub struct Bollinger;

impl Bollinger {
    pub const NAME: &'static str = "bollinger";
}

impl Indicator for Bollinger {
    fn meta(&self) -> IndicatorMeta {
        IndicatorMeta::new(Self::NAME, Placement::Overlay)
            .param(ParamSpec::integer("period", 20))
            .param(ParamSpec::decimal("width", dec!(2)))
            .param(ParamSpec::color("color", "#FF6D00"))
            .lookback(20)
    }

    fn lookback(&self, settings: &Settings) -> usize {
        settings.period("period").unwrap_or(20)
    }

    fn calculate(&self, ctx: &mut CalcContext<'_>) -> IndicatorResult<Vec<Drawable>> {
        let period = ctx.settings().period("period")?;
        let width = ctx.settings().decimal("width")?;
        let color = ctx.settings().color("color")?;

        let bars = ctx.bars();
        let mut middle = Vec::new();
        let mut upper = Vec::new();
        let mut lower = Vec::new();

        for i in ctx.visible_offset()..bars.len() {
            let window = &bars[..=i];
            let Some(mean) = sma(window, period) else {
                continue;
            };
            let variance = window[window.len() - period..]
                .iter()
                .map(|b| (b.close() - mean) * (b.close() - mean))
                .sum::<Decimal>()
                / Decimal::from(period);
            let deviation = variance.sqrt().ok_or_else(|| {
                IndicatorError::Calculation(format!("no square root of {variance}"))
            })?;

            let time = bars[i].time();
            middle.push(Point::new(time, mean));
            upper.push(Point::new(time, mean + width * deviation));
            lower.push(Point::new(time, mean - width * deviation));
        }

        if middle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![
            Drawable::line(upper, Some(color)).labelled("upper"),
            Drawable::line(middle, Some(color)).labelled("basis"),
            Drawable::line(lower, Some(color)).labelled("lower"),
        ])
    }
}
