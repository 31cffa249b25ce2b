use meridian_core::Interval;

use crate::context::CalcContext;
use crate::drawable::{Drawable, Point};
use crate::error::{IndicatorError, IndicatorResult};
use crate::indicator::Indicator;
use crate::meta::{IndicatorMeta, ParamSpec, Placement};

/// One box per higher-timeframe bar overlapping the visible window,
/// spanning that bar's time and high/low.
pub struct HigherTimeframeRange;

impl HigherTimeframeRange {
    pub const NAME: &'static str = "htf_range";
}

impl Indicator for HigherTimeframeRange {
    fn meta(&self) -> IndicatorMeta {
        IndicatorMeta::new(Self::NAME, Placement::Overlay)
            .param(ParamSpec::choice("timeframe", "1h", &["15m", "1h", "4h", "1d"]))
            .param(ParamSpec::color("color", "#9E9E9E40"))
    }

    fn calculate(&self, ctx: &mut CalcContext<'_>) -> IndicatorResult<Vec<Drawable>> {
        let label = ctx.settings().choice("timeframe")?.to_string();
        let color = ctx.settings().color("color")?.to_string();
        let interval = Interval::parse(&label).map_err(|e| IndicatorError::InvalidParameter {
            key: "timeframe".to_string(),
            reason: e.to_string(),
        })?;

        let visible = ctx.visible_bars();
        let (Some(first), Some(last)) = (visible.first(), visible.last()) else {
            return Ok(Vec::new());
        };
        let from = interval.bucket_start(first.time());
        let until = last.time();

        let series = ctx.timeframe(&interval);
        Ok(series
            .iter()
            .filter(|bar| bar.time() >= from && bar.time() <= until)
            .map(|bar| Drawable::Box {
                from: Point::new(bar.time(), bar.high()),
                to: Point::new(bar.time() + interval.duration(), bar.low()),
                color: Some(color.clone()),
            })
            .collect())
    }
}
