use crate::context::CalcContext;
use crate::drawable::{Drawable, MarkerShape, Point};
use crate::error::IndicatorResult;
use crate::indicator::Indicator;
use crate::meta::{IndicatorMeta, ParamSpec, Placement, Settings};

/// Marks bars whose high (low) is strictly above (below) the `strength`
/// bars on either side.
pub struct SwingMarkers;

impl SwingMarkers {
    pub const NAME: &'static str = "swing_markers";
}

impl Indicator for SwingMarkers {
    fn meta(&self) -> IndicatorMeta {
        IndicatorMeta::new(Self::NAME, Placement::Overlay)
            .param(ParamSpec::integer("strength", 2))
            .param(ParamSpec::boolean("show_lows", true))
            .lookback(2)
    }

    fn lookback(&self, settings: &Settings) -> usize {
        settings.period("strength").unwrap_or(2)
    }

    fn calculate(&self, ctx: &mut CalcContext<'_>) -> IndicatorResult<Vec<Drawable>> {
        let strength = ctx.settings().period("strength")?;
        let show_lows = ctx.settings().boolean("show_lows")?;
        let bars = ctx.bars();

        let mut markers = Vec::new();
        let start = ctx.visible_offset().max(strength);
        for i in start..bars.len().saturating_sub(strength) {
            let neighbours = bars[i - strength..i]
                .iter()
                .chain(&bars[i + 1..=i + strength]);
            let bar = &bars[i];

            if neighbours.clone().all(|n| n.high() < bar.high()) {
                ctx.annotate(i, "swing_high", bar.high());
                markers.push(Drawable::Marker {
                    at: Point::new(bar.time(), bar.high()),
                    shape: MarkerShape::ArrowDown,
                    text: Some("H".to_string()),
                });
            }
            if show_lows && neighbours.clone().all(|n| n.low() > bar.low()) {
                ctx.annotate(i, "swing_low", bar.low());
                markers.push(Drawable::Marker {
                    at: Point::new(bar.time(), bar.low()),
                    shape: MarkerShape::ArrowUp,
                    text: Some("L".to_string()),
                });
            }
        }

        Ok(markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DebugAnnotations, InstanceState, TimeframeCache};
    use crate::meta::ParamValue;
    use chrono::{DateTime, TimeDelta};
    use meridian_core::{Bar, Price};
    use rust_decimal_macros::dec;

    fn closes(prices: &[Price]) -> Vec<Bar> {
        let start = DateTime::from_timestamp_millis(0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::new(start + TimeDelta::minutes(i as i64), p, p, p, p, dec!(1)).unwrap())
            .collect()
    }

    #[test]
    fn test_pivots_are_marked_and_annotated() {
        let settings = SwingMarkers
            .meta()
            .default_settings()
            .with("strength", ParamValue::Integer(1));
        let bars = closes(&[dec!(1), dec!(3), dec!(2), dec!(0), dec!(1)]);
        let mut state = InstanceState::new();
        let mut cache = TimeframeCache::default();
        let mut debug = DebugAnnotations::new();
        let mut ctx = CalcContext::new(&bars, 0..5, 1, &settings, &mut state, &mut cache, &mut debug);

        let out = SwingMarkers.calculate(&mut ctx).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(debug.get(&1).unwrap()[0].0, "swing_high");
        assert_eq!(debug.get(&3).unwrap()[0], ("swing_low".to_string(), "0".to_string()));
    }
}
