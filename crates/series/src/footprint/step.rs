use meridian_core::{Bar, Price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Bars in the average-true-range window
pub const ATR_WINDOW: usize = 14;

/// Buckets a typical bar is split into
pub const DEFAULT_TARGET_BUCKETS: usize = 15;

/// Smallest step, relative to the last close
const MIN_STEP_RATIO: Decimal = dec!(0.0001);

/// Price step that splits a typical recent bar into about `target_buckets`
/// buckets: ATR over the last [`ATR_WINDOW`] bars divided by the target,
/// never below `last close * 0.0001`.
///
/// Returns `None` for empty history or a zero target.
pub fn dynamic_price_step(bars: &[Bar], target_buckets: usize) -> Option<Price> {
    let last = bars.last()?;
    if target_buckets == 0 {
        return None;
    }

    let window_start = bars.len().saturating_sub(ATR_WINDOW);
    let mut sum = Decimal::ZERO;
    for (i, bar) in bars.iter().enumerate().skip(window_start) {
        let range = bar.high() - bar.low();
        let true_range = match i.checked_sub(1).map(|prev| bars[prev].close()) {
            Some(prev_close) => range
                .max((bar.high() - prev_close).abs())
                .max((bar.low() - prev_close).abs()),
            None => range,
        };
        sum += true_range;
    }
    let atr = sum / Decimal::from(bars.len() - window_start);

    let step = (atr / Decimal::from(target_buckets)).max(last.close().abs() * MIN_STEP_RATIO);
    (step > Decimal::ZERO).then_some(step)
}
