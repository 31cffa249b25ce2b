//! Property tests: every producer gives the same series whether it is fed a
//! whole history at once or one bar at a time.

use chrono::{DateTime, TimeDelta};
use meridian_core::{Bar, Interval};
use meridian_ports::SeriesGenerator;
use meridian_series::{
    BrickGenerator, FootprintAggregator, FootprintMode, KagiGenerator, KagiReversal,
    PointFigureGenerator, RangeBarGenerator, Resampler, resample,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// One step of a random walk: close change, wick sizes, volume and the gap
/// to the next bar in minutes
type Step = (i64, u8, u8, u16, i64);

fn walk(steps: &[Step]) -> Vec<Bar> {
    let start = DateTime::from_timestamp_millis(1_704_067_200_000).unwrap();
    let mut time = start;
    let mut close = dec!(1000);
    let mut bars = Vec::with_capacity(steps.len());

    for &(change, up_wick, down_wick, volume, gap) in steps {
        let open = close;
        close = (open + Decimal::new(change, 1)).max(dec!(1));
        let high = open.max(close) + Decimal::new(up_wick as i64, 1);
        let low = (open.min(close) - Decimal::new(down_wick as i64, 1)).max(dec!(0.1));
        bars.push(Bar::new(time, open, high, low, close, Decimal::from(volume)).unwrap());
        time += TimeDelta::minutes(gap);
    }
    bars
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec((-80i64..80, 0u8..40, 0u8..40, 0u16..500, 1i64..4), 0..120)
}

/// `generate` must match a fresh generator fed bar by bar
fn assert_bulk_matches_incremental<G>(mut make: impl FnMut() -> G, bars: &[Bar])
where
    G: SeriesGenerator,
    G::Output: PartialEq + std::fmt::Debug,
{
    let mut incremental = make();
    for bar in bars {
        incremental.update(bar);
    }

    // Bulk on a generator that already holds unrelated state
    let mut bulk = make();
    for bar in bars.iter().rev().take(5) {
        bulk.update(bar);
    }
    bulk.generate(bars);

    assert_eq!(bulk.series(), incremental.series());
}

proptest! {
    #[test]
    fn test_brick_bulk_matches_incremental(steps in steps(), size in 1i64..50) {
        let bars = walk(&steps);
        assert_bulk_matches_incremental(|| BrickGenerator::new(Decimal::from(size)).unwrap(), &bars);
    }

    #[test]
    fn test_kagi_bulk_matches_incremental(steps in steps(), points in 1i64..50) {
        let bars = walk(&steps);
        assert_bulk_matches_incremental(
            || KagiGenerator::new(KagiReversal::Points(Decimal::from(points))).unwrap(),
            &bars,
        );
    }

    #[test]
    fn test_point_figure_bulk_matches_incremental(
        steps in steps(),
        box_size in 1i64..20,
        reversal in 1usize..4,
    ) {
        let bars = walk(&steps);
        assert_bulk_matches_incremental(
            || PointFigureGenerator::new(Decimal::from(box_size), reversal).unwrap(),
            &bars,
        );
    }

    #[test]
    fn test_range_bar_bulk_matches_incremental(steps in steps(), size in 1i64..60) {
        let bars = walk(&steps);
        assert_bulk_matches_incremental(|| RangeBarGenerator::new(Decimal::from(size)).unwrap(), &bars);
    }

    #[test]
    fn test_footprint_bulk_matches_incremental(steps in steps()) {
        let bars = walk(&steps);
        assert_bulk_matches_incremental(
            || FootprintAggregator::new(dec!(0.5), FootprintMode::Approximate).unwrap(),
            &bars,
        );
    }

    #[test]
    fn test_resampler_bulk_matches_incremental(steps in steps(), minutes in 1i64..30) {
        let bars = walk(&steps);
        let target = Interval::minutes(minutes).unwrap();
        assert_bulk_matches_incremental(|| Resampler::new(target.clone()), &bars);

        let expected = resample(&bars, &target);
        let mut resampler = Resampler::new(target.clone());
        prop_assert_eq!(resampler.generate(&bars), expected.as_slice());
    }

    #[test]
    fn test_resample_is_idempotent(steps in steps(), minutes in 1i64..30) {
        let bars = walk(&steps);
        let target = Interval::minutes(minutes).unwrap();
        let once = resample(&bars, &target);
        prop_assert_eq!(resample(&once, &target), once);
    }

    #[test]
    fn test_resample_to_source_interval_is_passthrough(steps in steps()) {
        let bars = walk(&steps);
        prop_assert_eq!(resample(&bars, &Interval::minutes(1).unwrap()), bars);
    }

    #[test]
    fn test_resample_preserves_volume(steps in steps(), minutes in 1i64..30) {
        let bars = walk(&steps);
        let out = resample(&bars, &Interval::minutes(minutes).unwrap());
        let before: Decimal = bars.iter().map(Bar::volume).sum();
        let after: Decimal = out.iter().map(Bar::volume).sum();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn test_bricks_are_contiguous(steps in steps(), size in 1i64..50) {
        let bars = walk(&steps);
        let mut brick_gen = BrickGenerator::new(Decimal::from(size)).unwrap();
        let bricks = brick_gen.generate(&bars);
        for pair in bricks.windows(2) {
            prop_assert_eq!(pair[0].close, pair[1].open);
        }
        for brick in bricks {
            prop_assert_eq!(brick.high - brick.low, Decimal::from(size));
        }
    }
}
