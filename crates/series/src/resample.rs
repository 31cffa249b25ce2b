//! Interval resampling: lower-interval bars into higher-interval bars.

use meridian_core::{Bar, Interval, ReplayCursor, Timestamp};
use meridian_ports::SeriesGenerator;

/// Resample time-ordered `source` bars onto the `target` interval.
///
/// Single forward pass. Each output bar starts at its bucket start. The last
/// bucket is emitted even if incomplete (it is the live bar); callers that
/// only want closed bars drop the last element.
///
/// Precondition: `source` is sorted by time. Out-of-order input gives
/// unspecified bucket assignment and is not checked.
pub fn resample(source: &[Bar], target: &Interval) -> Vec<Bar> {
    let mut out = Vec::with_capacity(source.len());
    let mut forming: Option<Bar> = None;

    for bar in source {
        let bucket = target.bucket_start(bar.time());
        forming = Some(match forming {
            Some(current) if current.time() == bucket => aggregate(&current, bar),
            Some(current) => {
                out.push(current);
                bar.with_time(bucket)
            }
            None => bar.with_time(bucket),
        });
    }

    out.extend(forming);
    out
}

/// Resample only the part of `source` at or after `cursor`
pub fn resample_from(source: &[Bar], target: &Interval, cursor: ReplayCursor) -> Vec<Bar> {
    resample(cursor.slice(source), target)
}

/// Merge `incoming` into the forming bar `current`: open kept, high max,
/// low min, close from `incoming`, volumes summed.
#[inline]
pub fn aggregate(current: &Bar, incoming: &Bar) -> Bar {
    current.merge(incoming)
}

/// Incremental resampler for the live path.
///
/// Holds the source bars of the forming bucket so that a feed re-sending
/// the same (still forming) source bar replaces its earlier contribution
/// instead of adding its volume twice.
#[derive(Debug, Clone)]
pub struct Resampler {
    target: Interval,
    bars: Vec<Bar>,
    forming_sources: Vec<Bar>,
}

impl Resampler {
    pub fn new(target: Interval) -> Self {
        Self {
            target,
            bars: Vec::new(),
            forming_sources: Vec::new(),
        }
    }

    pub fn target(&self) -> &Interval {
        &self.target
    }

    /// The bar currently being formed, if any
    pub fn forming(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// All bars whose bucket has been superseded by a later one
    pub fn closed(&self) -> &[Bar] {
        &self.bars[..self.bars.len().saturating_sub(1)]
    }

    fn refold_forming(&self, bucket: Timestamp) -> Option<Bar> {
        let (first, rest) = self.forming_sources.split_first()?;
        Some(
            rest.iter()
                .fold(first.with_time(bucket), |acc, bar| aggregate(&acc, bar)),
        )
    }
}

impl SeriesGenerator for Resampler {
    type Output = Bar;

    fn reset(&mut self) {
        self.bars.clear();
        self.forming_sources.clear();
    }

    fn update(&mut self, bar: &Bar) -> &[Bar] {
        let bucket = self.target.bucket_start(bar.time());
        let same_bucket = self.bars.last().is_some_and(|last| last.time() == bucket);

        if !same_bucket {
            self.forming_sources.clear();
            self.forming_sources.push(*bar);
            self.bars.push(bar.with_time(bucket));
            return &self.bars;
        }

        let repeated = self
            .forming_sources
            .last()
            .is_some_and(|last| last.time() == bar.time());

        if repeated {
            if let Some(last) = self.forming_sources.last_mut() {
                *last = *bar;
            }
            let refolded = self.refold_forming(bucket);
            if let (Some(refolded), Some(last)) = (refolded, self.bars.last_mut()) {
                *last = refolded;
            }
        } else {
            self.forming_sources.push(*bar);
            if let Some(last) = self.bars.last_mut() {
                *last = aggregate(last, bar);
            }
        }

        &self.bars
    }

    fn series(&self) -> &[Bar] {
        &self.bars
    }
}
