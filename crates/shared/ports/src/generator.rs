use meridian_core::{Bar, ReplayCursor};

/// Capability shared by every derived-series producer.
///
/// Implementations hold private incremental state and are not internally
/// synchronized: callers serialize `update` calls per instance, typically
/// with one processing pipeline per instrument and timeframe.
///
/// For any bar sequence, `generate(bars)` must equal folding `update` over
/// the same bars starting from a fresh (reset) generator.
pub trait SeriesGenerator {
    /// One element of the derived series
    type Output;

    /// Drop all state and produced output
    fn reset(&mut self);

    /// Extend the series with one new base bar and return the complete
    /// series, history included.
    fn update(&mut self, bar: &Bar) -> &[Self::Output];

    /// The series produced so far
    fn series(&self) -> &[Self::Output];

    /// Recompute from scratch, e.g. after an instrument or parameter change
    fn generate(&mut self, bars: &[Bar]) -> &[Self::Output] {
        self.reset();
        for bar in bars {
            self.update(bar);
        }
        self.series()
    }

    /// Recompute from scratch using only the bars at or after `cursor`
    fn generate_from(&mut self, bars: &[Bar], cursor: ReplayCursor) -> &[Self::Output] {
        self.generate(cursor.slice(bars))
    }
}
