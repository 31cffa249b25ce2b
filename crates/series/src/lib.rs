//! Meridian Series
//!
//! Everything derived from a bar history: interval resampling, the
//! non-time-based series (brick, Kagi, point-and-figure, range bars) and
//! footprint aggregation. Every producer implements
//! [`meridian_ports::SeriesGenerator`] so a full rebuild and the live
//! bar-by-bar path go through the same code.

pub mod brick;
pub mod direction;
pub mod footprint;
pub mod kagi;
pub mod point_figure;
pub mod quantize;
pub mod range_bar;
pub mod resample;

pub use brick::{Brick, BrickGenerator};
pub use direction::Direction;
pub use footprint::{
    DEFAULT_TARGET_BUCKETS, FootprintAggregator, FootprintBar, FootprintMetrics, FootprintMode,
    MAX_BUCKETS_PER_BAR, PriceLevel, dynamic_price_step,
};
pub use kagi::{KagiGenerator, KagiLine, KagiReversal, Thickness};
pub use point_figure::{ColumnKind, PnfColumn, PointFigureGenerator};
pub use range_bar::{RangeBar, RangeBarGenerator};
pub use resample::{Resampler, aggregate, resample, resample_from};
