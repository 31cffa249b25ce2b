//! Indicators shipped with the runtime

mod bollinger;
mod htf_range;
mod moving_average;
mod swing;

pub use bollinger::Bollinger;
pub use htf_range::HigherTimeframeRange;
pub use moving_average::MovingAverage;
pub use swing::SwingMarkers;
