//! Meridian Ports
//!
//! Port definitions (traits) shared between the derived-data crates and
//! the pipeline that drives them.

mod error;
mod generator;

pub use error::{ConfigError, ConfigResult};
pub use generator::SeriesGenerator;
