//! Meridian Runner
//!
//! Wires the Meridian crates into chart pipelines:
//!
//! - **Config**: JSON runner configuration with an embedded default
//! - **Bootstrap**: indicator runtime and pipelines from config
//! - **Pipeline**: resampled timeframes, non-time-based series, footprint
//!   and indicator passes for one instrument
//! - **Live feed**: closed klines from the connection manager into a pipeline
//!
//! ## Architecture
//!
//! ```text
//!   CSV history ──► Pipeline::load_history ──► generate (bulk)
//!                          │
//!   LiveManager ──► live_feed::drive ──► Pipeline::on_closed_bar ──► update
//!                          │
//!                          ▼
//!                 IndicatorRuntime::recalculate
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod live_feed;
pub mod pipeline;

// Re-export main types
pub use bootstrap::{build_pipelines, indicator_runtime};
pub use config::{ConfigError, RunnerConfig, load_config, load_config_from_str, load_default_config};
pub use error::{RunnerError, RunnerResult};
pub use pipeline::{Pipeline, PipelineSummary};
