use meridian_core::BarError;
use meridian_indicators::IndicatorError;
use meridian_ports::ConfigError as GeneratorConfigError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid generator parameters: {0}")]
    Generator(#[from] GeneratorConfigError),

    #[error("Invalid interval: {0}")]
    Interval(#[from] BarError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),
}

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;
