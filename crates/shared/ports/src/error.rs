use rust_decimal::Decimal;
use thiserror::Error;

/// Invalid generator/aggregator parameters.
///
/// Raised by constructors, before any data is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: Decimal },

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },
}

impl ConfigError {
    /// Check that a decimal parameter is strictly positive
    pub fn require_positive(name: &'static str, value: Decimal) -> ConfigResult<Decimal> {
        if value > Decimal::ZERO {
            Ok(value)
        } else {
            Err(ConfigError::NonPositive { name, value })
        }
    }

    /// Check that a count parameter is at least `min`
    pub fn require_at_least(name: &'static str, value: usize, min: usize) -> ConfigResult<usize> {
        if value >= min {
            Ok(value)
        } else {
            Err(ConfigError::TooSmall { name, min, value })
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
