use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::types::RunnerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No instruments in config")]
    NoInstruments,
    #[error("Instrument listed twice: {0}")]
    DuplicateInstrument(String),
    #[error("Invalid interval for {symbol}: {reason}")]
    InvalidInterval { symbol: String, reason: String },
    #[error("Invalid generator parameters for {symbol}: {reason}")]
    InvalidGenerator { symbol: String, reason: String },
    #[error("visible_bars must be positive")]
    NoVisibleBars,
    #[error("Invalid live settings: {0}")]
    Live(#[from] meridian_live::LiveError),
}

/// Load runner configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunnerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: RunnerConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<RunnerConfig, ConfigError> {
    let config: RunnerConfig = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<RunnerConfig, ConfigError> {
    let default_config = include_str!("meridian_config.json");
    load_config_from_str(default_config)
}

impl RunnerConfig {
    /// Get an instrument by symbol, case-insensitively
    pub fn get_instrument(&self, symbol: &str) -> Option<&super::types::InstrumentConfig> {
        self.instruments
            .iter()
            .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        if self.visible_bars == 0 {
            return Err(ConfigError::NoVisibleBars);
        }

        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if !seen.insert(instrument.symbol.to_uppercase()) {
                return Err(ConfigError::DuplicateInstrument(instrument.symbol.clone()));
            }

            let invalid_interval = |e: meridian_core::BarError| ConfigError::InvalidInterval {
                symbol: instrument.symbol.clone(),
                reason: e.to_string(),
            };
            instrument.base().map_err(invalid_interval)?;
            instrument.target_intervals().map_err(invalid_interval)?;

            let generators = &instrument.generators;
            let invalid_generator = |reason: String| ConfigError::InvalidGenerator {
                symbol: instrument.symbol.clone(),
                reason,
            };
            for (name, value) in [
                ("brick_size", generators.brick_size),
                ("pnf_box_size", generators.pnf_box_size),
                ("range_size", generators.range_size),
            ] {
                if value <= rust_decimal::Decimal::ZERO {
                    return Err(invalid_generator(format!("{name} must be positive")));
                }
            }
            if generators.pnf_reversal == 0 {
                return Err(invalid_generator("pnf_reversal must be at least 1".to_string()));
            }
            if let Some(step) = generators.footprint_step
                && step <= rust_decimal::Decimal::ZERO
            {
                return Err(invalid_generator("footprint_step must be positive".to_string()));
            }
        }

        self.live.connection.validate()?;
        Ok(())
    }
}
