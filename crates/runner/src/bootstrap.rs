//! Building the indicator runtime and pipelines from configuration

use std::sync::Arc;

use meridian_indicators::{BuiltinProvider, IndicatorRuntime};
use tracing::info;

use crate::config::RunnerConfig;
use crate::error::RunnerResult;
use crate::pipeline::Pipeline;

/// Runtime with the built-in indicators and one instance per configured entry
pub fn indicator_runtime(config: &RunnerConfig) -> RunnerResult<Arc<IndicatorRuntime>> {
    let runtime = IndicatorRuntime::new(Arc::new(BuiltinProvider::with_builtins()));
    for indicator in &config.indicators {
        let id = runtime.add(&indicator.name, indicator.settings.clone())?;
        info!(indicator = %indicator.name, id = %id, "Indicator added");
    }
    Ok(Arc::new(runtime))
}

/// One pipeline per configured instrument, in config order. Each gets its
/// own runtime so indicator state never mixes instruments.
pub fn build_pipelines(config: &RunnerConfig) -> RunnerResult<Vec<Pipeline>> {
    config
        .instruments
        .iter()
        .map(|instrument| {
            let runtime = indicator_runtime(config)?;
            Pipeline::from_config(instrument, config.visible_bars, runtime)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_default_config;

    #[test]
    fn test_default_config_builds() {
        let config = load_default_config().unwrap();
        let runtime = indicator_runtime(&config).unwrap();
        assert_eq!(runtime.len(), config.indicators.len());

        let pipelines = build_pipelines(&config).unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].symbol(), "BTCUSDT");
        assert_eq!(pipelines[0].base().label(), "1m");
        assert_eq!(pipelines[0].indicators().len(), config.indicators.len());
    }

    #[test]
    fn test_each_instrument_gets_its_own_runtime() {
        let mut config = load_default_config().unwrap();
        let mut second = config.instruments[0].clone();
        second.symbol = "ETHUSDT".to_string();
        config.instruments.push(second);

        let pipelines = build_pipelines(&config).unwrap();
        assert_eq!(pipelines.len(), 2);
        assert!(!Arc::ptr_eq(pipelines[0].indicators(), pipelines[1].indicators()));
    }

    #[test]
    fn test_unknown_indicator_fails() {
        let mut config = load_default_config().unwrap();
        config.indicators.push(crate::config::IndicatorConfig {
            name: "nope".to_string(),
            settings: Default::default(),
        });
        assert!(indicator_runtime(&config).is_err());
    }
}
