use meridian_core::{BarResult, Interval, Price};
use meridian_indicators::Settings;
use meridian_live::LiveConfig;
use meridian_series::{FootprintMode, KagiReversal};
use serde::{Deserialize, Serialize};

fn default_base_interval() -> String {
    "1m".to_string()
}

fn default_pnf_reversal() -> usize {
    3
}

fn default_visible_bars() -> usize {
    200
}

/// Root of `meridian_config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub instruments: Vec<InstrumentConfig>,

    /// Indicator instances, applied to every instrument
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,

    /// Number of trailing bars handed to indicators as the visible range
    #[serde(default = "default_visible_bars")]
    pub visible_bars: usize,

    #[serde(default)]
    pub live: LiveSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,

    #[serde(default = "default_base_interval")]
    pub base_interval: String,

    /// Higher timeframes resampled from the base interval
    #[serde(default)]
    pub targets: Vec<String>,

    /// CSV bar history for the base interval
    #[serde(default)]
    pub history: Option<String>,

    pub generators: GeneratorConfig,
}

impl InstrumentConfig {
    pub fn base(&self) -> BarResult<Interval> {
        Interval::parse(&self.base_interval)
    }

    pub fn target_intervals(&self) -> BarResult<Vec<Interval>> {
        self.targets.iter().map(|t| Interval::parse(t)).collect()
    }
}

/// Parameters of the derived series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub brick_size: Price,
    pub kagi: KagiReversal,
    pub pnf_box_size: Price,

    #[serde(default = "default_pnf_reversal")]
    pub pnf_reversal: usize,

    pub range_size: Price,

    #[serde(default)]
    pub footprint_mode: FootprintMode,

    /// Fixed footprint bucket; derived from history volatility when absent
    #[serde(default)]
    pub footprint_step: Option<Price>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveSection {
    /// Stream closed klines into the pipelines after loading history
    #[serde(default)]
    pub enabled: bool,

    #[serde(flatten)]
    pub connection: LiveConfig,
}
