use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{LiveError, LiveResult};

fn default_endpoint() -> String {
    "wss://stream.binance.com:9443/stream".to_string()
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    1_024
}

/// Connection manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Combined-stream endpoint; stream names are appended as `?streams=`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// First reconnect delay after a remote close or failed connect
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling reconnect delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Queue length of each subscription
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl LiveConfig {
    pub fn validate(&self) -> LiveResult<()> {
        let url = Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(LiveError::Config(format!(
                "endpoint must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }
        if self.initial_backoff_ms == 0 {
            return Err(LiveError::Config(
                "initial_backoff_ms must be positive".to_string(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(LiveError::Config(format!(
                "max_backoff_ms ({}) is below initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }
        if self.channel_capacity == 0 {
            return Err(LiveError::Config(
                "channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
