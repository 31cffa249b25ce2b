//! Live kline streaming for Meridian
//!
//! A [`LiveManager`] keeps one combined-stream WebSocket connection for any
//! number of subscribers, reconnecting with exponential backoff after
//! remote closes and immediately after subscription changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use meridian_live::{LiveConfig, LiveManager, WsConnector};
//!
//! let manager = LiveManager::start(LiveConfig::default(), Arc::new(WsConnector))?;
//! let mut sub = manager.subscribe("BTCUSDT", &Interval::parse("1m")?)?;
//! while let Some(update) = sub.recv().await {
//!     if update.closed {
//!         pipeline.on_closed_bar(update.bar);
//!     }
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod manager;
pub mod stream;
pub mod transport;

// Re-export main types
pub use backoff::Backoff;
pub use config::LiveConfig;
pub use error::{LiveError, LiveResult};
pub use manager::{ConnectionState, LiveManager, Subscription, SubscriptionId};
pub use stream::{KlineUpdate, combined_stream_url, interval_name, parse_message, stream_id};
pub use transport::{Connector, Transport, WsConnector};
