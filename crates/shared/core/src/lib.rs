//! Meridian Core Domain
//!
//! Market data types shared by every Meridian crate: bars, intervals,
//! trade ticks and the replay cursor handed over by session storage.
//! This crate contains no async and no networking.

pub mod csv;
pub mod entities;
pub mod error;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{AggressorSide, Bar, Interval, ReplayCursor, TradeTick};
pub use error::{BarError, BarResult};
pub use values::{Price, Quantity, Symbol, Timestamp};
