//! Meridian Indicators
//!
//! The indicator plugin contract and the runtime that hosts it:
//! - [`Indicator`]: a calculation unit declaring its parameters and turning
//!   a [`CalcContext`] into [`Drawable`]s
//! - [`IndicatorProvider`]: loads units by name; the runtime never sees how
//! - [`IndicatorRuntime`]: instance lifecycle, hot reload and isolated
//!   recalculation passes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_indicators::{BuiltinProvider, IndicatorRuntime, Settings};
//!
//! let runtime = IndicatorRuntime::new(Arc::new(BuiltinProvider::with_builtins()));
//! let id = runtime.add("moving_average", Settings::new())?;
//! let outputs = runtime.recalculate(&bars, 0..bars.len());
//! ```

pub mod builtin;
pub mod context;
pub mod drawable;
pub mod error;
pub mod indicator;
pub mod meta;
pub mod provider;
pub mod runtime;

// Re-export main types
pub use context::{CalcContext, DebugAnnotations, InstanceState};
pub use drawable::{Drawable, MarkerShape, Point};
pub use error::{IndicatorError, IndicatorResult};
pub use indicator::Indicator;
pub use meta::{IndicatorMeta, ParamKind, ParamSpec, ParamValue, Placement, Settings};
pub use provider::{BuiltinProvider, IndicatorFactory, IndicatorProvider};
pub use runtime::{CalcOutput, IndicatorRuntime, InstanceId, RuntimeEvent};
