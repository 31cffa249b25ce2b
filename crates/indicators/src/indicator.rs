//! The calculation-unit contract.

use crate::context::{CalcContext, InstanceState};
use crate::drawable::Drawable;
use crate::error::IndicatorResult;
use crate::meta::{IndicatorMeta, Settings};

/// A calculation unit, however it was loaded.
///
/// Implementations hold no per-instance data: anything that must survive
/// between passes goes into [`InstanceState`], which the runtime owns and
/// resets on hot reload.
pub trait Indicator: Send + Sync {
    fn meta(&self) -> IndicatorMeta;

    /// Bars needed before the first visible bar for these settings
    fn lookback(&self, _settings: &Settings) -> usize {
        self.meta().lookback
    }

    /// Produce drawables for the context's visible window.
    ///
    /// Called exactly once per recalculation pass. An error or a panic is
    /// contained by the runtime and yields no output for this instance.
    fn calculate(&self, ctx: &mut CalcContext<'_>) -> IndicatorResult<Vec<Drawable>>;

    /// Called with the old and new settings before the new ones take effect
    fn on_settings_changed(&self, _old: &Settings, _new: &Settings, _state: &mut InstanceState) {}

    /// Called before the instance's state is discarded
    fn on_release(&self, _state: &mut InstanceState) {}
}
