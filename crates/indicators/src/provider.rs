//! Loading calculation units by name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::builtin::{Bollinger, HigherTimeframeRange, MovingAverage, SwingMarkers};
use crate::error::{IndicatorError, IndicatorResult};
use crate::indicator::Indicator;

/// Source of calculation units.
///
/// The runtime only sees this interface; whether a unit comes from a
/// compiled-in factory, a shared library or a script host is up to the
/// provider.
pub trait IndicatorProvider: Send + Sync {
    /// A fresh logic object for `name`
    fn load(&self, name: &str) -> IndicatorResult<Arc<dyn Indicator>>;

    /// Names this provider can load
    fn available(&self) -> Vec<String>;
}

pub type IndicatorFactory = Arc<dyn Fn() -> Arc<dyn Indicator> + Send + Sync>;

/// In-process registry of factories
#[derive(Default)]
pub struct BuiltinProvider {
    factories: RwLock<HashMap<String, IndicatorFactory>>,
}

impl BuiltinProvider {
    /// Provider with nothing registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// Provider with the bundled indicators registered
    pub fn with_builtins() -> Self {
        let provider = Self::empty();
        provider.register(MovingAverage::NAME, || Arc::new(MovingAverage));
        provider.register(Bollinger::NAME, || Arc::new(Bollinger));
        provider.register(SwingMarkers::NAME, || Arc::new(SwingMarkers));
        provider.register(HigherTimeframeRange::NAME, || {
            Arc::new(HigherTimeframeRange)
        });
        provider
    }

    /// Register `factory` under `name`, replacing any previous factory.
    ///
    /// Returns true when an existing registration was replaced.
    pub fn register<F>(&self, name: &str, factory: F) -> bool
    where
        F: Fn() -> Arc<dyn Indicator> + Send + Sync + 'static,
    {
        let replaced = self
            .factories
            .write()
            .insert(name.to_string(), Arc::new(factory))
            .is_some();
        if replaced {
            tracing::info!("Replaced indicator factory '{}'", name);
        } else {
            tracing::debug!("Registered indicator factory '{}'", name);
        }
        replaced
    }
}

impl IndicatorProvider for BuiltinProvider {
    fn load(&self, name: &str) -> IndicatorResult<Arc<dyn Indicator>> {
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| IndicatorError::UnknownIndicator(name.to_string()))?;
        Ok(factory())
    }

    fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}
