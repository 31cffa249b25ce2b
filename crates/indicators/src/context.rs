//! Everything one calculation call gets to see.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::sync::Arc;

use meridian_core::{Bar, Interval};
use meridian_series::resample;

use crate::meta::Settings;

/// Private calculation state of one instance, keyed by type.
///
/// Survives between passes and settings changes; dropped on remove and
/// reset on hot reload.
#[derive(Default)]
pub struct InstanceState {
    slots: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl InstanceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `T` slot, created with `T::default()` on first use
    pub fn get_or_default<T: Any + Send + Default>(&mut self) -> &mut T {
        let slot = self
            .slots
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("slot keyed by its own TypeId"),
        }
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<T>())
    }

    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceState")
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// Key/value annotations per bar index of the full history
pub type DebugAnnotations = BTreeMap<usize, Vec<(String, String)>>;

/// Higher (or other) timeframe series, resampled at most once per pass
#[derive(Debug, Default)]
pub struct TimeframeCache {
    series: HashMap<Interval, Arc<[Bar]>>,
}

impl TimeframeCache {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Input of [`crate::Indicator::calculate`].
///
/// `bars()` is the visible window preceded by up to `lookback` bars of
/// history. Indices given to [`CalcContext::annotate`] are relative to
/// `bars()`; the runtime maps them onto the full history.
pub struct CalcContext<'a> {
    history: &'a [Bar],
    window_start: usize,
    visible_start: usize,
    visible_end: usize,
    settings: &'a Settings,
    state: &'a mut InstanceState,
    timeframes: &'a mut TimeframeCache,
    debug: &'a mut DebugAnnotations,
}

impl<'a> CalcContext<'a> {
    /// `visible` is clamped to `history`
    pub fn new(
        history: &'a [Bar],
        visible: std::ops::Range<usize>,
        lookback: usize,
        settings: &'a Settings,
        state: &'a mut InstanceState,
        timeframes: &'a mut TimeframeCache,
        debug: &'a mut DebugAnnotations,
    ) -> Self {
        let visible_end = visible.end.min(history.len());
        let visible_start = visible.start.min(visible_end);
        Self {
            history,
            window_start: visible_start.saturating_sub(lookback),
            visible_start,
            visible_end,
            settings,
            state,
            timeframes,
            debug,
        }
    }

    /// Visible bars plus lookback
    pub fn bars(&self) -> &'a [Bar] {
        &self.history[self.window_start..self.visible_end]
    }

    /// Index in [`CalcContext::bars`] of the first visible bar
    pub fn visible_offset(&self) -> usize {
        self.visible_start - self.window_start
    }

    pub fn visible_bars(&self) -> &'a [Bar] {
        &self.history[self.visible_start..self.visible_end]
    }

    /// Index in the full history of `bars()[0]`
    pub fn first_index(&self) -> usize {
        self.window_start
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn state(&mut self) -> &mut InstanceState {
        &mut *self.state
    }

    /// The full history resampled onto `interval`, shared for the rest of
    /// the pass.
    pub fn timeframe(&mut self, interval: &Interval) -> Arc<[Bar]> {
        if let Some(series) = self.timeframes.series.get(interval) {
            return Arc::clone(series);
        }
        let series: Arc<[Bar]> = resample(self.history, interval).into();
        self.timeframes
            .series
            .insert(interval.clone(), Arc::clone(&series));
        series
    }

    /// Attach `key = value` to `bars()[index]`
    pub fn annotate(&mut self, index: usize, key: &str, value: impl Display) {
        self.debug
            .entry(self.window_start + index)
            .or_default()
            .push((key.to_string(), value.to_string()));
    }
}
