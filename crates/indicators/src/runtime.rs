//! Indicator Runtime
//!
//! Owns the active indicator instances, runs them once per recalculation
//! pass and publishes a [`RuntimeEvent`] for every change so a renderer can
//! react.

use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use meridian_core::Bar;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::context::{CalcContext, DebugAnnotations, InstanceState, TimeframeCache};
use crate::drawable::Drawable;
use crate::error::{IndicatorError, IndicatorResult};
use crate::indicator::Indicator;
use crate::meta::{IndicatorMeta, Settings};
use crate::provider::IndicatorProvider;

/// Stable identity of an indicator instance
pub type InstanceId = Uuid;

const EVENT_CAPACITY: usize = 256;

/// Change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Added { id: InstanceId, name: String },
    /// Settings changed or logic hot-reloaded
    Updated { id: InstanceId },
    Removed { id: InstanceId },
    /// A recalculation pass finished
    Recalculated { instances: usize },
}

/// Output of one instance for one pass
#[derive(Debug, Clone, Default)]
pub struct CalcOutput {
    pub id: InstanceId,
    pub name: String,
    pub drawables: Vec<Drawable>,
    pub debug: DebugAnnotations,
    /// Set when the calculation failed and the output was dropped
    pub error: Option<String>,
}

struct Instance {
    id: InstanceId,
    logic: Arc<dyn Indicator>,
    meta: IndicatorMeta,
    settings: Settings,
    state: InstanceState,
}

pub struct IndicatorRuntime {
    provider: Arc<dyn IndicatorProvider>,
    /// Insertion-ordered; calculation order follows it
    instances: RwLock<Vec<Arc<Mutex<Instance>>>>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl IndicatorRuntime {
    pub fn new(provider: Arc<dyn IndicatorProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            provider,
            instances: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Receive change notifications from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    pub fn provider(&self) -> &Arc<dyn IndicatorProvider> {
        &self.provider
    }

    /// Load `name` from the provider and add an instance of it.
    ///
    /// `overrides` are validated and applied on top of the defaults.
    pub fn add(&self, name: &str, overrides: Settings) -> IndicatorResult<InstanceId> {
        let logic = self.provider.load(name)?;
        self.add_logic(logic, overrides)
    }

    /// Add an instance of an already loaded logic object
    pub fn add_logic(
        &self,
        logic: Arc<dyn Indicator>,
        overrides: Settings,
    ) -> IndicatorResult<InstanceId> {
        let meta = logic.meta();
        meta.validate(&overrides)?;
        let mut settings = meta.default_settings();
        settings.merge(&overrides);

        let id = Uuid::new_v4();
        let name = meta.name.clone();
        self.instances.write().push(Arc::new(Mutex::new(Instance {
            id,
            logic,
            meta,
            settings,
            state: InstanceState::new(),
        })));

        tracing::info!("Added indicator {} ({})", name, id);
        self.notify(RuntimeEvent::Added { id, name });
        Ok(id)
    }

    /// Remove an instance, running its release hook first
    pub fn remove(&self, id: InstanceId) -> IndicatorResult<()> {
        let instance = {
            let mut instances = self.instances.write();
            let index = instances
                .iter()
                .position(|i| i.lock().id == id)
                .ok_or(IndicatorError::UnknownInstance(id))?;
            instances.remove(index)
        };

        let mut instance = instance.lock();
        let Instance { logic, state, .. } = &mut *instance;
        logic.on_release(state);
        state.clear();

        tracing::info!("Removed indicator {} ({})", instance.meta.name, id);
        self.notify(RuntimeEvent::Removed { id });
        Ok(())
    }

    /// Validate `changes`, run the settings-changed hook, then apply them
    pub fn update_settings(&self, id: InstanceId, changes: Settings) -> IndicatorResult<()> {
        let instance = self.find(id)?;
        let mut instance = instance.lock();
        instance.meta.validate(&changes)?;

        let mut next = instance.settings.clone();
        next.merge(&changes);

        let Instance {
            logic,
            settings,
            state,
            ..
        } = &mut *instance;
        logic.on_settings_changed(settings, &next, state);
        *settings = next;
        drop(instance);

        tracing::debug!("Updated settings of indicator {}", id);
        self.notify(RuntimeEvent::Updated { id });
        Ok(())
    }

    /// Swap the calculation logic of `id` in place.
    ///
    /// Identity and current settings survive (reconciled with the new
    /// parameter list); transient calculation state is reset.
    pub fn hot_reload(&self, id: InstanceId, logic: Arc<dyn Indicator>) -> IndicatorResult<()> {
        let instance = self.find(id)?;
        let mut instance = instance.lock();

        let Instance {
            logic: old_logic,
            state,
            ..
        } = &mut *instance;
        old_logic.on_release(state);
        state.clear();

        let meta = logic.meta();
        instance.settings = meta.reconcile(&instance.settings);
        instance.meta = meta;
        instance.logic = logic;

        tracing::info!("Hot-reloaded indicator {} ({})", instance.meta.name, id);
        drop(instance);
        self.notify(RuntimeEvent::Updated { id });
        Ok(())
    }

    /// Hot-reload every instance of `name` with fresh logic from the provider.
    ///
    /// Returns the reloaded ids, in instance order.
    pub fn reload_by_name(&self, name: &str) -> IndicatorResult<Vec<InstanceId>> {
        let targets: Vec<InstanceId> = self
            .instances
            .read()
            .iter()
            .filter_map(|i| {
                let instance = i.lock();
                (instance.meta.name == name).then_some(instance.id)
            })
            .collect();

        for id in &targets {
            let logic = self.provider.load(name)?;
            self.hot_reload(*id, logic)?;
        }
        Ok(targets)
    }

    /// Drop the calculation state of every instance, running release hooks.
    ///
    /// Identity and settings are kept. Used when the history is replaced
    /// and cached values no longer describe it.
    pub fn reset_state(&self) {
        let snapshot: Vec<_> = self.instances.read().iter().cloned().collect();
        for instance in &snapshot {
            let mut instance = instance.lock();
            let Instance { logic, state, .. } = &mut *instance;
            logic.on_release(state);
            state.clear();
        }
        tracing::debug!("Reset state of {} indicator(s)", snapshot.len());
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.instances.read().iter().map(|i| i.lock().id).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    pub fn settings(&self, id: InstanceId) -> Option<Settings> {
        self.find(id).ok().map(|i| i.lock().settings.clone())
    }

    pub fn meta(&self, id: InstanceId) -> Option<IndicatorMeta> {
        self.find(id).ok().map(|i| i.lock().meta.clone())
    }

    /// True when the instance holds no calculation state
    pub fn is_state_empty(&self, id: InstanceId) -> Option<bool> {
        self.find(id).ok().map(|i| i.lock().state.is_empty())
    }

    /// Run every instance once over `history[visible]` (plus its lookback).
    ///
    /// A failing or panicking instance yields an empty output with `error`
    /// set; the others are unaffected.
    pub fn recalculate(&self, history: &[Bar], visible: Range<usize>) -> Vec<CalcOutput> {
        let snapshot: Vec<_> = self.instances.read().iter().cloned().collect();

        let outputs: Vec<CalcOutput> = snapshot
            .iter()
            .map(|instance| {
                let mut instance = instance.lock();
                run_instance(&mut instance, history, visible.clone())
            })
            .collect();

        self.notify(RuntimeEvent::Recalculated {
            instances: outputs.len(),
        });
        outputs
    }

    fn find(&self, id: InstanceId) -> IndicatorResult<Arc<Mutex<Instance>>> {
        self.instances
            .read()
            .iter()
            .find(|i| i.lock().id == id)
            .cloned()
            .ok_or(IndicatorError::UnknownInstance(id))
    }

    fn notify(&self, event: RuntimeEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}

fn run_instance(instance: &mut Instance, history: &[Bar], visible: Range<usize>) -> CalcOutput {
    let Instance {
        id,
        logic,
        meta,
        settings,
        state,
    } = instance;

    let mut output = CalcOutput {
        id: *id,
        name: meta.name.clone(),
        ..CalcOutput::default()
    };
    let mut timeframes = TimeframeCache::default();
    let mut debug = DebugAnnotations::new();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let lookback = logic.lookback(settings);
        let mut ctx = CalcContext::new(
            history,
            visible,
            lookback,
            settings,
            state,
            &mut timeframes,
            &mut debug,
        );
        logic.calculate(&mut ctx)
    }));

    match result {
        Ok(Ok(drawables)) => {
            output.drawables = drawables;
            output.debug = debug;
        }
        Ok(Err(e)) => {
            tracing::warn!("Indicator {} ({}) failed: {}", output.name, output.id, e);
            output.error = Some(e.to_string());
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!("Indicator {} ({}) panicked: {}", output.name, output.id, message);
            output.error = Some(message);
        }
    }
    output
}
