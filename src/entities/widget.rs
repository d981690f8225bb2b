//! Widget: the leaf content unit.
//!
//! A widget owns no layout, only behavior and data. It talks to the
//! outside world through two narrow channels: the external persistence
//! collaborator (scoped to its own id) and its namespaced event bus. The
//! enclosing cell taps the bus; the widget itself never holds a reference
//! up the tree, its parent is just an id string.

use std::any::Any;
use std::sync::Arc;

use log::{debug, warn};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::core::event_bus::EventBus;
use crate::core::events::{self, WidgetEventData};

use super::traits::DataStore;

/// Override surface for widget behavior.
///
/// Implementations hold the widget's domain state. Everything except
/// `kind` and the `Any` accessors has a default, so a minimal behavior is
/// a few lines.
pub trait WidgetBehavior: Send {
    /// Stable behavior type identifier ("counter", "note", ...)
    fn kind(&self) -> &str;

    /// Runs once, right after the data-store handle is established, so
    /// state can be restored before the widget takes further calls.
    fn on_data_store_ready(&mut self, _ctx: &WidgetCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// New pixel dimensions of the content area, forwarded by the owning
    /// cell whenever its geometry changes.
    fn on_resize(&mut self, _width_px: f32, _height_px: f32) {}

    /// Runs exactly once when the widget is disposed
    fn on_dispose(&mut self) {}

    /// Extra metadata merged into this widget's layout record; whatever a
    /// host factory needs to reconstruct the behavior.
    fn save_metadata(&self) -> Value {
        Value::Null
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Borrowed view handed to behavior code: identity, persistence and the
/// widget's bus, without exposing the widget struct itself.
pub struct WidgetCtx<'a> {
    id: &'a str,
    store: Option<&'a Arc<dyn DataStore>>,
    bus: &'a EventBus,
}

impl WidgetCtx<'_> {
    pub fn id(&self) -> &str {
        self.id
    }

    /// Load `key` from the widget's scope. Missing keys and store failures
    /// both come back as None; failures are logged.
    pub fn load_data(&self, key: &str) -> Option<Value> {
        load_via(self.id, self.store, key)
    }

    /// Persist `value` under `key` in the widget's scope. Returns false
    /// when there is no store or the store failed; failures are logged.
    pub fn save_data(&self, key: &str, value: Value) -> bool {
        save_via(self.id, self.store, key, value)
    }

    /// Publish a domain event from this widget (see
    /// [`Widget::publish_event`]).
    pub fn publish_event(&self, name: &str, data: Value) {
        publish_via(self.bus, self.id, name, data);
    }
}

/// The leaf content unit: identity, bus, persistence handle and a boxed
/// behavior.
pub struct Widget {
    id: String,
    parent_cell: Option<String>,
    bus: EventBus,
    store: Option<Arc<dyn DataStore>>,
    behavior: Box<dyn WidgetBehavior>,
    initialized: bool,
    disposed: bool,
}

impl Widget {
    /// Create a widget with a caller-supplied stable id
    pub fn new(id: impl Into<String>, behavior: Box<dyn WidgetBehavior>) -> Self {
        let id = id.into();
        let bus = EventBus::new(format!("widget:{id}"));
        Self {
            id,
            parent_cell: None,
            bus,
            store: None,
            behavior,
            initialized: false,
            disposed: false,
        }
    }

    /// Create a widget with a generated uuid id
    pub fn with_generated_id(behavior: Box<dyn WidgetBehavior>) -> Self {
        Self::new(Uuid::new_v4().to_string(), behavior)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Behavior type identifier
    pub fn kind(&self) -> &str {
        self.behavior.kind()
    }

    /// This widget's namespaced bus (`widget:<id>`)
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Id of the enclosing cell, if attached
    pub fn parent_cell(&self) -> Option<&str> {
        self.parent_cell.as_deref()
    }

    pub(crate) fn set_parent_cell(&mut self, parent: Option<String>) {
        self.parent_cell = parent;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// One-time setup: establish the data-store handle, then run the
    /// behavior's `on_data_store_ready` hook. Hook failures are logged and
    /// swallowed; a repeated call warns and does nothing.
    pub fn initialize(&mut self, store: Arc<dyn DataStore>) {
        if self.initialized {
            warn!("widget {}: initialize called twice, ignored", self.id);
            return;
        }
        self.store = Some(store);
        self.initialized = true;

        let ctx = WidgetCtx {
            id: &self.id,
            store: self.store.as_ref(),
            bus: &self.bus,
        };
        if let Err(err) = self.behavior.on_data_store_ready(&ctx) {
            warn!("widget {}: on_data_store_ready failed: {:#}", self.id, err);
        }
        debug!("widget {} ({}) initialized", self.id, self.behavior.kind());
    }

    /// Load `key` from this widget's scope; None on missing key, missing
    /// store, or store failure.
    pub fn load_data(&self, key: &str) -> Option<Value> {
        load_via(&self.id, self.store.as_ref(), key)
    }

    /// Persist `value` under `key` in this widget's scope; false when not
    /// persisted.
    pub fn save_data(&self, key: &str, value: Value) -> bool {
        save_via(&self.id, self.store.as_ref(), key, value)
    }

    /// Publish a domain event on this widget's bus, under both `name` and
    /// the uniform [`events::WIDGET_EVENT`] channel that containers tap.
    pub fn publish_event(&self, name: &str, data: Value) {
        publish_via(&self.bus, &self.id, name, data);
    }

    /// Forward the content-area pixel size to the behavior
    pub fn on_resize(&mut self, width_px: f32, height_px: f32) {
        self.behavior.on_resize(width_px, height_px);
    }

    /// Run `f` with mutable behavior access plus this widget's context
    /// view; the hook-style environment for host-driven behavior calls.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut dyn WidgetBehavior, &WidgetCtx<'_>) -> R) -> R {
        let ctx = WidgetCtx {
            id: &self.id,
            store: self.store.as_ref(),
            bus: &self.bus,
        };
        f(self.behavior.as_mut(), &ctx)
    }

    /// Downcast access to the concrete behavior
    pub fn behavior<T: Any>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }

    /// Mutable downcast access to the concrete behavior
    pub fn behavior_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.behavior.as_any_mut().downcast_mut::<T>()
    }

    /// Release the data-store handle and run the behavior's `on_dispose`
    /// hook. Idempotent. Persisted data is untouched.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.behavior.on_dispose();
        self.store = None;
        debug!("widget {} disposed", self.id);
    }

    /// Layout record for this widget: identity plus behavior extras. The
    /// identity keys win over anything the behavior reports.
    pub fn layout_metadata(&self) -> Value {
        let mut meta = json!({
            "widget_id": self.id,
            "kind": self.behavior.kind(),
        });
        if let (Value::Object(target), Value::Object(extra)) =
            (&mut meta, self.behavior.save_metadata())
        {
            for (key, value) in extra {
                target.entry(key).or_insert(value);
            }
        }
        meta
    }
}

impl std::fmt::Debug for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("id", &self.id)
            .field("kind", &self.behavior.kind())
            .field("initialized", &self.initialized)
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn load_via(id: &str, store: Option<&Arc<dyn DataStore>>, key: &str) -> Option<Value> {
    let Some(store) = store else {
        warn!("widget {id}: load '{key}' with no data store attached");
        return None;
    };
    match store.get(id, key) {
        Ok(value) => value,
        Err(err) => {
            warn!("widget {id}: load '{key}' failed: {err:#}");
            None
        }
    }
}

fn save_via(id: &str, store: Option<&Arc<dyn DataStore>>, key: &str, value: Value) -> bool {
    let Some(store) = store else {
        warn!("widget {id}: save '{key}' with no data store attached");
        return false;
    };
    match store.set(id, key, value) {
        Ok(persisted) => persisted,
        Err(err) => {
            warn!("widget {id}: save '{key}' failed: {err:#}");
            false
        }
    }
}

fn publish_via(bus: &EventBus, id: &str, name: &str, data: Value) {
    let event = WidgetEventData {
        source_widget: id.to_string(),
        name: name.to_string(),
        data,
    };
    bus.publish(name, &event);
    bus.publish(events::WIDGET_EVENT, &event);
}
