//! Counter widget: the smallest useful stateful behavior.
//!
//! Keeps a single integer, restores it from the data store on initialize,
//! persists every change, and publishes `counter-changed` so containers
//! can observe activity without touching the widget.

use std::any::Any;

use log::debug;
use serde_json::{Value, json};

use crate::entities::loader::ModuleHandle;
use crate::entities::widget::{WidgetBehavior, WidgetCtx};

pub const COUNTER_CHANGED: &str = "counter-changed";

pub struct CounterWidget {
    label: String,
    count: i64,
    last_resize: Option<(f32, f32)>,
}

impl CounterWidget {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: 0,
            last_resize: None,
        }
    }

    /// Registry factory: the verified module source is a JSON config,
    /// `{"label": "..."}`.
    pub fn from_module(module: &ModuleHandle) -> anyhow::Result<Box<dyn WidgetBehavior>> {
        let source = module.source().unwrap_or("");
        let config: Value = if source.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(source)
                .map_err(|e| anyhow::anyhow!("counter config is not valid JSON: {}", e))?
        };
        let label = config
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or("Counter")
            .to_string();
        Ok(Box::new(Self::new(label)))
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn last_resize(&self) -> Option<(f32, f32)> {
        self.last_resize
    }

    /// Bump the counter, persist the new value, announce the change
    pub fn increment(&mut self, ctx: &WidgetCtx<'_>) {
        self.count += 1;
        ctx.save_data("count", json!(self.count));
        ctx.publish_event(COUNTER_CHANGED, json!({ "count": self.count }));
    }
}

impl WidgetBehavior for CounterWidget {
    fn kind(&self) -> &str {
        "counter"
    }

    fn on_data_store_ready(&mut self, ctx: &WidgetCtx<'_>) -> anyhow::Result<()> {
        self.count = ctx
            .load_data("count")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        debug!("counter '{}': restored count {}", self.label, self.count);
        Ok(())
    }

    fn on_resize(&mut self, width_px: f32, height_px: f32) {
        self.last_resize = Some((width_px, height_px));
    }

    fn save_metadata(&self) -> Value {
        json!({ "label": self.label })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
