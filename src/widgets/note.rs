//! Note widget: a persisted free-text body.

use std::any::Any;

use log::debug;
use serde_json::{Value, json};

use crate::entities::loader::ModuleHandle;
use crate::entities::widget::{WidgetBehavior, WidgetCtx};

pub const NOTE_CHANGED: &str = "note-changed";

pub struct NoteWidget {
    title: String,
    body: String,
}

impl NoteWidget {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: String::new(),
        }
    }

    /// Registry factory: the verified module source is a JSON config,
    /// `{"title": "...", "body": "..."}` with both keys optional.
    pub fn from_module(module: &ModuleHandle) -> anyhow::Result<Box<dyn WidgetBehavior>> {
        let source = module.source().unwrap_or("");
        let config: Value = if source.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(source)
                .map_err(|e| anyhow::anyhow!("note config is not valid JSON: {}", e))?
        };
        let mut note = Self::new(
            config
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Note"),
        );
        if let Some(body) = config.get("body").and_then(Value::as_str) {
            note.body = body.to_string();
        }
        Ok(Box::new(note))
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replace the body, persist it, announce the change
    pub fn set_body(&mut self, ctx: &WidgetCtx<'_>, body: impl Into<String>) {
        self.body = body.into();
        ctx.save_data("body", json!(self.body));
        ctx.publish_event(NOTE_CHANGED, json!({ "length": self.body.len() }));
    }
}

impl WidgetBehavior for NoteWidget {
    fn kind(&self) -> &str {
        "note"
    }

    fn on_data_store_ready(&mut self, ctx: &WidgetCtx<'_>) -> anyhow::Result<()> {
        if let Some(body) = ctx.load_data("body").and_then(|v| {
            v.as_str().map(str::to_string)
        }) {
            self.body = body;
        }
        debug!(
            "note '{}': restored body ({} bytes)",
            self.title,
            self.body.len()
        );
        Ok(())
    }

    fn save_metadata(&self) -> Value {
        json!({ "title": self.title, "body": self.body })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
