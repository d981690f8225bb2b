//! Serialized layout document.
//!
//! The wire shape uses camelCase keys:
//!
//! ```json
//! {
//!   "gridSize": { "columns": 12, "rows": 12 },
//!   "cells": [
//!     { "id": "...", "position": {"x": 0, "y": 0},
//!       "size": {"width": 2, "height": 2},
//!       "contentType": "widget",
//!       "contentMetadata": { "widget_id": "...", "kind": "counter" } }
//!   ]
//! }
//! ```
//!
//! Empty cells carry `"contentType": null` and `"contentMetadata": null`;
//! parsing also accepts records that omit the keys.
//!
//! Layout captures structure only. Widget internals live in the data
//! store, keyed by widget id, and survive independently of layout saves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cell::{Cell, CellContent};
use super::space::{CellPos, CellSize, GridSize};
use super::widget::Widget;

/// Content discriminator in a cell record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Widget,
    Cells,
}

/// One recorded cell. Nested cells recurse through `content_metadata` as
/// an array of records.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellLayout {
    pub id: String,
    pub position: CellPos,
    pub size: CellSize,
    #[serde(default)]
    pub content_type: Option<ContentKind>,
    #[serde(default)]
    pub content_metadata: Option<Value>,
}

/// Whole-grid layout document, the unit of serialization
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    pub grid_size: GridSize,
    pub cells: Vec<CellLayout>,
}

impl GridLayout {
    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("failed to serialize layout: {}", e))
    }

    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).map_err(|e| anyhow::anyhow!("failed to parse layout: {}", e))
    }
}

impl CellLayout {
    /// Record one live cell, recursing into nested content
    pub fn from_cell(cell: &Cell) -> Self {
        let (content_type, content_metadata) = match cell.content() {
            CellContent::Empty => (None, None),
            CellContent::Widget(widget) => {
                (Some(ContentKind::Widget), Some(widget.layout_metadata()))
            }
            CellContent::Cells(children) => {
                let records: Vec<Value> = children
                    .iter()
                    .map(|child| {
                        serde_json::to_value(Self::from_cell(child)).unwrap_or(Value::Null)
                    })
                    .collect();
                (Some(ContentKind::Cells), Some(Value::Array(records)))
            }
        };
        Self {
            id: cell.id().to_string(),
            position: cell.position(),
            size: cell.size(),
            content_type,
            content_metadata,
        }
    }
}

/// Rebuild a cell (and its nested content) from a record. Widget slots go
/// through the host-supplied factory; the layout layer knows nothing about
/// concrete widget types.
pub fn cell_from_layout<F>(record: &CellLayout, factory: &mut F) -> anyhow::Result<Cell>
where
    F: FnMut(&Value) -> anyhow::Result<Widget>,
{
    let mut cell = Cell::with_id(record.id.clone());
    cell.set_grid_size(record.size.width, record.size.height);
    cell.set_grid_position(record.position.x, record.position.y);

    match record.content_type {
        None => {}
        Some(ContentKind::Widget) => {
            let meta = record.content_metadata.clone().unwrap_or(Value::Null);
            let widget = factory(&meta).map_err(|e| {
                anyhow::anyhow!("widget factory failed for cell {}: {:#}", record.id, e)
            })?;
            cell.set_widget(widget);
        }
        Some(ContentKind::Cells) => {
            let meta = record
                .content_metadata
                .clone()
                .unwrap_or(Value::Array(Vec::new()));
            let child_records: Vec<CellLayout> = serde_json::from_value(meta).map_err(|e| {
                anyhow::anyhow!("cell {}: invalid nested cell records: {}", record.id, e)
            })?;
            let mut children = Vec::with_capacity(child_records.len());
            for child in &child_records {
                children.push(cell_from_layout(child, factory)?);
            }
            cell.set_cells(children);
        }
    }
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::widget::WidgetBehavior;
    use serde_json::json;
    use std::any::Any;

    struct Stub {
        label: String,
    }

    impl WidgetBehavior for Stub {
        fn kind(&self) -> &str {
            "stub"
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

    fn stub_widget(id: &str) -> Widget {
        Widget::new(
            id,
            Box::new(Stub {
                label: format!("label-{id}"),
            }),
        )
    }

    fn stub_factory(meta: &Value) -> anyhow::Result<Widget> {
        let id = meta
            .get("widget_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("record missing widget_id"))?;
        Ok(stub_widget(id))
    }

    #[test]
    fn test_record_wire_shape() {
        let mut cell = Cell::with_id("c1");
        cell.set_grid_position(1, 2);
        cell.set_grid_size(2, 2);
        cell.set_widget(stub_widget("w1"));

        let layout = GridLayout {
            grid_size: GridSize::new(12, 8),
            cells: vec![CellLayout::from_cell(&cell)],
        };
        let value = serde_json::to_value(&layout).unwrap();

        assert_eq!(value["gridSize"], json!({"columns": 12, "rows": 8}));
        let record = &value["cells"][0];
        assert_eq!(record["id"], json!("c1"));
        assert_eq!(record["position"], json!({"x": 1, "y": 2}));
        assert_eq!(record["size"], json!({"width": 2, "height": 2}));
        assert_eq!(record["contentType"], json!("widget"));
        assert_eq!(record["contentMetadata"]["widget_id"], json!("w1"));
        assert_eq!(record["contentMetadata"]["kind"], json!("stub"));
        assert_eq!(record["contentMetadata"]["label"], json!("label-w1"));
    }

    #[test]
    fn test_empty_cell_serializes_explicit_nulls() {
        let cell = Cell::with_id("c1");
        let value = serde_json::to_value(CellLayout::from_cell(&cell)).unwrap();
        assert_eq!(value.get("contentType"), Some(&json!(null)));
        assert_eq!(value.get("contentMetadata"), Some(&json!(null)));

        // records that omit the keys entirely still parse
        let record: CellLayout = serde_json::from_value(json!({
            "id": "c1",
            "position": {"x": 0, "y": 0},
            "size": {"width": 1, "height": 1}
        }))
        .unwrap();
        assert!(record.content_type.is_none());
        assert!(record.content_metadata.is_none());
    }

    #[test]
    fn test_nested_cells_roundtrip() {
        let mut inner = Cell::with_id("inner");
        inner.set_grid_size(1, 1);
        inner.set_widget(stub_widget("w1"));

        let mut outer = Cell::with_id("outer");
        outer.set_grid_position(3, 3);
        outer.set_grid_size(4, 4);
        outer.set_cells(vec![inner]);

        let record = CellLayout::from_cell(&outer);
        let rebuilt = cell_from_layout(&record, &mut stub_factory).unwrap();

        assert_eq!(rebuilt.id(), "outer");
        assert_eq!(rebuilt.position(), CellPos::new(3, 3));
        assert_eq!(rebuilt.content_kind(), "cells");
        let children = rebuilt.cells().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id(), "inner");
        assert_eq!(children[0].widget().unwrap().id(), "w1");
        assert_eq!(children[0].parent_cell(), Some("outer"));
    }

    #[test]
    fn test_factory_failure_propagates() {
        let record = CellLayout {
            id: "c1".to_string(),
            position: CellPos::new(0, 0),
            size: CellSize::new(1, 1),
            content_type: Some(ContentKind::Widget),
            content_metadata: Some(json!({})),
        };
        let err = cell_from_layout(&record, &mut stub_factory).unwrap_err();
        assert!(err.to_string().contains("widget factory failed"));
    }

    #[test]
    fn test_invalid_nested_records_rejected() {
        let record = CellLayout {
            id: "c1".to_string(),
            position: CellPos::new(0, 0),
            size: CellSize::new(1, 1),
            content_type: Some(ContentKind::Cells),
            content_metadata: Some(json!("not an array")),
        };
        let err = cell_from_layout(&record, &mut stub_factory).unwrap_err();
        assert!(err.to_string().contains("invalid nested cell records"));
    }

    #[test]
    fn test_layout_json_string_roundtrip() {
        let layout = GridLayout {
            grid_size: GridSize::new(6, 6),
            cells: vec![CellLayout {
                id: "c1".to_string(),
                position: CellPos::new(0, 0),
                size: CellSize::new(2, 1),
                content_type: None,
                content_metadata: None,
            }],
        };
        let text = layout.to_json_string().unwrap();
        let parsed = GridLayout::from_json_str(&text).unwrap();
        assert_eq!(parsed.grid_size, GridSize::new(6, 6));
        assert_eq!(parsed.cells.len(), 1);
        assert_eq!(parsed.cells[0].id, "c1");
    }
}
