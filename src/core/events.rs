//! Composition event names and payloads.
//!
//! Names are the cross-boundary channels the framework publishes on,
//! collected here as constants to avoid stringly-typed typos. Payloads are
//! plain serializable data; provenance travels as id strings, never as
//! live object references.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::space::{CellPos, CellSize};

// ===== Channel names =====

/// Uniform channel a widget publishes on alongside its domain event name
pub const WIDGET_EVENT: &str = "widget-event";
/// Relayed widget event carrying cell provenance; bubbles cell to cell to grid
pub const CELL_EVENT: &str = "cell-event";
/// A cell's content slot changed state (widget / cells / empty)
pub const CELL_CONTENT_CHANGED: &str = "cell-content-changed";
/// The grid stored a new cell
pub const GRID_CELL_ADDED: &str = "grid-cell-added";
/// The grid removed a cell
pub const GRID_CELL_REMOVED: &str = "grid-cell-removed";
/// The grid dimensions changed
pub const GRID_SIZE_CHANGED: &str = "grid-size-changed";

// ===== Payloads =====

/// Event a widget emits on its own bus, published under both the domain
/// name and [`WIDGET_EVENT`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WidgetEventData {
    /// Id of the widget that published the event
    pub source_widget: String,
    /// Domain event name as given to `publish_event`
    pub name: String,
    /// Arbitrary plain-data payload
    pub data: Value,
}

/// Relay envelope observed as [`CELL_EVENT`].
///
/// `path` lists every relaying cell id, originating cell first;
/// `source_cell` is the most recent relay, the cell whose bus carried this
/// instance of the event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellEventData {
    pub source_cell: String,
    pub source_widget: String,
    pub path: Vec<String>,
    pub name: String,
    pub data: Value,
}

/// Payload of [`CELL_CONTENT_CHANGED`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentChangedData {
    pub cell: String,
    /// New content kind: "widget", "cells" or "empty"
    pub kind: String,
}

/// Payload of [`GRID_CELL_ADDED`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellAddedData {
    pub cell: String,
    pub position: CellPos,
    pub size: CellSize,
}

/// Payload of [`GRID_CELL_REMOVED`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellRemovedData {
    pub cell: String,
}

/// Payload of [`GRID_SIZE_CHANGED`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridSizeData {
    pub columns: u32,
    pub rows: u32,
}
