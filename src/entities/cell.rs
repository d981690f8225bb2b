//! Cell: the containment unit.
//!
//! A cell holds exactly one of widget, child cells, or nothing, and relays
//! the content's events upward with provenance. Layout flows down: the
//! grid assigns grid-unit coordinates, the cell translates them to pixels
//! before notifying content. Events flow up: relay taps installed on the
//! content's bus republish on the cell's own bus, so observers never need
//! a reference to the inner component.

use glam::Vec2;
use log::{debug, warn};
use uuid::Uuid;

use crate::core::event_bus::{EventBus, Subscription};
use crate::core::events::{self, CellEventData, ContentChangedData, WidgetEventData};

use super::space::{CellMetrics, CellPos, CellRect, CellSize};
use super::widget::Widget;

/// Refusal to hold a widget and child cells at the same time.
///
/// This is a structural programming error; the slot is exclusive, so the
/// request is rejected synchronously instead of being coerced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainmentError {
    /// Cell that refused the assignment
    pub cell: String,
}

impl std::fmt::Display for ContainmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cell {}: widget and child cells are mutually exclusive",
            self.cell
        )
    }
}

impl std::error::Error for ContainmentError {}

/// Exclusive content slot of a cell
#[derive(Debug, Default)]
pub enum CellContent {
    /// Nothing attached
    #[default]
    Empty,
    /// A single leaf widget
    Widget(Widget),
    /// Nested child cells
    Cells(Vec<Cell>),
}

impl CellContent {
    /// Wire vocabulary for the content state: "widget", "cells" or "empty"
    pub fn kind_str(&self) -> &'static str {
        match self {
            CellContent::Empty => "empty",
            CellContent::Widget(_) => "widget",
            CellContent::Cells(_) => "cells",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Empty)
    }
}

/// Containment unit: grid coordinates plus the exclusive content slot.
///
/// Content transitions always pass through detachment: the outgoing
/// content is untapped and disposed before anything new is attached, so a
/// replaced subtree can never keep publishing into the cell.
pub struct Cell {
    id: String,
    parent_cell: Option<String>,
    position: CellPos,
    size: CellSize,
    metrics: CellMetrics,
    content: CellContent,
    bus: EventBus,
    relay_subs: Vec<Subscription>,
}

impl Cell {
    /// New empty 1x1 cell with a generated id
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// New empty cell with a caller-supplied id (layout rehydration)
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let bus = EventBus::new(format!("cell:{id}"));
        Self {
            id,
            parent_cell: None,
            position: CellPos::default(),
            size: CellSize::default(),
            metrics: CellMetrics::default(),
            content: CellContent::Empty,
            bus,
            relay_subs: Vec::new(),
        }
    }

    /// Construction path that accepts either content kind. Passing both at
    /// once is refused with [`ContainmentError`].
    pub fn with_content(
        id: impl Into<String>,
        widget: Option<Widget>,
        cells: Option<Vec<Cell>>,
    ) -> Result<Self, ContainmentError> {
        let mut cell = Self::with_id(id);
        match (widget, cells) {
            (Some(_), Some(_)) => {
                return Err(ContainmentError { cell: cell.id });
            }
            (Some(widget), None) => cell.set_widget(widget),
            (None, Some(children)) => cell.set_cells(children),
            (None, None) => {}
        }
        Ok(cell)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the enclosing cell, if nested
    pub fn parent_cell(&self) -> Option<&str> {
        self.parent_cell.as_deref()
    }

    pub(crate) fn set_parent_cell(&mut self, parent: Option<String>) {
        self.parent_cell = parent;
    }

    pub fn position(&self) -> CellPos {
        self.position
    }

    pub fn size(&self) -> CellSize {
        self.size
    }

    /// Occupied rectangle in grid units
    pub fn rect(&self) -> CellRect {
        CellRect::new(
            self.position.x,
            self.position.y,
            self.size.width,
            self.size.height,
        )
    }

    pub fn metrics(&self) -> CellMetrics {
        self.metrics
    }

    /// This cell's namespaced bus (`cell:<id>`)
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// Wire vocabulary for the current content state
    pub fn content_kind(&self) -> &'static str {
        self.content.kind_str()
    }

    pub fn widget(&self) -> Option<&Widget> {
        match &self.content {
            CellContent::Widget(widget) => Some(widget),
            _ => None,
        }
    }

    pub fn widget_mut(&mut self) -> Option<&mut Widget> {
        match &mut self.content {
            CellContent::Widget(widget) => Some(widget),
            _ => None,
        }
    }

    pub fn cells(&self) -> Option<&[Cell]> {
        match &self.content {
            CellContent::Cells(children) => Some(children),
            _ => None,
        }
    }

    /// Mutable access to the child cells. Handed out as a slice: children
    /// are added or removed only through `set_cells`, which wires the
    /// relay taps.
    pub fn cells_mut(&mut self) -> Option<&mut [Cell]> {
        match &mut self.content {
            CellContent::Cells(children) => Some(children),
            _ => None,
        }
    }

    // ===== Content transitions =====

    /// Attach a widget, detaching and disposing whatever was there first
    pub fn set_widget(&mut self, mut widget: Widget) {
        self.detach_content();

        widget.set_parent_cell(Some(self.id.clone()));
        let bus = self.bus.clone();
        let cell_id = self.id.clone();
        let sub = widget
            .bus()
            .subscribe::<WidgetEventData, _>(events::WIDGET_EVENT, move |event| {
                let relayed = CellEventData {
                    source_cell: cell_id.clone(),
                    source_widget: event.source_widget.clone(),
                    path: vec![cell_id.clone()],
                    name: event.name.clone(),
                    data: event.data.clone(),
                };
                bus.publish(events::CELL_EVENT, &relayed);
                Ok(())
            });
        self.relay_subs.push(sub);
        self.content = CellContent::Widget(widget);

        self.notify_content_resize();
        self.emit_content_changed();
        debug!("cell {}: widget attached", self.id);
    }

    /// Attach child cells, detaching and disposing whatever was there first
    pub fn set_cells(&mut self, cells: Vec<Cell>) {
        self.detach_content();

        let mut children = cells;
        for child in &mut children {
            child.set_parent_cell(Some(self.id.clone()));
            child.set_metrics(self.metrics);

            let bus = self.bus.clone();
            let cell_id = self.id.clone();
            let sub = child
                .bus()
                .subscribe::<CellEventData, _>(events::CELL_EVENT, move |event| {
                    // never relay an event this cell itself originated
                    if event.source_cell == cell_id {
                        return Ok(());
                    }
                    let mut relayed = event.clone();
                    relayed.path.push(cell_id.clone());
                    relayed.source_cell = cell_id.clone();
                    bus.publish(events::CELL_EVENT, &relayed);
                    Ok(())
                });
            self.relay_subs.push(sub);
        }
        let count = children.len();
        self.content = CellContent::Cells(children);

        self.emit_content_changed();
        debug!("cell {}: {} child cells attached", self.id, count);
    }

    /// Transition to empty: untap, clear back-references, dispose the
    /// outgoing content, announce the change. No-op when already empty.
    pub fn clear_content(&mut self) {
        if self.content.is_empty() {
            return;
        }
        self.detach_content();
        self.emit_content_changed();
        debug!("cell {}: content cleared", self.id);
    }

    /// Tear down this cell's content. Idempotent; same contract as
    /// [`Cell::clear_content`], the cell itself stays reusable.
    pub fn dispose(&mut self) {
        self.clear_content();
    }

    /// Untap and dispose the current content without emitting
    fn detach_content(&mut self) {
        for sub in self.relay_subs.drain(..) {
            sub.cancel();
        }
        match std::mem::take(&mut self.content) {
            CellContent::Empty => {}
            CellContent::Widget(mut widget) => {
                widget.set_parent_cell(None);
                widget.dispose();
            }
            CellContent::Cells(mut children) => {
                for child in &mut children {
                    child.set_parent_cell(None);
                    child.dispose();
                }
            }
        }
    }

    // ===== Layout =====

    /// Update the grid-unit position. Content is re-notified of its pixel
    /// size on every coordinate change, even when the span is unchanged.
    pub fn set_grid_position(&mut self, x: u32, y: u32) {
        self.position = CellPos::new(x, y);
        self.notify_content_resize();
    }

    /// Update the grid-unit span and forward the new pixel dimensions to
    /// content. Zero spans are clamped to 1.
    pub fn set_grid_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            warn!(
                "cell {}: zero span {}x{} clamped to 1x1 minimum",
                self.id, width, height
            );
        }
        self.size = CellSize::new(width.max(1), height.max(1));
        self.notify_content_resize();
    }

    /// Install the unit-to-pixel mapping and push it down the subtree
    pub fn set_metrics(&mut self, metrics: CellMetrics) {
        self.metrics = metrics;
        if let CellContent::Cells(children) = &mut self.content {
            for child in children {
                child.set_metrics(metrics);
            }
        }
        self.notify_content_resize();
    }

    /// Pixel dimensions of the content area for the current span
    pub fn content_px(&self) -> Vec2 {
        self.metrics.content_px(self.size)
    }

    /// The unit-to-pixel translation happens here, on the way into
    /// `on_resize`.
    fn notify_content_resize(&mut self) {
        let px = self.metrics.content_px(self.size);
        if let CellContent::Widget(widget) = &mut self.content {
            widget.on_resize(px.x, px.y);
        }
    }

    fn emit_content_changed(&self) {
        let payload = ContentChangedData {
            cell: self.id.clone(),
            kind: self.content.kind_str().to_string(),
        };
        self.bus.publish(events::CELL_CONTENT_CHANGED, &payload);
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("size", &self.size)
            .field("content", &self.content.kind_str())
            .finish()
    }
}
