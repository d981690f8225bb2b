//! Grid: the root layout authority.
//!
//! Owns a rectangular grid-unit coordinate space and the cells placed in
//! it, relays the cells' bubbling events onto its own bus, and drives
//! drag/resize as an explicit state machine so the whole interaction is
//! testable without a real pointer.

use glam::Vec2;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::config;
use crate::core::event_bus::{EventBus, Subscription};
use crate::core::events::{self, CellAddedData, CellEventData, CellRemovedData, GridSizeData};

use super::cell::Cell;
use super::layout::{CellLayout, GridLayout, cell_from_layout};
use super::space::{CellMetrics, CellPos, CellRect, CellSize, GridSize};
use super::widget::Widget;

/// Placement refusal from the checked [`Grid::place_cell`] path.
///
/// Both variants are recoverable: the caller still owns nothing stale and
/// can re-query [`Grid::find_free_position`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridError {
    /// Target region intersects an existing cell
    Occupancy { region: CellRect },
    /// Target region does not fit inside the grid
    OutOfBounds { region: CellRect, grid: GridSize },
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::Occupancy { region } => write!(
                f,
                "region {} span {} is occupied",
                region.position(),
                region.size()
            ),
            GridError::OutOfBounds { region, grid } => write!(
                f,
                "region {} span {} exceeds the {}x{} grid",
                region.position(),
                region.size(),
                grid.columns,
                grid.rows
            ),
        }
    }
}

impl std::error::Error for GridError {}

/// Drag/resize interaction states. All transient pointer bookkeeping
/// lives in the active variant; Idle carries nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum Interaction {
    Idle,
    /// Pointer held down on a cell's drag handle
    Dragging {
        cell: String,
        origin: CellPos,
        pointer_origin: Vec2,
        size: CellSize,
    },
    /// Pointer held down on a cell's resize handle
    Resizing {
        cell: String,
        origin_size: CellSize,
        pointer_origin: Vec2,
        position: CellPos,
    },
}

impl Interaction {
    pub fn is_idle(&self) -> bool {
        matches!(self, Interaction::Idle)
    }

    fn cell(&self) -> Option<&str> {
        match self {
            Interaction::Idle => None,
            Interaction::Dragging { cell, .. } | Interaction::Resizing { cell, .. } => {
                Some(cell.as_str())
            }
        }
    }
}

/// Root layout container: cell map, occupancy queries, interaction state
/// machine, layout persistence.
pub struct Grid {
    id: String,
    size: GridSize,
    metrics: CellMetrics,
    cells: IndexMap<String, Cell>,
    relay_subs: IndexMap<String, Subscription>,
    interaction: Interaction,
    placeholder: Option<CellRect>,
    bus: EventBus,
    disposed: bool,
}

impl Grid {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self::with_metrics(columns, rows, CellMetrics::default())
    }

    pub fn with_metrics(columns: u32, rows: u32, metrics: CellMetrics) -> Self {
        let id = Uuid::new_v4().to_string();
        let bus = EventBus::new(format!("grid:{id}"));
        Self {
            id,
            size: GridSize::new(columns.max(1), rows.max(1)),
            metrics,
            cells: IndexMap::new(),
            relay_subs: IndexMap::new(),
            interaction: Interaction::Idle,
            placeholder: None,
            bus,
            disposed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn metrics(&self) -> CellMetrics {
        self.metrics
    }

    /// This grid's namespaced bus (`grid:<id>`)
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, cell_id: &str) -> Option<&Cell> {
        self.cells.get(cell_id)
    }

    pub fn cell_mut(&mut self, cell_id: &str) -> Option<&mut Cell> {
        self.cells.get_mut(cell_id)
    }

    /// Cells in insertion order
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn cell_ids(&self) -> Vec<String> {
        self.cells.keys().cloned().collect()
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Tentative rectangle shown while a drag or resize is running
    pub fn placeholder(&self) -> Option<CellRect> {
        self.placeholder
    }

    // ===== Placement =====

    /// Store `cell` at the given position and span, wire its event relay,
    /// and announce it.
    ///
    /// Does not re-validate overlap: callers are expected to have consulted
    /// [`Grid::is_position_occupied`] or [`Grid::find_free_position`]
    /// first. [`Grid::place_cell`] is the checked variant.
    pub fn add_cell(&mut self, mut cell: Cell, x: u32, y: u32, width: u32, height: u32) {
        cell.set_metrics(self.metrics);
        cell.set_grid_size(width, height);
        cell.set_grid_position(x, y);
        let cell_id = cell.id().to_string();

        // relay the cell's bubbling events verbatim; the grid adds no
        // provenance hop of its own
        let bus = self.bus.clone();
        let sub = cell
            .bus()
            .subscribe::<CellEventData, _>(events::CELL_EVENT, move |event| {
                bus.publish(events::CELL_EVENT, event);
                Ok(())
            });
        self.relay_subs.insert(cell_id.clone(), sub);
        self.cells.insert(cell_id.clone(), cell);

        self.bus.publish(
            events::GRID_CELL_ADDED,
            &CellAddedData {
                cell: cell_id.clone(),
                position: CellPos::new(x, y),
                size: CellSize::new(width, height),
            },
        );
        debug!(
            "grid {}: cell {} added at ({}, {}) span {}x{}",
            self.id, cell_id, x, y, width, height
        );
    }

    /// Checked placement: refuses regions that leave the grid or intersect
    /// an existing cell.
    pub fn place_cell(
        &mut self,
        cell: Cell,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), GridError> {
        let region = CellRect::new(x, y, width, height);
        if !region.fits_in(self.size) {
            return Err(GridError::OutOfBounds {
                region,
                grid: self.size,
            });
        }
        if self.is_position_occupied(x, y, width, height, None) {
            return Err(GridError::Occupancy { region });
        }
        self.add_cell(cell, x, y, width, height);
        Ok(())
    }

    /// Remove and return a cell. The cell comes back un-disposed so the
    /// caller can re-add it or tear it down.
    pub fn remove_cell(&mut self, cell_id: &str) -> Option<Cell> {
        if let Some(sub) = self.relay_subs.shift_remove(cell_id) {
            sub.cancel();
        }
        let cell = self.cells.shift_remove(cell_id)?;

        // an interaction pinned to the removed cell can no longer commit
        if self.interaction.cell() == Some(cell_id) {
            self.reset_interaction();
        }

        self.bus.publish(
            events::GRID_CELL_REMOVED,
            &CellRemovedData {
                cell: cell_id.to_string(),
            },
        );
        debug!("grid {}: cell {} removed", self.id, cell_id);
        Some(cell)
    }

    // ===== Occupancy =====

    /// Strict axis-aligned overlap against every cell except `exclude`
    pub fn is_position_occupied(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        exclude: Option<&str>,
    ) -> bool {
        let probe = CellRect::new(x, y, width, height);
        self.cells.iter().any(|(id, cell)| {
            if exclude == Some(id.as_str()) {
                return false;
            }
            probe.intersects(&cell.rect())
        })
    }

    /// First free origin in row-major order (`y` outer, `x` inner), or
    /// None when no region of that span is free.
    ///
    /// The scan order is contractual: callers rely on the exact first
    /// match for reproducible auto-placement.
    pub fn find_free_position(&self, width: u32, height: u32) -> Option<CellPos> {
        if width == 0 || height == 0 || width > self.size.columns || height > self.size.rows {
            return None;
        }
        for y in 0..=(self.size.rows - height) {
            for x in 0..=(self.size.columns - width) {
                if !self.is_position_occupied(x, y, width, height, None) {
                    return Some(CellPos::new(x, y));
                }
            }
        }
        None
    }

    // ===== Grid geometry =====

    /// Change the grid dimensions. Existing cells keep their coordinates;
    /// cells that no longer fit are logged, not moved.
    pub fn set_grid_size(&mut self, columns: u32, rows: u32) {
        self.size = GridSize::new(columns.max(1), rows.max(1));
        for (id, cell) in &self.cells {
            if !cell.rect().fits_in(self.size) {
                warn!(
                    "grid {}: cell {} at {} span {} is out of bounds after resize",
                    self.id,
                    id,
                    cell.position(),
                    cell.size()
                );
            }
        }
        self.bus.publish(
            events::GRID_SIZE_CHANGED,
            &GridSizeData {
                columns: self.size.columns,
                rows: self.size.rows,
            },
        );
        debug!(
            "grid {}: size set to {}x{}",
            self.id, self.size.columns, self.size.rows
        );
    }

    /// Install a new unit-to-pixel mapping and push it to every cell
    pub fn set_metrics(&mut self, metrics: CellMetrics) {
        self.metrics = metrics;
        for cell in self.cells.values_mut() {
            cell.set_metrics(metrics);
        }
    }

    // ===== Drag / resize state machine =====

    /// Idle to Dragging. Captures the cell's position and the pointer-down
    /// coordinates; refused (false) for unknown cells or when another
    /// interaction is already running.
    pub fn begin_drag(&mut self, cell_id: &str, pointer: Vec2) -> bool {
        if !self.interaction.is_idle() {
            warn!(
                "grid {}: begin_drag '{}' while {:?}",
                self.id, cell_id, self.interaction
            );
            return false;
        }
        let Some(cell) = self.cells.get(cell_id) else {
            warn!("grid {}: begin_drag on unknown cell '{}'", self.id, cell_id);
            return false;
        };
        self.interaction = Interaction::Dragging {
            cell: cell_id.to_string(),
            origin: cell.position(),
            pointer_origin: pointer,
            size: cell.size(),
        };
        self.placeholder = Some(cell.rect());
        debug!("grid {}: dragging cell {}", self.id, cell_id);
        true
    }

    /// Idle to Resizing, same contract as [`Grid::begin_drag`]
    pub fn begin_resize(&mut self, cell_id: &str, pointer: Vec2) -> bool {
        if !self.interaction.is_idle() {
            warn!(
                "grid {}: begin_resize '{}' while {:?}",
                self.id, cell_id, self.interaction
            );
            return false;
        }
        let Some(cell) = self.cells.get(cell_id) else {
            warn!(
                "grid {}: begin_resize on unknown cell '{}'",
                self.id, cell_id
            );
            return false;
        };
        self.interaction = Interaction::Resizing {
            cell: cell_id.to_string(),
            origin_size: cell.size(),
            pointer_origin: pointer,
            position: cell.position(),
        };
        self.placeholder = Some(cell.rect());
        debug!("grid {}: resizing cell {}", self.id, cell_id);
        true
    }

    /// Recompute the tentative rectangle while an interaction is running.
    /// No-op in Idle.
    pub fn pointer_moved(&mut self, pointer: Vec2) {
        match &self.interaction {
            Interaction::Idle => {}
            Interaction::Dragging {
                origin,
                pointer_origin,
                size,
                ..
            } => {
                let target = self.drag_target(*origin, *size, *pointer_origin, pointer);
                self.placeholder = Some(CellRect::new(target.x, target.y, size.width, size.height));
            }
            Interaction::Resizing {
                origin_size,
                pointer_origin,
                position,
                ..
            } => {
                let target = self.resize_target(*position, *origin_size, *pointer_origin, pointer);
                self.placeholder =
                    Some(CellRect::new(position.x, position.y, target.width, target.height));
            }
        }
    }

    /// Commit the running interaction: convert the pointer delta to grid
    /// units, clamp to the grid, apply to the cell, return to Idle. The
    /// placeholder is removed unconditionally.
    pub fn pointer_released(&mut self, pointer: Vec2) {
        match std::mem::replace(&mut self.interaction, Interaction::Idle) {
            Interaction::Idle => {}
            Interaction::Dragging {
                cell,
                origin,
                pointer_origin,
                size,
            } => {
                let target = self.drag_target(origin, size, pointer_origin, pointer);
                if let Some(c) = self.cells.get_mut(&cell) {
                    c.set_grid_position(target.x, target.y);
                    debug!(
                        "grid {}: cell {} dragged {} -> {}",
                        self.id, cell, origin, target
                    );
                }
            }
            Interaction::Resizing {
                cell,
                origin_size,
                pointer_origin,
                position,
            } => {
                let target = self.resize_target(position, origin_size, pointer_origin, pointer);
                if let Some(c) = self.cells.get_mut(&cell) {
                    c.set_grid_size(target.width, target.height);
                    debug!(
                        "grid {}: cell {} resized {} -> {}",
                        self.id, cell, origin_size, target
                    );
                }
            }
        }
        self.placeholder = None;
    }

    /// Abnormal termination: back to Idle without committing anything.
    /// The placeholder is removed here too.
    pub fn cancel_interaction(&mut self) {
        if !self.interaction.is_idle() {
            debug!("grid {}: interaction cancelled", self.id);
        }
        self.reset_interaction();
    }

    fn reset_interaction(&mut self) {
        self.interaction = Interaction::Idle;
        self.placeholder = None;
    }

    /// Pointer delta to clamped target origin for a drag
    fn drag_target(&self, origin: CellPos, size: CellSize, start: Vec2, current: Vec2) -> CellPos {
        let (dx, dy) = self.metrics.units_delta(current - start);
        let max_x = self.size.columns.saturating_sub(size.width) as i64;
        let max_y = self.size.rows.saturating_sub(size.height) as i64;
        CellPos::new(
            (origin.x as i64 + dx).clamp(0, max_x) as u32,
            (origin.y as i64 + dy).clamp(0, max_y) as u32,
        )
    }

    /// Pointer delta to clamped target span for a resize
    fn resize_target(
        &self,
        position: CellPos,
        origin: CellSize,
        start: Vec2,
        current: Vec2,
    ) -> CellSize {
        let (dw, dh) = self.metrics.units_delta(current - start);
        let max_w = (self.size.columns.saturating_sub(position.x) as i64).max(1);
        let max_h = (self.size.rows.saturating_sub(position.y) as i64).max(1);
        CellSize::new(
            (origin.width as i64 + dw).clamp(1, max_w) as u32,
            (origin.height as i64 + dh).clamp(1, max_h) as u32,
        )
    }

    // ===== Layout persistence =====

    /// Record the current structure (positions, spans, content metadata)
    pub fn save_layout(&self) -> GridLayout {
        GridLayout {
            grid_size: self.size,
            cells: self.cells.values().map(CellLayout::from_cell).collect(),
        }
    }

    /// Rebuild the grid from a recorded layout. Existing content is
    /// disposed without events; recreated cells are announced through the
    /// normal add path. Widget slots are filled through `factory`; the
    /// grid knows nothing about concrete widget types.
    pub fn load_layout<F>(&mut self, layout: &GridLayout, mut factory: F) -> anyhow::Result<()>
    where
        F: FnMut(&Value) -> anyhow::Result<Widget>,
    {
        self.clear_cells_silent();
        self.size = GridSize::new(layout.grid_size.columns.max(1), layout.grid_size.rows.max(1));
        for record in &layout.cells {
            let cell = cell_from_layout(record, &mut factory)?;
            self.add_cell(
                cell,
                record.position.x,
                record.position.y,
                record.size.width,
                record.size.height,
            );
        }
        info!(
            "grid {}: layout loaded, {} cells on {}x{}",
            self.id,
            self.cells.len(),
            self.size.columns,
            self.size.rows
        );
        Ok(())
    }

    fn clear_cells_silent(&mut self) {
        for (_, sub) in self.relay_subs.drain(..) {
            sub.cancel();
        }
        for (_, mut cell) in self.cells.drain(..) {
            cell.dispose();
        }
        self.reset_interaction();
    }

    /// Tear down: cancel every relay, dispose every cell, reset the
    /// interaction state. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.clear_cells_silent();
        info!("grid {} disposed", self.id);
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(config::DEFAULT_COLUMNS, config::DEFAULT_ROWS)
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("cells", &self.cells.len())
            .field("interaction", &self.interaction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::widget::{Widget, WidgetBehavior};
    use serde_json::json;
    use std::any::Any;
    use std::sync::{Arc, Mutex};

    struct Stub;

    impl WidgetBehavior for Stub {
        fn kind(&self) -> &str {
            "stub"
        }

        fn save_metadata(&self) -> serde_json::Value {
            json!({ "flavor": "test" })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn stub_widget(id: &str) -> Widget {
        Widget::new(id, Box::new(Stub))
    }

    fn named_cell(id: &str) -> Cell {
        Cell::with_id(id)
    }

    fn px(metrics: CellMetrics, units_x: f32, units_y: f32) -> Vec2 {
        Vec2::new(units_x * metrics.cell_width_px, units_y * metrics.cell_height_px)
    }

    #[test]
    fn test_add_cell_stores_and_announces() {
        let mut grid = Grid::new(12, 12);
        let added = Arc::new(Mutex::new(Vec::new()));
        let added_clone = Arc::clone(&added);
        let sub = grid
            .bus()
            .subscribe::<CellAddedData, _>(events::GRID_CELL_ADDED, move |event| {
                added_clone.lock().unwrap().push(event.clone());
                Ok(())
            });

        grid.add_cell(named_cell("c1"), 1, 2, 3, 2);

        assert_eq!(grid.len(), 1);
        let cell = grid.cell("c1").unwrap();
        assert_eq!(cell.position(), CellPos::new(1, 2));
        assert_eq!(cell.size(), CellSize::new(3, 2));

        let seen = added.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].cell, "c1");
        assert_eq!(seen[0].position, CellPos::new(1, 2));
        assert_eq!(seen[0].size, CellSize::new(3, 2));
        drop(seen);
        sub.cancel();
    }

    #[test]
    fn test_occupancy_example() {
        let mut grid = Grid::new(12, 12);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);

        assert!(grid.is_position_occupied(1, 1, 1, 1, None));
        assert!(!grid.is_position_occupied(2, 2, 1, 1, None));
        assert!(!grid.is_position_occupied(2, 0, 1, 1, None));
    }

    #[test]
    fn test_occupancy_exclude_self() {
        let mut grid = Grid::new(12, 12);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);
        assert!(grid.is_position_occupied(0, 0, 2, 2, None));
        assert!(!grid.is_position_occupied(0, 0, 2, 2, Some("c1")));
    }

    #[test]
    fn test_place_cell_refuses_overlap_and_out_of_bounds() {
        let mut grid = Grid::new(12, 12);
        grid.place_cell(named_cell("c1"), 0, 0, 2, 2).unwrap();

        let err = grid.place_cell(named_cell("c2"), 1, 1, 2, 2).unwrap_err();
        assert!(matches!(err, GridError::Occupancy { .. }));

        let err = grid.place_cell(named_cell("c3"), 11, 0, 2, 1).unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { .. }));

        // refused cells were not stored
        assert_eq!(grid.len(), 1);

        grid.place_cell(named_cell("c4"), 2, 0, 2, 2).unwrap();
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_find_free_position_first_row_major_gap() {
        // on a 4-wide grid both top rows are blocked, the first gap for a
        // 2x2 span is the start of row 2
        let mut grid = Grid::new(4, 6);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);
        grid.add_cell(named_cell("c2"), 2, 0, 2, 2);
        assert_eq!(grid.find_free_position(2, 2), Some(CellPos::new(0, 2)));

        // on a wider grid the same cells leave a gap in row 0 first
        let mut wide = Grid::new(12, 12);
        wide.add_cell(named_cell("c1"), 0, 0, 2, 2);
        wide.add_cell(named_cell("c2"), 2, 0, 2, 2);
        assert_eq!(wide.find_free_position(2, 2), Some(CellPos::new(4, 0)));
    }

    #[test]
    fn test_find_free_position_none_when_full() {
        let mut grid = Grid::new(2, 2);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);
        assert_eq!(grid.find_free_position(1, 1), None);
        // spans larger than the grid never fit
        assert_eq!(grid.find_free_position(3, 1), None);
        assert_eq!(grid.find_free_position(0, 1), None);
    }

    #[test]
    fn test_remove_cell_returns_live_cell() {
        let mut grid = Grid::new(12, 12);
        let mut cell = named_cell("c1");
        cell.set_widget(stub_widget("w1"));
        grid.add_cell(cell, 0, 0, 2, 2);

        let removed = Arc::new(Mutex::new(Vec::new()));
        let removed_clone = Arc::clone(&removed);
        let sub = grid
            .bus()
            .subscribe::<CellRemovedData, _>(events::GRID_CELL_REMOVED, move |event| {
                removed_clone.lock().unwrap().push(event.cell.clone());
                Ok(())
            });

        let cell = grid.remove_cell("c1").unwrap();
        assert_eq!(grid.len(), 0);
        // content survives removal; the caller decides its fate
        assert!(!cell.widget().unwrap().is_disposed());
        assert_eq!(*removed.lock().unwrap(), vec!["c1".to_string()]);
        assert!(grid.remove_cell("c1").is_none());

        // freed region is reusable
        assert!(!grid.is_position_occupied(0, 0, 2, 2, None));
        sub.cancel();
    }

    #[test]
    fn test_removed_cell_stops_relaying() {
        let mut grid = Grid::new(12, 12);
        let mut cell = named_cell("c1");
        cell.set_widget(stub_widget("w1"));
        grid.add_cell(cell, 0, 0, 2, 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sub = grid
            .bus()
            .subscribe::<CellEventData, _>(events::CELL_EVENT, move |event| {
                seen_clone.lock().unwrap().push(event.clone());
                Ok(())
            });

        let removed = grid.remove_cell("c1").unwrap();
        removed.widget().unwrap().publish_event("poked", json!(null));
        assert!(seen.lock().unwrap().is_empty());
        sub.cancel();
    }

    #[test]
    fn test_widget_event_reaches_grid_bus() {
        let mut grid = Grid::new(12, 12);
        let mut cell = named_cell("c1");
        cell.set_widget(stub_widget("w1"));
        grid.add_cell(cell, 0, 0, 2, 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sub = grid
            .bus()
            .subscribe::<CellEventData, _>(events::CELL_EVENT, move |event| {
                seen_clone.lock().unwrap().push(event.clone());
                Ok(())
            });

        grid.cell("c1")
            .unwrap()
            .widget()
            .unwrap()
            .publish_event("poked", json!({"n": 7}));

        let events_seen = seen.lock().unwrap();
        assert_eq!(events_seen.len(), 1);
        assert_eq!(events_seen[0].source_widget, "w1");
        assert_eq!(events_seen[0].source_cell, "c1");
        assert_eq!(events_seen[0].path, vec!["c1".to_string()]);
        drop(events_seen);
        sub.cancel();
    }

    #[test]
    fn test_drag_commit_rounds_and_clamps() {
        let metrics = CellMetrics::square(64.0);
        let mut grid = Grid::with_metrics(12, 12, metrics);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);

        assert!(grid.begin_drag("c1", Vec2::ZERO));
        assert!(!grid.interaction().is_idle());
        assert_eq!(grid.placeholder(), Some(CellRect::new(0, 0, 2, 2)));

        // 2.4 cells right, 1.6 cells down -> rounds to (2, 2)
        grid.pointer_moved(px(metrics, 2.4, 1.6));
        assert_eq!(grid.placeholder(), Some(CellRect::new(2, 2, 2, 2)));

        grid.pointer_released(px(metrics, 2.4, 1.6));
        assert!(grid.interaction().is_idle());
        assert_eq!(grid.placeholder(), None);
        assert_eq!(grid.cell("c1").unwrap().position(), CellPos::new(2, 2));
    }

    #[test]
    fn test_drag_clamps_to_grid_edges() {
        let metrics = CellMetrics::square(64.0);
        let mut grid = Grid::with_metrics(12, 12, metrics);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);

        grid.begin_drag("c1", Vec2::ZERO);
        // way past the right and bottom edges
        grid.pointer_released(px(metrics, 40.0, 40.0));
        assert_eq!(grid.cell("c1").unwrap().position(), CellPos::new(10, 10));

        grid.begin_drag("c1", Vec2::ZERO);
        // way past the origin
        grid.pointer_released(px(metrics, -40.0, -40.0));
        assert_eq!(grid.cell("c1").unwrap().position(), CellPos::new(0, 0));
    }

    #[test]
    fn test_resize_commit_rounds_and_clamps() {
        let metrics = CellMetrics::square(64.0);
        let mut grid = Grid::with_metrics(12, 12, metrics);
        grid.add_cell(named_cell("c1"), 10, 10, 1, 1);

        assert!(grid.begin_resize("c1", Vec2::ZERO));
        // grow by 5x5 cells; only 2x2 fits from (10, 10)
        grid.pointer_released(px(metrics, 5.0, 5.0));
        assert_eq!(grid.cell("c1").unwrap().size(), CellSize::new(2, 2));

        // shrink below 1x1 clamps to the minimum
        grid.begin_resize("c1", Vec2::ZERO);
        grid.pointer_released(px(metrics, -10.0, -10.0));
        assert_eq!(grid.cell("c1").unwrap().size(), CellSize::new(1, 1));
    }

    #[test]
    fn test_interactions_are_exclusive() {
        let mut grid = Grid::new(12, 12);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);
        grid.add_cell(named_cell("c2"), 4, 0, 2, 2);

        assert!(grid.begin_drag("c1", Vec2::ZERO));
        assert!(!grid.begin_drag("c2", Vec2::ZERO));
        assert!(!grid.begin_resize("c2", Vec2::ZERO));
        grid.cancel_interaction();

        assert!(grid.begin_resize("c2", Vec2::ZERO));
        grid.cancel_interaction();
    }

    #[test]
    fn test_begin_drag_unknown_cell_refused() {
        let mut grid = Grid::new(12, 12);
        assert!(!grid.begin_drag("ghost", Vec2::ZERO));
        assert!(grid.interaction().is_idle());
    }

    #[test]
    fn test_cancel_discards_tentative_state() {
        let metrics = CellMetrics::square(64.0);
        let mut grid = Grid::with_metrics(12, 12, metrics);
        grid.add_cell(named_cell("c1"), 3, 3, 2, 2);

        grid.begin_drag("c1", Vec2::ZERO);
        grid.pointer_moved(px(metrics, 4.0, 0.0));
        assert!(grid.placeholder().is_some());

        grid.cancel_interaction();
        assert!(grid.interaction().is_idle());
        assert_eq!(grid.placeholder(), None);
        assert_eq!(grid.cell("c1").unwrap().position(), CellPos::new(3, 3));
    }

    #[test]
    fn test_removing_dragged_cell_resets_interaction() {
        let mut grid = Grid::new(12, 12);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);
        grid.begin_drag("c1", Vec2::ZERO);

        grid.remove_cell("c1");
        assert!(grid.interaction().is_idle());
        assert_eq!(grid.placeholder(), None);
    }

    #[test]
    fn test_set_grid_size_announces() {
        let mut grid = Grid::new(12, 12);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sub = grid
            .bus()
            .subscribe::<GridSizeData, _>(events::GRID_SIZE_CHANGED, move |event| {
                seen_clone.lock().unwrap().push((event.columns, event.rows));
                Ok(())
            });

        grid.set_grid_size(8, 6);
        assert_eq!(grid.size(), GridSize::new(8, 6));
        assert_eq!(*seen.lock().unwrap(), vec![(8, 6)]);
        sub.cancel();
    }

    #[test]
    fn test_layout_roundtrip_reproduces_structure() {
        let mut grid = Grid::new(12, 12);
        let mut cell = named_cell("c1");
        cell.set_widget(stub_widget("w1"));
        grid.add_cell(cell, 0, 0, 2, 2);
        grid.add_cell(named_cell("c2"), 4, 1, 3, 2);

        let saved = grid.save_layout();

        let mut restored = Grid::new(4, 4);
        restored
            .load_layout(&saved, |meta| {
                let id = meta
                    .get("widget_id")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| anyhow::anyhow!("missing widget_id"))?;
                Ok(stub_widget(id))
            })
            .unwrap();

        assert_eq!(restored.size(), GridSize::new(12, 12));
        assert_eq!(restored.len(), 2);

        let c1 = restored.cell("c1").unwrap();
        assert_eq!(c1.position(), CellPos::new(0, 0));
        assert_eq!(c1.size(), CellSize::new(2, 2));
        assert_eq!(c1.content_kind(), "widget");
        assert_eq!(c1.widget().unwrap().id(), "w1");

        let c2 = restored.cell("c2").unwrap();
        assert_eq!(c2.position(), CellPos::new(4, 1));
        assert_eq!(c2.size(), CellSize::new(3, 2));
        assert_eq!(c2.content_kind(), "empty");

        // identical structure on a second save
        let resaved = restored.save_layout();
        assert_eq!(
            serde_json::to_value(&saved).unwrap(),
            serde_json::to_value(&resaved).unwrap()
        );
    }

    #[test]
    fn test_load_layout_replaces_existing_cells() {
        let mut grid = Grid::new(12, 12);
        grid.add_cell(named_cell("old"), 0, 0, 1, 1);

        let layout = GridLayout {
            grid_size: GridSize::new(6, 6),
            cells: vec![CellLayout {
                id: "new".to_string(),
                position: CellPos::new(2, 2),
                size: CellSize::new(1, 1),
                content_type: None,
                content_metadata: None,
            }],
        };
        grid.load_layout(&layout, |_| Err(anyhow::anyhow!("no widgets here")))
            .unwrap();

        assert!(grid.cell("old").is_none());
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.size(), GridSize::new(6, 6));
        assert!(grid.cell("new").is_some());
    }

    #[test]
    fn test_load_layout_factory_failure_propagates() {
        let mut grid = Grid::new(12, 12);
        let layout = GridLayout {
            grid_size: GridSize::new(6, 6),
            cells: vec![CellLayout {
                id: "c1".to_string(),
                position: CellPos::new(0, 0),
                size: CellSize::new(1, 1),
                content_type: Some(crate::entities::layout::ContentKind::Widget),
                content_metadata: Some(json!({"widget_id": "w1"})),
            }],
        };
        let result = grid.load_layout(&layout, |_| Err(anyhow::anyhow!("factory down")));
        assert!(result.is_err());
    }

    #[test]
    fn test_dispose_clears_everything() {
        let mut grid = Grid::new(12, 12);
        let mut cell = named_cell("c1");
        cell.set_widget(stub_widget("w1"));
        grid.add_cell(cell, 0, 0, 2, 2);
        grid.begin_drag("c1", Vec2::ZERO);

        grid.dispose();
        grid.dispose();
        assert_eq!(grid.len(), 0);
        assert!(grid.interaction().is_idle());
        assert_eq!(grid.placeholder(), None);
    }

    #[test]
    fn test_metrics_reach_cells() {
        let mut grid = Grid::new(12, 12);
        grid.add_cell(named_cell("c1"), 0, 0, 2, 2);
        grid.set_metrics(CellMetrics::square(32.0));
        assert_eq!(grid.cell("c1").unwrap().metrics(), CellMetrics::square(32.0));
    }
}
