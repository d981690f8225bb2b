//! Grid coordinate space: positions, spans, and the unit-to-pixel mapping.
//!
//! All layout math lives here. Grid coordinates are integer cell units
//! with the origin at the top-left; pixels only appear at the boundary
//! where content is told its concrete size.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config;

/// Grid-unit position of a cell's top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: u32,
    pub y: u32,
}

impl CellPos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for CellPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Grid-unit span of a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

impl CellSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }
}

impl std::fmt::Display for CellSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Grid dimensions in cell units
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub columns: u32,
    pub rows: u32,
}

impl GridSize {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self {
            columns: config::DEFAULT_COLUMNS,
            rows: config::DEFAULT_ROWS,
        }
    }
}

/// Axis-aligned rectangle in grid units (position + span)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn position(&self) -> CellPos {
        CellPos::new(self.x, self.y)
    }

    pub fn size(&self) -> CellSize {
        CellSize::new(self.width, self.height)
    }

    /// Strict overlap test: shared edges do not count as an intersection.
    pub fn intersects(&self, other: &CellRect) -> bool {
        (self.x as u64) < other.x as u64 + other.width as u64
            && self.x as u64 + self.width as u64 > other.x as u64
            && (self.y as u64) < other.y as u64 + other.height as u64
            && self.y as u64 + self.height as u64 > other.y as u64
    }

    /// True when the rectangle lies fully inside a grid of `size`
    pub fn fits_in(&self, size: GridSize) -> bool {
        self.x as u64 + self.width as u64 <= size.columns as u64
            && self.y as u64 + self.height as u64 <= size.rows as u64
    }
}

/// Unit-to-pixel mapping for one grid.
///
/// Cells translate grid-unit spans through this before notifying content,
/// and pointer deltas translate back through it when a drag or resize
/// commits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellMetrics {
    pub cell_width_px: f32,
    pub cell_height_px: f32,
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self::square(config::DEFAULT_CELL_PX)
    }
}

impl CellMetrics {
    pub fn new(cell_width_px: f32, cell_height_px: f32) -> Self {
        Self {
            cell_width_px,
            cell_height_px,
        }
    }

    pub fn square(edge_px: f32) -> Self {
        Self::new(edge_px, edge_px)
    }

    /// Pixel dimensions of a content area spanning `size` grid units
    pub fn content_px(&self, size: CellSize) -> Vec2 {
        Vec2::new(
            size.width as f32 * self.cell_width_px,
            size.height as f32 * self.cell_height_px,
        )
    }

    /// Convert a pixel delta to whole grid units, rounding to nearest
    pub fn units_delta(&self, px_delta: Vec2) -> (i64, i64) {
        (
            (px_delta.x / self.cell_width_px).round() as i64,
            (px_delta.y / self.cell_height_px).round() as i64,
        )
    }
}
