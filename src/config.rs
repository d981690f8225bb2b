//! Framework-wide defaults.

/// Default number of grid columns
pub const DEFAULT_COLUMNS: u32 = 12;

/// Default number of grid rows
pub const DEFAULT_ROWS: u32 = 12;

/// Default edge length of one grid cell, in pixels
pub const DEFAULT_CELL_PX: f32 = 64.0;

/// Default span (in grid units) for auto-placed widgets
pub const DEFAULT_WIDGET_SPAN: u32 = 2;
