//! Composition domain: widgets, cells, the grid, layout records and the
//! secure loader.

pub mod cell;
pub mod grid;
pub mod layout;
pub mod loader;
pub mod manifest;
pub mod space;
pub mod traits;
pub mod widget;

pub use cell::{Cell, CellContent, ContainmentError};
pub use grid::{Grid, GridError, Interaction};
pub use layout::{CellLayout, ContentKind, GridLayout};
pub use loader::{FileFetcher, LoadError, ModuleHandle, SecureLoader, WidgetFactory, WidgetRegistry};
pub use manifest::{ManifestEntry, StaticManifest};
pub use space::{CellMetrics, CellPos, CellRect, CellSize, GridSize};
pub use traits::{DataStore, ManifestStore, SourceFetcher};
pub use widget::{Widget, WidgetBehavior, WidgetCtx};
