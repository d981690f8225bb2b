//! MOSAIC - widget grid composition runtime.
//!
//! A grid owns nestable cells, cells own widgets, and every component
//! talks through its own namespaced event bus: events bubble upward with
//! provenance through relay taps, never through shared references.
//! Widget source text is untrusted until the secure loader has verified
//! its SHA-256 digest against a pre-trusted manifest.
//!
//! Everything is headless: the grid, cells, widgets and the drag/resize
//! state machine run and test without any UI attached.

pub mod cli;
pub mod config;
pub mod core;
pub mod entities;
pub mod widgets;

// Re-export the working surface
pub use crate::core::event_bus::{EventBus, Subscription};
pub use crate::core::events::{CellEventData, WidgetEventData};
pub use crate::core::store::MemoryStore;
pub use crate::entities::{
    Cell, CellContent, CellMetrics, CellPos, CellRect, CellSize, ContainmentError, DataStore,
    FileFetcher, Grid, GridError, GridLayout, GridSize, Interaction, LoadError, ManifestEntry,
    ManifestStore, ModuleHandle, SecureLoader, SourceFetcher, StaticManifest, Widget,
    WidgetBehavior, WidgetCtx, WidgetFactory, WidgetRegistry,
};
pub use crate::widgets::{CounterWidget, NoteWidget};
