//! Demo host: builds a grid, secure-loads widgets, simulates a drag and
//! prints the event stream plus the saved layout.

use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use glam::Vec2;
use log::{debug, info, warn};
use serde_json::Value;

use mosaic::cli::Args;
use mosaic::config;
use mosaic::core::events::{
    self, CellAddedData, CellEventData, CellRemovedData, GridSizeData,
};
use mosaic::{
    Cell, CellMetrics, CounterWidget, DataStore, FileFetcher, Grid, GridLayout, ManifestStore,
    MemoryStore, NoteWidget, SecureLoader, SourceFetcher, StaticManifest, Subscription,
    WidgetRegistry,
};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.log_level()),
    )
    .format_timestamp_millis()
    .init();

    info!("mosaic starting...");
    debug!("Command-line args: {:?}", args);

    // collaborators
    let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
    let manifest: Arc<dyn ManifestStore> = match &args.manifest {
        Some(path) => Arc::new(StaticManifest::from_json_file(path)?),
        None => Arc::new(StaticManifest::new()),
    };
    let fetcher: Arc<dyn SourceFetcher> = Arc::new(FileFetcher::new(&args.sources));

    let mut registry = WidgetRegistry::new();
    registry.register("x-counter", Arc::new(CounterWidget::from_module));
    registry.register("x-note", Arc::new(NoteWidget::from_module));
    info!("registry: {} widget factories", registry.len());

    let mut loader = SecureLoader::new(manifest, fetcher, registry);
    loader.set_data_store(Arc::clone(&store));

    // the grid plus a tap on everything it announces
    let metrics = CellMetrics::square(args.cell_px);
    let mut grid = Grid::with_metrics(args.columns, args.rows, metrics);
    let taps = tap_grid_bus(&grid);

    if let Some(path) = &args.layout {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read layout {}: {}", path.display(), e))?;
        let layout = GridLayout::from_json_str(&text)?;
        grid.load_layout(&layout, |meta| {
            let widget_id = meta
                .get("widget_id")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("layout record has no widget_id"))?;
            loader.load(widget_id).map_err(|e| anyhow!("{e}"))
        })?;
        info!("layout restored from {}", path.display());
    }

    for widget_id in &args.widgets {
        let widget = match loader.load(widget_id) {
            Ok(widget) => widget,
            Err(err) => {
                warn!("widget '{widget_id}' not loaded: {err}");
                continue;
            }
        };
        let span = config::DEFAULT_WIDGET_SPAN;
        let Some(pos) = grid.find_free_position(span, span) else {
            warn!("no free {span}x{span} region for widget '{widget_id}'");
            continue;
        };
        let mut cell = Cell::new();
        cell.set_widget(widget);
        if let Err(err) = grid.place_cell(cell, pos.x, pos.y, span, span) {
            warn!("placement failed for widget '{widget_id}': {err}");
        }
    }

    // poke the first counter so the event stream shows something
    if let Some(cell_id) = grid.cell_ids().first().cloned() {
        if let Some(widget) = grid.cell_mut(&cell_id).and_then(Cell::widget_mut) {
            widget.update(|behavior, ctx| {
                if let Some(counter) = behavior.as_any_mut().downcast_mut::<CounterWidget>() {
                    counter.increment(ctx);
                }
            });
        }

        // one simulated drag: a cell-and-a-half right, half a cell down
        let start = Vec2::ZERO;
        let end = Vec2::new(args.cell_px * 1.5, args.cell_px * 0.5);
        if grid.begin_drag(&cell_id, start) {
            grid.pointer_moved(end);
            debug!("placeholder at {:?}", grid.placeholder());
            grid.pointer_released(end);
        }
    }

    let layout = grid.save_layout();
    let text = layout.to_json_string()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &text)
                .map_err(|e| anyhow!("failed to write layout {}: {}", path.display(), e))?;
            info!("layout saved to {}", path.display());
        }
        None => println!("{text}"),
    }

    for tap in taps {
        tap.cancel();
    }
    grid.dispose();
    info!("mosaic done");
    Ok(())
}

/// Print every channel the grid publishes on
fn tap_grid_bus(grid: &Grid) -> Vec<Subscription> {
    let bus = grid.bus();
    vec![
        bus.subscribe::<CellEventData, _>(events::CELL_EVENT, |event| {
            println!(
                "event: '{}' from widget {} via {:?}",
                event.name, event.source_widget, event.path
            );
            Ok(())
        }),
        bus.subscribe::<CellAddedData, _>(events::GRID_CELL_ADDED, |event| {
            println!(
                "event: cell {} added at {} span {}",
                event.cell, event.position, event.size
            );
            Ok(())
        }),
        bus.subscribe::<CellRemovedData, _>(events::GRID_CELL_REMOVED, |event| {
            println!("event: cell {} removed", event.cell);
            Ok(())
        }),
        bus.subscribe::<GridSizeData, _>(events::GRID_SIZE_CHANGED, |event| {
            println!("event: grid resized to {}x{}", event.columns, event.rows);
            Ok(())
        }),
    ]
}
