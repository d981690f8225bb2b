//! Command-line interface for the demo host.

use std::path::PathBuf;

use clap::Parser;
use const_format::concatcp;

use crate::config;

/// Version string with target info, shown by `--version`
pub const VERSION_INFO: &str = concatcp!(
    env!("CARGO_PKG_VERSION"),
    " (",
    std::env::consts::OS,
    "-",
    std::env::consts::ARCH,
    ")"
);

/// Widget grid composition runtime
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Layout JSON to restore; omit to start from an empty grid
    #[arg(value_name = "LAYOUT")]
    pub layout: Option<PathBuf>,

    /// Security manifest: a JSON array of widget entries
    #[arg(short = 'm', long = "manifest", value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Root directory widget sources are fetched from
    #[arg(short = 's', long = "sources", value_name = "DIR", default_value = ".")]
    pub sources: PathBuf,

    /// Widget id to secure-load and auto-place (repeatable)
    #[arg(short = 'w', long = "widget", value_name = "ID")]
    pub widgets: Vec<String>,

    /// Grid columns
    #[arg(long, value_name = "N", default_value_t = config::DEFAULT_COLUMNS)]
    pub columns: u32,

    /// Grid rows
    #[arg(long, value_name = "N", default_value_t = config::DEFAULT_ROWS)]
    pub rows: u32,

    /// Cell edge length in pixels
    #[arg(long = "cell-px", value_name = "PX", default_value_t = config::DEFAULT_CELL_PX)]
    pub cell_px: f32,

    /// Write the resulting layout JSON here instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Increase verbosity (-v: info, -vv: debug, -vvv: trace; default: warn)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl Args {
    /// Log level filter for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
