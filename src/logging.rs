//! Tracing subscriber setup
//!
//! Every run logs to stdout. Once the output directory is known to exist, the
//! same events are also appended to a plain-text log file inside it.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file written by the selection pipeline
pub const SELECTION_LOG: &str = "selection.log";

/// Log file written by the analysis pipeline
pub const ANALYSIS_LOG: &str = "plot.log";

/// Default level for the `-v/--verbose` switch
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Initialize the global subscriber.
///
/// `log_file` is only opened when its parent directory exists, so a missing
/// output directory can still be reported on stdout before exiting.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbose).into())
        .from_env_lossy();

    let file_layer = match log_file {
        Some(path) if path.parent().is_some_and(Path::is_dir) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(Arc::new(file)),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stdout),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
