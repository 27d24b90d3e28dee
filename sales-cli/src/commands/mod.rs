//! CLI command implementations

pub mod logs;
pub mod monthly;
pub mod preview;
pub mod query;
pub mod run;
pub mod status;
pub mod top;

use std::path::PathBuf;

use anyhow::{Context, Result};
use sales_core::services::{EntryPoint, LogEvent, LoggingService};
use sales_core::SalesContext;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the data directory from environment or default
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SALES_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sales")
    }
}

/// Open the sales context for the data directory
pub fn get_context() -> Result<SalesContext> {
    let data_dir = get_data_dir();

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    SalesContext::new(&data_dir).context("Failed to initialize sales context")
}
