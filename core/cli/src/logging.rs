//! Stderr logging for the one-shot CLI.
//!
//! Quiet by default so the report owns the terminal; `LIVECHECK_DEBUG_LOG=1`
//! or `RUST_LOG` turns diagnostics on.

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs the subscriber. Keep the guard alive until exit or buffered
/// lines are lost.
pub fn init() -> Option<WorkerGuard> {
    let debug_enabled = env::var("LIVECHECK_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .try_init()
        .ok()?;
    Some(guard)
}
