//! Livecheck daemon entrypoint.
//!
//! Watches the mount table and the installer marker, and streams every
//! published live state to stdout as one JSON line. A tray indicator or
//! status bar reads the other end of the pipe. Logs go to stderr.

use clap::Parser;
use std::env;
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use livecheck_core::{load_config, start_install_watch, DetailFormat, LivecheckConfig, Monitor};

mod feed;

#[derive(Parser)]
#[command(name = "livecheck-daemon")]
#[command(about = "Stream live-state changes to stdout as JSON lines")]
#[command(version)]
struct Args {
    /// Config file (defaults to $LIVECHECK_CONFIG, then the user and system config)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    init_logging();

    let config = match load_config(args.config) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load livecheck config; using defaults");
            LivecheckConfig::default()
        }
    };

    let monitor = match Monitor::from_config(&config, DetailFormat::Html) {
        Ok(monitor) => monitor,
        Err(err) => {
            error!(error = %err, "Failed to start live-state monitor");
            std::process::exit(1);
        }
    };
    let handle = monitor.handle();
    let updates = monitor.subscribe();
    let _install_watch = start_install_watch(&config, &handle);

    let worker = match monitor.spawn() {
        Ok(worker) => worker,
        Err(err) => {
            error!(error = %err, "Failed to spawn monitor thread");
            std::process::exit(1);
        }
    };
    info!(
        mount_table = %config.mounts.table.display(),
        live_mode_probe = %config.probes.live_mode.display(),
        writable_source = ?config.probes.writable_source,
        install_marker = %config.install_marker_path().display(),
        "Livecheck daemon started"
    );

    let stdout = io::stdout();
    for update in updates {
        let event = feed::feed_event(&update);
        if let Err(err) = feed::write_event(&mut stdout.lock(), &event) {
            if err.kind() == ErrorKind::BrokenPipe {
                info!("Feed reader went away; exiting");
                std::process::exit(0);
            }
            warn!(error = %err, "Failed to write feed event");
        }
    }

    match worker.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!(error = %err, "Live-state monitor failed");
            std::process::exit(1);
        }
        Err(_) => {
            error!("Live-state monitor panicked");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("LIVECHECK_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
