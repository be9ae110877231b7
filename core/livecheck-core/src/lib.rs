//! # livecheck-core
//!
//! Tracks whether the running system is a live (non-persistent) boot,
//! persistent, or somewhere in between, and reports changes as they happen.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. The monitor blocks on the kernel mount
//!   table on its own thread; subscribers receive updates over `mpsc`.
//! - **Failures are states**: A probe that crashes or prints garbage becomes an
//!   error [`LiveState`], not a Rust error. Only losing the mount table is fatal.
//! - **Last good wins**: Error snapshots never overwrite the last genuine one,
//!   so clearing the install override restores real history.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use livecheck_core::{load_config, DetailFormat, Monitor};
//!
//! let config = load_config(None)?;
//! let monitor = Monitor::from_config(&config, DetailFormat::Html)?;
//! let updates = monitor.subscribe();
//! let worker = monitor.spawn()?;
//! for update in updates {
//!     println!("{}", update.snapshot.state);
//! }
//! ```

pub mod config;
pub mod descriptors;
pub mod error;
pub mod install;
pub mod monitor;
pub mod mount_watch;
pub mod mounts;
pub mod notifier;
pub mod probe;
pub mod query;
pub mod reconcile;
pub mod types;

pub use config::{load_config, LivecheckConfig, WritableSourceKind};
pub use descriptors::{describe, render_report, StateDescriptor};
pub use error::{LivecheckError, Result};
pub use install::{install_marker_present, watch_install_marker, InstallOverrideWatch};
pub use monitor::{LiveUpdate, Monitor, MonitorHandle, MonitorPhase};
pub use mount_watch::{MountEvents, MountTableWatcher};
pub use notifier::{should_notify, ChangeNotifier, Notification};
pub use probe::{
    CommandProbeAdapter, ProbeAdapter, ProbeKind, ProbeOutcome, ProbeOutput, ProbeRunner,
    WritableSource,
};
pub use query::{exit_code_for, query_live_state, query_with_config};
pub use reconcile::{reconcile, StateReconciler};
pub use types::{DetailFormat, LiveSnapshot, LiveState, WritableFilesystemSet};

/// Starts the install-marker watch for a running monitor.
///
/// A watch that cannot be established is logged and treated as "override
/// never active"; the monitor keeps running without it.
pub fn start_install_watch(
    config: &LivecheckConfig,
    handle: &MonitorHandle,
) -> Option<InstallOverrideWatch> {
    let handle = handle.clone();
    match watch_install_marker(
        &config.install.monitor_dir,
        config.install_marker_path(),
        move |present| handle.set_install_override(present),
    ) {
        Ok(watch) => Some(watch),
        Err(err) => {
            tracing::warn!(error = %err, "Install override disabled");
            None
        }
    }
}
