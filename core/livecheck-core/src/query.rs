//! One-shot query: a single probe cycle, no watching.

use crate::config::LivecheckConfig;
use crate::install::install_marker_present;
use crate::probe::{ProbeAdapter, ProbeRunner};
use crate::reconcile::StateReconciler;
use crate::types::{DetailFormat, LiveSnapshot, LiveState};
use std::path::Path;

/// Runs the probes once and applies the install override from a direct
/// existence check of `marker`.
pub fn query_live_state<A: ProbeAdapter>(
    runner: &ProbeRunner<A>,
    marker: &Path,
    format: DetailFormat,
) -> LiveSnapshot {
    let outcome = runner.run();
    let mut reconciler = StateReconciler::new(format);
    reconciler.set_install_override(install_marker_present(marker));
    reconciler.apply_probe(&outcome)
}

pub fn query_with_config(config: &LivecheckConfig, format: DetailFormat) -> LiveSnapshot {
    let runner = ProbeRunner::new(config.probe_adapter(), config.writable_source());
    query_live_state(&runner, &config.install_marker_path(), format)
}

/// Process exit code for a one-shot report: 1 for error states, else 0.
pub fn exit_code_for(state: LiveState) -> i32 {
    if state.is_error() {
        1
    } else {
        0
    }
}
