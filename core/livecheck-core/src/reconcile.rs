//! Reconciles probe outcomes with the install override.
//!
//! ```text
//!                 ┌────────────── override off ──────────────┐
//!                 ▼                                           │
//! probe Ok ──► emit + retain as last genuine          override on ──► emit installing-distribution
//! probe error ► emit error state (last genuine kept)          │        (probe results still retained)
//!                                                             ▼
//!                                               override off ──► re-emit last genuine verbatim
//! ```
//!
//! Errors are transient: they never replace the last genuine snapshot, so a
//! failed cycle cannot erase good history.

use crate::probe::ProbeOutcome;
use crate::types::{DetailFormat, LiveSnapshot, LiveState};

/// Maps a single probe outcome to the snapshot it represents, ignoring the
/// install override.
pub fn snapshot_from_outcome(outcome: &ProbeOutcome, format: DetailFormat) -> LiveSnapshot {
    match outcome {
        ProbeOutcome::Ok { state, filesystems } if state.is_semi_persistent() => {
            LiveSnapshot::new(
                *state,
                format.render_list(&filesystems.safe),
                format.render_list(&filesystems.unsafe_),
            )
        }
        ProbeOutcome::Ok { state, .. } => LiveSnapshot::bare(*state),
        ProbeOutcome::ProbeFailed {
            probe,
            exit_code,
            output,
        } => LiveSnapshot::new(probe.failed_state(), output.clone(), exit_code.to_string()),
        ProbeOutcome::ProbeOutputInvalid { probe, output } => {
            LiveSnapshot::new(probe.invalid_output_state(), output.clone(), "0")
        }
    }
}

/// Stateless form: what to show for `outcome` given the override flag.
pub fn reconcile(
    outcome: &ProbeOutcome,
    install_override: bool,
    format: DetailFormat,
) -> LiveSnapshot {
    if install_override {
        return LiveSnapshot::bare(LiveState::InstallingDistribution);
    }
    snapshot_from_outcome(outcome, format)
}

/// Stateful reconciler owned by the monitor.
#[derive(Debug, Clone)]
pub struct StateReconciler {
    format: DetailFormat,
    install_override: bool,
    last_genuine: Option<LiveSnapshot>,
    last_probe: Option<LiveSnapshot>,
}

impl StateReconciler {
    pub fn new(format: DetailFormat) -> Self {
        Self {
            format,
            install_override: false,
            last_genuine: None,
            last_probe: None,
        }
    }

    pub fn format(&self) -> DetailFormat {
        self.format
    }

    pub fn install_override(&self) -> bool {
        self.install_override
    }

    pub fn last_genuine(&self) -> Option<&LiveSnapshot> {
        self.last_genuine.as_ref()
    }

    /// Folds in a fresh probe outcome and returns the snapshot to publish.
    pub fn apply_probe(&mut self, outcome: &ProbeOutcome) -> LiveSnapshot {
        let snapshot = snapshot_from_outcome(outcome, self.format);
        if matches!(outcome, ProbeOutcome::Ok { .. }) {
            self.last_genuine = Some(snapshot.clone());
        }
        self.last_probe = Some(snapshot.clone());

        if self.install_override {
            return LiveSnapshot::bare(LiveState::InstallingDistribution);
        }
        snapshot
    }

    /// Updates the override flag. Returns the snapshot to publish when the
    /// flag actually changed, `None` otherwise.
    pub fn set_install_override(&mut self, active: bool) -> Option<LiveSnapshot> {
        if self.install_override == active {
            return None;
        }
        self.install_override = active;

        if active {
            Some(LiveSnapshot::bare(LiveState::InstallingDistribution))
        } else {
            Some(self.restored())
        }
    }

    /// The snapshot shown once the override clears.
    fn restored(&self) -> LiveSnapshot {
        self.last_genuine
            .clone()
            .or_else(|| self.last_probe.clone())
            .unwrap_or_else(LiveSnapshot::loading)
    }
}
