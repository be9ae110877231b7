//! External probe execution and output contracts.
//!
//! Two probes are run per cycle: the live-state probe, then (only if that
//! succeeded) the writable-filesystem-list probe. Every failure is folded
//! into a [`ProbeOutcome`]; nothing here returns `Err`.
//!
//! ```text
//! live-mode probe ──exit≠0──► ProbeFailed(LiveMode)
//!        │ exit 0, no marker line / unknown token ──► ProbeOutputInvalid(LiveMode)
//!        ▼
//! writable-list source ──exit≠0──► ProbeFailed(WritableFsLists)
//!        │ exit 0, line count ≠ 2 ──► ProbeOutputInvalid(WritableFsLists)
//!        ▼
//!   Ok(state, safe, unsafe)
//! ```

use fs_err as fs;
use livecheck_protocol::LIVE_MODE_MARKER;
use serde::{Deserialize, Serialize};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::mounts::{classify_mount_table, parse_token_lists, SysfsBlock};
use crate::types::{LiveState, WritableFilesystemSet};

/// Exit code reported when a probe could not be started at all.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;
/// Exit code reported when the mount table could not be read in-process.
pub const MOUNT_TABLE_READ_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    LiveMode,
    WritableFsLists,
}

impl ProbeKind {
    /// Error state for a probe that exited nonzero.
    pub fn failed_state(self) -> LiveState {
        match self {
            ProbeKind::LiveMode => LiveState::ErrorLiveMode,
            ProbeKind::WritableFsLists => LiveState::ErrorGetWritableFsLists,
        }
    }

    /// Error state for a probe whose output could not be parsed.
    pub fn invalid_output_state(self) -> LiveState {
        match self {
            ProbeKind::LiveMode => LiveState::ErrorLiveModeInvalidOutput,
            ProbeKind::WritableFsLists => LiveState::ErrorGetWritableFsListsInvalidOutput,
        }
    }
}

/// Raw result of running one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProbeOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// stderr followed by stdout, kept verbatim for diagnostics.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stderr, self.stdout)
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ok {
        state: LiveState,
        filesystems: WritableFilesystemSet,
    },
    ProbeFailed {
        probe: ProbeKind,
        exit_code: i32,
        output: String,
    },
    ProbeOutputInvalid {
        probe: ProbeKind,
        output: String,
    },
}

/// Runs the probe executables.
pub trait ProbeAdapter: Send + Sync {
    fn run_live_mode(&self) -> ProbeOutput;
    fn run_writable_fs_lists(&self) -> ProbeOutput;
}

/// Production adapter: spawns the configured executables with no arguments.
#[derive(Debug, Clone)]
pub struct CommandProbeAdapter {
    live_mode: PathBuf,
    writable_fs_lists: PathBuf,
}

impl CommandProbeAdapter {
    pub fn new(live_mode: impl Into<PathBuf>, writable_fs_lists: impl Into<PathBuf>) -> Self {
        Self {
            live_mode: live_mode.into(),
            writable_fs_lists: writable_fs_lists.into(),
        }
    }
}

impl ProbeAdapter for CommandProbeAdapter {
    fn run_live_mode(&self) -> ProbeOutput {
        run_probe(&self.live_mode)
    }

    fn run_writable_fs_lists(&self) -> ProbeOutput {
        run_probe(&self.writable_fs_lists)
    }
}

// No timeout: a hung probe stalls the caller.
fn run_probe(path: &Path) -> ProbeOutput {
    tracing::debug!(probe = %path.display(), "Running probe");
    match Command::new(path).output() {
        Ok(output) => ProbeOutput {
            exit_code: exit_code_of(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(err) => {
            tracing::warn!(probe = %path.display(), error = %err, "Failed to spawn probe");
            ProbeOutput::new(
                SPAWN_FAILURE_EXIT_CODE,
                "",
                format!("failed to run {}: {}\n", path.display(), err),
            )
        }
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

/// Where the safe/unsafe writable lists come from.
#[derive(Debug, Clone)]
pub enum WritableSource {
    /// The external writable-list probe.
    Script,
    /// In-process classification of a mount-table file.
    MountTable { path: PathBuf, sysfs: SysfsBlock },
}

pub struct ProbeRunner<A: ProbeAdapter> {
    adapter: A,
    source: WritableSource,
}

impl<A: ProbeAdapter> ProbeRunner<A> {
    pub fn new(adapter: A, source: WritableSource) -> Self {
        Self { adapter, source }
    }

    #[cfg(test)]
    pub(crate) fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Runs one full probe cycle.
    pub fn run(&self) -> ProbeOutcome {
        let live_output = self.adapter.run_live_mode();
        let state = match parse_live_mode(&live_output) {
            Ok(state) => state,
            Err(outcome) => return outcome,
        };

        let filesystems = match &self.source {
            WritableSource::Script => {
                match parse_writable_fs_lists(&self.adapter.run_writable_fs_lists()) {
                    Ok(filesystems) => filesystems,
                    Err(outcome) => return outcome,
                }
            }
            WritableSource::MountTable { path, sysfs } => match fs::read(path) {
                Ok(contents) => classify_mount_table(&String::from_utf8_lossy(&contents), sysfs),
                Err(err) => {
                    return ProbeOutcome::ProbeFailed {
                        probe: ProbeKind::WritableFsLists,
                        exit_code: MOUNT_TABLE_READ_EXIT_CODE,
                        output: format!("{}\n", err),
                    }
                }
            },
        };

        let state = with_writable_mounts(state, &filesystems);
        ProbeOutcome::Ok { state, filesystems }
    }
}

/// Upgrades a plain live mode to its semi-persistent variant when writable
/// filesystems are mounted. Any other reported state is kept as is.
pub fn with_writable_mounts(state: LiveState, filesystems: &WritableFilesystemSet) -> LiveState {
    let unsafe_present = !filesystems.unsafe_.is_empty();
    let safe_present = !filesystems.safe.is_empty();
    match state {
        LiveState::GrubLive if unsafe_present => LiveState::GrubLiveSemiPersistentUnsafe,
        LiveState::GrubLive if safe_present => LiveState::GrubLiveSemiPersistent,
        LiveState::IsoLive if unsafe_present => LiveState::IsoLiveSemiPersistentUnsafe,
        LiveState::IsoLive if safe_present => LiveState::IsoLiveSemiPersistent,
        state => state,
    }
}

/// Extracts the live-state token from the live-state probe's output.
pub fn parse_live_mode(output: &ProbeOutput) -> Result<LiveState, ProbeOutcome> {
    if !output.succeeded() {
        return Err(ProbeOutcome::ProbeFailed {
            probe: ProbeKind::LiveMode,
            exit_code: output.exit_code,
            output: output.combined(),
        });
    }

    let token = output.stdout.trim().lines().find_map(|line| {
        line.strip_prefix(LIVE_MODE_MARKER)
            .and_then(|rest| rest.strip_prefix('='))
            .map(|value| value.trim_matches('\''))
    });

    match token.and_then(LiveState::from_probe_token) {
        Some(state) => Ok(state),
        None => {
            tracing::warn!(token = ?token, "Live-state probe output could not be parsed");
            Err(ProbeOutcome::ProbeOutputInvalid {
                probe: ProbeKind::LiveMode,
                output: output.combined(),
            })
        }
    }
}

/// Parses the writable-list probe's two lines. The output is deliberately
/// not trimmed: an empty second line is meaningful.
pub fn parse_writable_fs_lists(output: &ProbeOutput) -> Result<WritableFilesystemSet, ProbeOutcome> {
    if !output.succeeded() {
        return Err(ProbeOutcome::ProbeFailed {
            probe: ProbeKind::WritableFsLists,
            exit_code: output.exit_code,
            output: output.combined(),
        });
    }

    let lines: Vec<&str> = output.stdout.lines().collect();
    match lines.as_slice() {
        [safe, unsafe_] => Ok(parse_token_lists(safe, unsafe_)),
        _ => {
            tracing::warn!(
                line_count = lines.len(),
                "Writable-list probe did not print exactly two lines"
            );
            Err(ProbeOutcome::ProbeOutputInvalid {
                probe: ProbeKind::WritableFsLists,
                output: output.combined(),
            })
        }
    }
}
