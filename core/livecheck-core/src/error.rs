//! Error types for livecheck-core operations.
//!
//! Probe failures are not errors here: they are ordinary values
//! ([`crate::probe::ProbeOutcome`]) that surface as an error `LiveState`.
//! `LivecheckError` covers the conditions a caller has to act on.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LivecheckError {
    // ─────────────────────────────────────────────────────────────────────
    // Mount Table Errors (fatal to the monitor)
    // ─────────────────────────────────────────────────────────────────────
    #[error("Mount table unavailable: {path}: {source}")]
    MountTableUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for mount table changes: {path}: {source}")]
    MountTablePoll {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Install Override Errors (degrade to "override inactive")
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to watch install marker directory: {path}: {details}")]
    OverrideWatch { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl LivecheckError {
    /// Whether the monitor cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LivecheckError::MountTableUnavailable { .. } | LivecheckError::MountTablePoll { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LivecheckError>;

impl From<LivecheckError> for String {
    fn from(err: LivecheckError) -> String {
        err.to_string()
    }
}
