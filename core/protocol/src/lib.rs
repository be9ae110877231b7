//! Live-state values and feed wire types shared by livecheck crates.
//!
//! The daemon writes one [`FeedEvent`] per line to stdout; presentation
//! clients (tray indicators, status bars) parse those lines with
//! [`parse_feed_event`]. Keeping the types here prevents schema drift between
//! the daemon and its consumers.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FEED_VERSION: u32 = 1;
pub const MAX_FEED_LINE_BYTES: usize = 1024 * 1024; // 1MB

/// Key printed by the live-state probe in front of its token.
pub const LIVE_MODE_MARKER: &str = "live_status_detected_live_mode_environment_machine";

/// The system's persistence classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiveState {
    /// Sentinel used before the first reconciliation completes.
    Loading,
    IsoLive,
    IsoLiveSemiPersistent,
    IsoLiveSemiPersistentUnsafe,
    GrubLive,
    GrubLiveReadOnly,
    GrubLiveSemiPersistent,
    GrubLiveSemiPersistentUnsafe,
    InstallingDistribution,
    Persistent,
    ErrorLiveMode,
    ErrorGetWritableFsLists,
    ErrorLiveModeInvalidOutput,
    ErrorGetWritableFsListsInvalidOutput,
}

impl LiveState {
    pub const ALL: [LiveState; 14] = [
        LiveState::Loading,
        LiveState::IsoLive,
        LiveState::IsoLiveSemiPersistent,
        LiveState::IsoLiveSemiPersistentUnsafe,
        LiveState::GrubLive,
        LiveState::GrubLiveReadOnly,
        LiveState::GrubLiveSemiPersistent,
        LiveState::GrubLiveSemiPersistentUnsafe,
        LiveState::InstallingDistribution,
        LiveState::Persistent,
        LiveState::ErrorLiveMode,
        LiveState::ErrorGetWritableFsLists,
        LiveState::ErrorLiveModeInvalidOutput,
        LiveState::ErrorGetWritableFsListsInvalidOutput,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LiveState::Loading => "loading",
            LiveState::IsoLive => "iso-live",
            LiveState::IsoLiveSemiPersistent => "iso-live-semi-persistent",
            LiveState::IsoLiveSemiPersistentUnsafe => "iso-live-semi-persistent-unsafe",
            LiveState::GrubLive => "grub-live",
            LiveState::GrubLiveReadOnly => "grub-live-read-only",
            LiveState::GrubLiveSemiPersistent => "grub-live-semi-persistent",
            LiveState::GrubLiveSemiPersistentUnsafe => "grub-live-semi-persistent-unsafe",
            LiveState::InstallingDistribution => "installing-distribution",
            LiveState::Persistent => "persistent",
            LiveState::ErrorLiveMode => "error-live-mode",
            LiveState::ErrorGetWritableFsLists => "error-get-writable-fs-lists",
            LiveState::ErrorLiveModeInvalidOutput => "error-live-mode-invalid-output",
            LiveState::ErrorGetWritableFsListsInvalidOutput => {
                "error-get-writable-fs-lists-invalid-output"
            }
        }
    }

    /// Parses any token this enum serializes to.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.as_str() == token)
    }

    /// Parses a token as emitted by the live-state probe.
    ///
    /// Only the states the probe can legitimately report are accepted. The
    /// legacy token `false` maps to [`LiveState::Persistent`].
    pub fn from_probe_token(token: &str) -> Option<Self> {
        if token == "false" {
            return Some(LiveState::Persistent);
        }
        match Self::from_token(token)? {
            LiveState::Loading | LiveState::InstallingDistribution => None,
            state if state.is_error() => None,
            state => Some(state),
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            LiveState::ErrorLiveMode
                | LiveState::ErrorGetWritableFsLists
                | LiveState::ErrorLiveModeInvalidOutput
                | LiveState::ErrorGetWritableFsListsInvalidOutput
        )
    }

    /// States whose detail strings are the safe/unsafe filesystem lists.
    pub fn is_semi_persistent(self) -> bool {
        matches!(
            self,
            LiveState::IsoLiveSemiPersistent
                | LiveState::IsoLiveSemiPersistentUnsafe
                | LiveState::GrubLiveSemiPersistent
                | LiveState::GrubLiveSemiPersistentUnsafe
        )
    }

    /// States that do not warrant a user notification on their own.
    pub fn is_benign(self) -> bool {
        matches!(
            self,
            LiveState::IsoLive | LiveState::GrubLive | LiveState::Persistent
        )
    }
}

impl fmt::Display for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedNotification {
    pub first_observation: bool,
    pub message: String,
}

/// One line of the daemon feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedEvent {
    pub feed_version: u32,
    pub recorded_at: String,
    pub state: LiveState,
    pub detail_one: String,
    pub detail_two: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<FeedNotification>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Parses and validates a single feed line.
pub fn parse_feed_event(line: &str) -> Result<FeedEvent, ErrorInfo> {
    if line.len() > MAX_FEED_LINE_BYTES {
        return Err(ErrorInfo::new(
            "line_too_large",
            "feed line exceeded maximum size",
        ));
    }
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return Err(ErrorInfo::new("empty_line", "feed line was empty"));
    }

    let event: FeedEvent = serde_json::from_str(trimmed).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("feed line was not valid JSON: {}", err),
        )
    })?;

    if event.feed_version != FEED_VERSION {
        return Err(ErrorInfo::new(
            "version_mismatch",
            format!(
                "unsupported feed version {} (expected {})",
                event.feed_version, FEED_VERSION
            ),
        ));
    }

    if DateTime::parse_from_rfc3339(&event.recorded_at).is_err() {
        return Err(ErrorInfo::new(
            "invalid_timestamp",
            "recorded_at must be an RFC3339 timestamp",
        ));
    }

    Ok(event)
}
