//! Core types shared by the monitor, the one-shot query and the binaries.

use serde::{Deserialize, Serialize};

pub use livecheck_protocol::LiveState;

// ═══════════════════════════════════════════════════════════════════════════════
// Published Snapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// The authoritative `(state, detail1, detail2)` triple.
///
/// For live and semi-persistent states the details are the rendered safe and
/// unsafe writable filesystem lists. For error states they are the probe's
/// combined output and its exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub state: LiveState,
    pub detail_one: String,
    pub detail_two: String,
}

impl LiveSnapshot {
    pub fn new(state: LiveState, detail_one: impl Into<String>, detail_two: impl Into<String>) -> Self {
        Self {
            state,
            detail_one: detail_one.into(),
            detail_two: detail_two.into(),
        }
    }

    /// A snapshot with empty detail strings.
    pub fn bare(state: LiveState) -> Self {
        Self::new(state, "", "")
    }

    pub fn loading() -> Self {
        Self::bare(LiveState::Loading)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Writable Filesystems
// ═══════════════════════════════════════════════════════════════════════════════

/// Writable mounts split by how risky they are for a live session.
///
/// Order follows the input; duplicates are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritableFilesystemSet {
    pub safe: Vec<String>,
    #[serde(rename = "unsafe")]
    pub unsafe_: Vec<String>,
}

impl WritableFilesystemSet {
    pub fn is_empty(&self) -> bool {
        self.safe.is_empty() && self.unsafe_.is_empty()
    }
}

/// How filesystem lists are rendered into detail strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailFormat {
    /// `<li>path</li>` items, for rich-text consumers.
    #[default]
    Html,
    /// `  - path` lines, for terminals.
    PlainText,
}

impl DetailFormat {
    pub fn render_list(self, entries: &[String]) -> String {
        match self {
            DetailFormat::Html => {
                if entries.is_empty() {
                    return "<li>none</li>".to_string();
                }
                entries
                    .iter()
                    .map(|entry| format!("<li>{}</li>", entry))
                    .collect()
            }
            DetailFormat::PlainText => {
                if entries.is_empty() {
                    return "  - none".to_string();
                }
                entries
                    .iter()
                    .map(|entry| format!("  - {}", entry))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    }
}
