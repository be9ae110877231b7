//! Notification policy for live-state changes.
//!
//! Users are warned when entering a risky or error state and told when such a
//! state clears. Startup into a normal state and churn between normal states
//! stay silent.

use serde::{Deserialize, Serialize};

use crate::types::LiveState;

/// Decides whether moving from `previous` to `current` warrants a popup.
pub fn should_notify(previous: LiveState, current: LiveState, is_first_observation: bool) -> bool {
    if is_first_observation {
        return !current.is_benign();
    }
    !current.is_benign() || !previous.is_benign()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub first_observation: bool,
    pub message: String,
}

impl Notification {
    fn for_state(state: LiveState, first_observation: bool) -> Self {
        let message = if first_observation {
            format!("The system's live state is '{}'.", state)
        } else {
            format!(
                "The system's live state has changed. Current state: '{}'.",
                state
            )
        };
        Self {
            first_observation,
            message,
        }
    }
}

/// Tracks the previously observed state across publishes.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    previous: LiveState,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self {
            previous: LiveState::Loading,
        }
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> LiveState {
        self.previous
    }

    /// Records `current` and returns the notification to show, if any.
    pub fn observe(&mut self, current: LiveState) -> Option<Notification> {
        if current == LiveState::Loading {
            return None;
        }
        let first_observation = self.previous == LiveState::Loading;
        let notify = should_notify(self.previous, current, first_observation);
        self.previous = current;

        if notify {
            tracing::debug!(state = %current, first_observation, "Notification due");
            Some(Notification::for_state(current, first_observation))
        } else {
            None
        }
    }
}
