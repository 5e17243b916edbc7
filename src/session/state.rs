use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Recording lifecycle
///
/// Replaces the ad hoc boolean flags of a toggle-driven recorder with
/// explicit transitions: Idle → Recording → Stopping → Stopped, and
/// Stopped → Recording for a fresh take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, never started
    Idle,
    /// Capturing audio
    Recording,
    /// Stop requested; draining tasks and the final chunk
    Stopping,
    /// Fully stopped, device released
    Stopped,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Idle, SessionState::Recording)
                | (SessionState::Recording, SessionState::Stopping)
                | (SessionState::Stopping, SessionState::Stopped)
                | (SessionState::Stopped, SessionState::Recording)
        )
    }

    /// Move to `next`, or fail on an invalid transition
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.can_transition_to(next) {
            bail!("Invalid session transition: {} -> {}", self, next);
        }
        *self = next;
        Ok(())
    }

    pub fn is_recording(self) -> bool {
        self == SessionState::Recording
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}
