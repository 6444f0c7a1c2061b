//! Session lifecycle state machine.
//!
//! Transitions are validated: an illegal edge is a bug in the caller, and
//! surfaces as an error instead of silently corrupting the lifecycle. The
//! `Error` state is recoverable only by starting a new session.

use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session; nothing in flight.
    Idle,
    /// Capturing audio and reconciling transcripts.
    Listening,
    /// Stop requested; draining queued text and waiting out late events.
    Processing,
    /// Startup or backend failure. Cleared by the next successful start.
    Error,
}

impl SessionState {
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Listening)
                | (Idle, Error)
                | (Listening, Processing)
                | (Listening, Error)
                | (Processing, Idle)
                | (Processing, Error)
                | (Error, Listening)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Listening => "listening",
            SessionState::Processing => "processing",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Shared, transition-checked session state.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<SessionState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    pub fn current(&self) -> SessionState {
        *self.state.lock().expect("state mutex poisoned")
    }

    pub fn transition(&self, next: SessionState) -> Result<()> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if !state.can_transition_to(next) {
            return Err(anyhow!(
                "invalid dictation state transition: {} -> {}",
                *state,
                next
            ));
        }
        log::debug!(target: "sotto::state", "session state: {} -> {}", *state, next);
        *state = next;
        Ok(())
    }

    /// Forces the state back to `Idle` regardless of the current value.
    /// Used when tearing down a superseded or crashed session.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state != SessionState::Idle {
            log::debug!(target: "sotto::state", "session state: {} -> idle (reset)", *state);
            *state = SessionState::Idle;
        }
    }
}
