//! Configuration lifecycle state machine.
//!
//! # States
//! - Stopped: registrations made now are persistent
//! - Starting: configured mappings are installed; still persistent
//! - Started: serving; registrations made now are ephemeral
//! - Stopping: ephemeral registrations have just been pruned
//!
//! # State Transitions
//! ```text
//! Stopped → Starting → Started → Stopping → Stopped
//! ```
//!
//! # Design Decisions
//! - Strictly linear: any skip is an `IllegalTransition`
//! - One mutex serializes transitions with registrations, so an add racing
//!   a transition is attributed to the state after it
//! - The entry action of a transition runs under the same lock

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl LifecycleState {
    /// The only state this one may move to.
    pub fn next(self) -> Self {
        match self {
            LifecycleState::Stopped => LifecycleState::Starting,
            LifecycleState::Starting => LifecycleState::Started,
            LifecycleState::Started => LifecycleState::Stopping,
            LifecycleState::Stopping => LifecycleState::Stopped,
        }
    }

    /// Whether a registration made in this state survives the next stop.
    ///
    /// Stopping counts as persistent: pruning already happened on entry.
    pub fn registers_persistent(self) -> bool {
        !matches!(self, LifecycleState::Started)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Started => "started",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("illegal lifecycle transition from {from} to {to}")]
    IllegalTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// Tracks the current state and serializes everything that depends on it.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Stopped),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().expect("lifecycle mutex poisoned")
    }

    /// Run `f` with the state held stable for its duration.
    pub fn with_state<R>(&self, f: impl FnOnce(LifecycleState) -> R) -> R {
        let state = self.state.lock().expect("lifecycle mutex poisoned");
        f(*state)
    }

    /// Move to `to`, then run `on_enter` before releasing the lock.
    pub fn advance<R>(
        &self,
        to: LifecycleState,
        on_enter: impl FnOnce() -> R,
    ) -> Result<R, LifecycleError> {
        let mut state = self.state.lock().expect("lifecycle mutex poisoned");
        let from = *state;
        if from.next() != to {
            return Err(LifecycleError::IllegalTransition { from, to });
        }
        *state = to;
        tracing::info!(from = %from, to = %to, "Lifecycle transition");
        Ok(on_enter())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
