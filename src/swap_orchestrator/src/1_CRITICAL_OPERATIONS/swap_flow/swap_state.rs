//! Swap phase tracking and the traversal guard
//!
//! One traversal at a time per orchestrator. A traversal owns a
//! `TraversalGuard`; dropping the guard without finishing it moves the
//! machine to `Error`, so a cancelled future can never leave it wedged in
//! an in-flight phase.

use std::sync::{Mutex, MutexGuard};

use crate::infrastructure::{RecoveryAction, Result, SwapError, SystemError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapPhase {
    Idle,
    AwaitingSession,
    AwaitingApproval,
    Approved,
    Executing,
    Settled,
    Error,
}

impl SwapPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapPhase::Idle => "idle",
            SwapPhase::AwaitingSession => "awaiting_session",
            SwapPhase::AwaitingApproval => "awaiting_approval",
            SwapPhase::Approved => "approved",
            SwapPhase::Executing => "executing",
            SwapPhase::Settled => "settled",
            SwapPhase::Error => "error",
        }
    }

    /// A new swap request may start from here
    pub fn accepts_new_request(&self) -> bool {
        matches!(self, SwapPhase::Idle | SwapPhase::Settled | SwapPhase::Error)
    }

    /// A remote call of the current traversal is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SwapPhase::AwaitingSession | SwapPhase::AwaitingApproval | SwapPhase::Executing
        )
    }

    fn can_advance_to(&self, next: SwapPhase) -> bool {
        use SwapPhase::*;
        matches!(
            (self, next),
            (AwaitingSession, AwaitingApproval)
                | (AwaitingApproval, Approved)
                | (Approved, Executing)
                | (Executing, Settled)
        ) || (next == Error && !matches!(self, Idle | Settled | Error))
    }
}

impl std::fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct MachineState {
    phase: SwapPhase,
    /// A guard currently owns the machine
    owned: bool,
    /// Display refreshes currently reading
    refreshing: usize,
    last_error: Option<SwapError>,
}

pub struct SwapStateMachine {
    state: Mutex<MachineState>,
}

impl Default for SwapStateMachine {
    fn default() -> Self {
        Self {
            state: Mutex::new(MachineState {
                phase: SwapPhase::Idle,
                owned: false,
                refreshing: 0,
                last_error: None,
            }),
        }
    }
}

impl SwapStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SwapPhase {
        self.lock().phase
    }

    /// Reason the last traversal ended in `Error`
    pub fn last_error(&self) -> Option<SwapError> {
        self.lock().last_error.clone()
    }

    /// Take ownership for a traversal starting in one of `from`, moving to `first`
    pub fn begin(&self, from: &[SwapPhase], first: SwapPhase) -> Result<TraversalGuard<'_>> {
        let mut state = self.lock();
        if state.owned || !from.contains(&state.phase) {
            return Err(SwapError::System(SystemError::SwapInProgress {
                phase: state.phase.to_string(),
            }));
        }
        if state.refreshing > 0 {
            return Err(SwapError::System(SystemError::RefreshInProgress {
                readers: state.refreshing,
            }));
        }

        tracing::debug!("🚦 Swap phase {} → {}", state.phase, first);
        state.phase = first;
        state.owned = true;
        if first != SwapPhase::Approved {
            state.last_error = None;
        }
        drop(state);

        Ok(TraversalGuard {
            machine: self,
            armed: true,
            ambiguous: None,
        })
    }

    /// Back to `Idle` from a resting phase
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock();
        if state.owned || state.phase.is_busy() {
            return Err(SwapError::System(SystemError::SwapInProgress {
                phase: state.phase.to_string(),
            }));
        }
        if state.phase != SwapPhase::Idle {
            tracing::info!("↩️ Swap phase {} → idle (reset)", state.phase);
        }
        state.phase = SwapPhase::Idle;
        state.last_error = None;
        Ok(())
    }

    /// Fail unless no traversal owns the machine and no call is outstanding
    pub fn ensure_quiet(&self) -> Result<()> {
        let state = self.lock();
        if state.owned || state.phase.is_busy() {
            return Err(SwapError::System(SystemError::SwapInProgress {
                phase: state.phase.to_string(),
            }));
        }
        Ok(())
    }

    /// Register a display refresh; traversals cannot begin until it is dropped
    pub fn begin_refresh(&self) -> Result<RefreshGuard<'_>> {
        let mut state = self.lock();
        if state.owned || state.phase.is_busy() {
            return Err(SwapError::System(SystemError::SwapInProgress {
                phase: state.phase.to_string(),
            }));
        }
        state.refreshing += 1;
        Ok(RefreshGuard { machine: self })
    }

    fn lock(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared marker held for the duration of a display refresh
pub struct RefreshGuard<'a> {
    machine: &'a SwapStateMachine,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.machine.lock();
        state.refreshing = state.refreshing.saturating_sub(1);
    }
}

/// Exclusive ownership of the machine for one traversal
pub struct TraversalGuard<'a> {
    machine: &'a SwapStateMachine,
    armed: bool,
    /// Set once a non-idempotent call has been sent
    ambiguous: Option<(String, Vec<RecoveryAction>)>,
}

impl<'a> TraversalGuard<'a> {
    pub fn advance(&self, next: SwapPhase) -> Result<()> {
        let mut state = self.machine.lock();
        if !state.phase.can_advance_to(next) {
            return Err(SwapError::System(SystemError::InvalidTransition {
                from: state.phase.to_string(),
                to: next.to_string(),
            }));
        }
        tracing::debug!("🚦 Swap phase {} → {}", state.phase, next);
        state.phase = next;
        Ok(())
    }

    /// From here on an abandoned traversal reports `AmbiguousOutcome`
    pub fn mark_unconfirmed(&mut self, operation: &str, recovery: Vec<RecoveryAction>) {
        self.ambiguous = Some((operation.to_string(), recovery));
    }

    /// Release ownership, leaving the machine in its current phase
    pub fn release(mut self) {
        self.armed = false;
        self.machine.lock().owned = false;
    }

    /// Move to `Error`, record `error`, release, and hand the error back
    pub fn fail(mut self, error: SwapError) -> SwapError {
        self.armed = false;
        let mut state = self.machine.lock();
        tracing::warn!("❌ Swap failed during {}: {}", state.phase, error);
        state.phase = SwapPhase::Error;
        state.last_error = Some(error.clone());
        state.owned = false;
        error
    }
}

impl Drop for TraversalGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.machine.lock();
        let phase = state.phase;
        let error = match self.ambiguous.take() {
            Some((operation, recovery)) => SwapError::AmbiguousOutcome {
                operation,
                reason: format!("traversal abandoned during {}", phase),
                recovery,
            },
            None => SwapError::System(SystemError::Abandoned {
                phase: phase.to_string(),
            }),
        };
        tracing::warn!("⚠️ Swap traversal dropped during {}: {}", phase, error);
        state.phase = SwapPhase::Error;
        state.last_error = Some(error);
        state.owned = false;
    }
}
