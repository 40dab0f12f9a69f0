//! Kernel initialization/execution state machine.

use thiserror::Error;
use tracing::debug;

use agent_primitives::KernelId;

/// States a kernel occupies across its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    /// Constructed but `initialize` has not yet been called.
    Uninit,
    /// An `initialize` call is in flight.
    Initializing,
    /// Initialized and idle; ready to accept `execute`.
    Active,
    /// An `execute` call is in flight.
    Busy,
    /// Destroyed by the kernel manager; no further calls are permitted.
    Terminated,
}

impl KernelState {
    /// Returns `true` for `Active`.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` for `Busy`.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Returns `true` once terminated.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Events that drive [`KernelState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelTransition {
    /// `initialize`/`setup` was first called.
    BeginInit,
    /// Initialization completed successfully.
    InitSucceeded,
    /// Initialization failed; the kernel may retry.
    InitFailed,
    /// An `execute` call began.
    BeginExecute,
    /// The in-flight `execute` call returned, success or failure.
    EndExecute,
    /// The kernel manager destroyed this kernel.
    Destroy,
}

/// State machine governing a single kernel's lifecycle.
#[derive(Debug, Clone, Copy)]
pub struct KernelStateMachine {
    kernel_id: KernelId,
    state: KernelState,
}

impl KernelStateMachine {
    /// Creates a state machine for `kernel_id`, starting at `Uninit`.
    #[must_use]
    pub const fn new(kernel_id: KernelId) -> Self {
        Self {
            kernel_id,
            state: KernelState::Uninit,
        }
    }

    /// Returns the owning kernel's id.
    #[must_use]
    pub const fn kernel_id(&self) -> KernelId {
        self.kernel_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> KernelState {
        self.state
    }

    /// Applies `event`, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidTransition`] when `event` is not valid
    /// from the current state.
    pub fn transition(&mut self, event: KernelTransition) -> StateResult<KernelState> {
        use KernelTransition::{BeginExecute, BeginInit, Destroy, EndExecute, InitFailed, InitSucceeded};
        use KernelState::{Active, Busy, Initializing, Terminated, Uninit};

        let next = match (self.state, event) {
            (Uninit, BeginInit) => Some(Initializing),
            (Initializing, InitSucceeded) => Some(Active),
            (Initializing, InitFailed) => Some(Uninit),
            (Active, BeginExecute) => Some(Busy),
            (Busy, EndExecute) => Some(Active),
            (_, Destroy) => Some(Terminated),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(StateError::InvalidTransition {
                kernel_id: self.kernel_id,
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            debug!(
                kernel_id = %self.kernel_id,
                ?self.state,
                ?next_state,
                ?event,
                "kernel state transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors raised by [`KernelStateMachine::transition`].
#[derive(Debug, Error)]
pub enum StateError {
    /// `event` is not a valid transition from the current state.
    #[error("invalid kernel state transition from {from:?} via {event:?} for kernel {kernel_id}")]
    InvalidTransition {
        /// The kernel whose transition failed.
        kernel_id: KernelId,
        /// State prior to the attempted transition.
        from: KernelState,
        /// Event that triggered the failure.
        event: KernelTransition,
    },
}

/// Result alias for state machine operations.
pub type StateResult<T> = Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninit_to_active_flow() {
        let id = KernelId::random();
        let mut sm = KernelStateMachine::new(id);

        assert_eq!(sm.state(), KernelState::Uninit);
        sm.transition(KernelTransition::BeginInit).unwrap();
        assert_eq!(sm.state(), KernelState::Initializing);
        sm.transition(KernelTransition::InitSucceeded).unwrap();
        assert!(sm.state().is_active());
    }

    #[test]
    fn failed_init_returns_to_uninit_for_retry() {
        let mut sm = KernelStateMachine::new(KernelId::random());
        sm.transition(KernelTransition::BeginInit).unwrap();
        sm.transition(KernelTransition::InitFailed).unwrap();
        assert_eq!(sm.state(), KernelState::Uninit);
    }

    #[test]
    fn execute_round_trip_toggles_busy() {
        let mut sm = KernelStateMachine::new(KernelId::random());
        sm.transition(KernelTransition::BeginInit).unwrap();
        sm.transition(KernelTransition::InitSucceeded).unwrap();

        sm.transition(KernelTransition::BeginExecute).unwrap();
        assert!(sm.state().is_busy());
        sm.transition(KernelTransition::EndExecute).unwrap();
        assert!(sm.state().is_active());
    }

    #[test]
    fn execute_not_permitted_before_active() {
        let mut sm = KernelStateMachine::new(KernelId::random());
        let err = sm
            .transition(KernelTransition::BeginExecute)
            .expect_err("execute should fail from uninit");
        assert!(matches!(err, StateError::InvalidTransition { .. }));
    }

    #[test]
    fn destroy_is_terminal_from_any_state() {
        let mut sm = KernelStateMachine::new(KernelId::random());
        sm.transition(KernelTransition::Destroy).unwrap();
        assert!(sm.state().is_terminal());
    }
}
