//! Error taxonomy for the kernel runtime.

use thiserror::Error;

use crate::interpreter::InterpreterError;
use crate::state::StateError;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by [`crate::Kernel`] operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested operation is not valid in the kernel's current state.
    #[error(transparent)]
    State(#[from] StateError),

    /// The interpreter reported a failure outside of `execute` (currently
    /// only possible during `initialize`).
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),

    /// No kernel is registered under the requested id.
    #[error("no kernel registered with id {id}")]
    NotFound {
        /// The missing kernel's id, rendered as a string.
        id: String,
    },
}
