//! Embedded kernel runtime: the initialization state machine, streaming
//! execution, the interrupt protocol, and the kernel manager that creates
//! and destroys kernel instances on behalf of a host.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod events;
mod interpreter;
mod kernel;
mod manager;
mod state;

pub use error::{Error, Result};
pub use events::{ExecuteError, ExecuteResult, InputRequest, KernelEvent, StreamData};
pub use interpreter::{
    FilesystemMount, InitOptions, Interpreter, InterpreterError, ReferenceInterpreter,
};
pub use kernel::{ExecuteOutcome, Kernel, KernelOptions, StreamItem};
pub use manager::{require_kernel, InMemoryKernelManager, InterpreterFactory, KernelManager};
pub use state::{KernelState, KernelStateMachine, KernelTransition, StateError, StateResult};
