//! Kernel execution events published to subscribers.

use std::collections::HashMap;

use serde_json::Value;

use agent_events::BusEvent;

/// A single output chunk from `stream` (stdout/stderr-shaped text).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamData {
    /// Stream name, e.g. `"stdout"` or `"stderr"`.
    pub name: String,
    /// The text chunk.
    pub text: String,
}

/// Structured failure details carried by `execute_error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteError {
    /// Exception type name.
    pub ename: String,
    /// Exception message.
    pub evalue: String,
    /// Formatted traceback lines.
    pub traceback: Vec<String>,
}

/// A successful expression result, keyed by MIME type.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecuteResult {
    /// Monotonically increasing execution counter at the time of this result.
    pub execution_count: u64,
    /// Rendered representations of the value, keyed by MIME type.
    pub data: HashMap<String, Value>,
    /// Arbitrary result metadata.
    pub metadata: HashMap<String, Value>,
}

/// A request for interactive input, emitted when interpreter code calls
/// `input`/`getpass`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputRequest {
    /// Prompt text to show the user.
    pub prompt: String,
    /// Whether input should be masked (a `getpass`-style prompt).
    pub password: bool,
}

/// The full taxonomy of events a kernel may publish, plus the wildcard `*`
/// channel every one of them is also delivered on (via [`agent_events`]).
#[derive(Clone, Debug)]
pub enum KernelEvent {
    /// Raw text written to an output stream.
    Stream(StreamData),
    /// Rich display data, keyed by MIME type.
    DisplayData(HashMap<String, Value>),
    /// An update to previously displayed data.
    UpdateDisplayData(HashMap<String, Value>),
    /// A successful expression result.
    ExecuteResult(ExecuteResult),
    /// A failed execution.
    ExecuteError(ExecuteError),
    /// A request to clear prior output.
    ClearOutput,
    /// An interactive input request.
    InputRequest(InputRequest),
    /// A comm channel was opened.
    CommOpen {
        /// The comm's id.
        comm_id: String,
        /// The comm's target name.
        target_name: String,
    },
    /// A message was sent on an open comm.
    CommMsg {
        /// The comm's id.
        comm_id: String,
        /// The message payload.
        data: Value,
    },
    /// A comm channel was closed.
    CommClose {
        /// The comm's id.
        comm_id: String,
    },
    /// The kernel finished initializing and is ready to execute.
    KernelReady,
    /// The kernel began executing code.
    KernelBusy,
    /// The kernel finished executing code and returned to idle.
    KernelIdle,
    /// The kernel appears stalled (host-detected, not self-reported).
    ExecutionStalled,
    /// The kernel entered an unrecoverable state.
    KernelUnrecoverable {
        /// Human-readable reason.
        reason: String,
    },
    /// The in-flight execution was interrupted.
    ExecutionInterrupted,
    /// The kernel was restarted.
    KernelRestarted,
    /// The kernel was terminated by its manager.
    KernelTerminated,
}

impl BusEvent for KernelEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Stream(_) => "stream",
            Self::DisplayData(_) => "display_data",
            Self::UpdateDisplayData(_) => "update_display_data",
            Self::ExecuteResult(_) => "execute_result",
            Self::ExecuteError(_) => "execute_error",
            Self::ClearOutput => "clear_output",
            Self::InputRequest(_) => "input_request",
            Self::CommOpen { .. } => "comm_open",
            Self::CommMsg { .. } => "comm_msg",
            Self::CommClose { .. } => "comm_close",
            Self::KernelReady => "kernel_ready",
            Self::KernelBusy => "kernel_busy",
            Self::KernelIdle => "kernel_idle",
            Self::ExecutionStalled => "execution_stalled",
            Self::KernelUnrecoverable { .. } => "kernel_unrecoverable",
            Self::ExecutionInterrupted => "execution_interrupted",
            Self::KernelRestarted => "kernel_restarted",
            Self::KernelTerminated => "kernel_terminated",
        }
    }
}
