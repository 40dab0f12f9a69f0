//! Pluggable execution of an agent's `startupScript` against a freshly
//! attached kernel.
//!
//! The script's contents are opaque to this crate (the code-execution
//! backend is out of scope); a host wires in a runner that knows how to run
//! one against whatever interpreter its kernels actually embed.

use async_trait::async_trait;

use agent_kernel::Kernel;

use crate::error::AgentStartupError;

/// Runs an agent's startup script against a newly attached kernel.
#[async_trait]
pub trait StartupScriptRunner: Send + Sync {
    /// Executes `script` against `kernel`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentStartupError`] if the script fails.
    async fn run(&self, kernel: &Kernel, script: &str) -> Result<(), AgentStartupError>;
}

/// Startup-script runner that does nothing and always succeeds.
///
/// The default until a host wires in a runner that actually understands the
/// scripts it hands out.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopStartupScriptRunner;

#[async_trait]
impl StartupScriptRunner for NoopStartupScriptRunner {
    async fn run(&self, _kernel: &Kernel, _script: &str) -> Result<(), AgentStartupError> {
        Ok(())
    }
}
