//! The language an agent's kernel is declared to run.

use serde::{Deserialize, Serialize};

/// Declared language of an agent's code-execution kernel.
///
/// This is descriptive metadata carried on [`crate::Agent`] and
/// [`crate::AgentConfig`]; the backing [`agent_kernel::KernelManager`] is not
/// selected per-language (the specifics of the code-execution backend are
/// out of scope), so every kernel type maps onto the same injected manager.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelType {
    /// Python-flavored kernel.
    Python,
    /// TypeScript-flavored kernel.
    TypeScript,
    /// JavaScript-flavored kernel.
    JavaScript,
}

impl KernelType {
    /// Returns the lowercase language tag used in `createKernel` options.
    #[must_use]
    pub const fn lang(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
        }
    }
}
