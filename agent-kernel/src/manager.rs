//! Kernel manager: creates, looks up, and destroys [`Kernel`] instances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use agent_primitives::KernelId;

use crate::error::{Error, Result};
use crate::interpreter::{Interpreter, ReferenceInterpreter};
use crate::kernel::{Kernel, KernelOptions};

/// Owns the set of kernels a host is running and mediates their creation
/// and destruction.
///
/// Implementations are expected to be cheap to clone and safe to share
/// across tasks; [`InMemoryKernelManager`] is the reference implementation
/// used by tests and by hosts with no external kernel infrastructure.
#[async_trait]
pub trait KernelManager: Send + Sync {
    /// Creates and initializes a new kernel, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the interpreter fails to initialize.
    async fn create_kernel(&self, options: KernelOptions) -> Result<KernelId>;

    /// Returns the kernel registered under `id`, if any.
    async fn get_kernel(&self, id: KernelId) -> Option<Kernel>;

    /// Terminates and forgets the kernel registered under `id`. Idempotent:
    /// destroying an unknown id is not an error.
    async fn destroy_kernel(&self, id: KernelId) -> Result<()>;

    /// Returns the ids of every kernel currently tracked.
    async fn list_kernels(&self) -> Vec<KernelId>;
}

/// Factory for the interpreter backing a newly created kernel.
pub type InterpreterFactory = Arc<dyn Fn() -> Box<dyn Interpreter> + Send + Sync>;

/// In-memory [`KernelManager`] backed by a registry of live kernels. Uses
/// [`ReferenceInterpreter`] by default; pass a custom [`InterpreterFactory`]
/// to back kernels with a real language runtime.
#[derive(Clone)]
pub struct InMemoryKernelManager {
    kernels: Arc<RwLock<HashMap<KernelId, Kernel>>>,
    interpreter_factory: InterpreterFactory,
}

impl InMemoryKernelManager {
    /// Creates a manager whose kernels are backed by [`ReferenceInterpreter`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_interpreter_factory(Arc::new(|| Box::new(ReferenceInterpreter::new()) as Box<dyn Interpreter>))
    }

    /// Creates a manager whose kernels are backed by interpreters built from
    /// `factory`.
    #[must_use]
    pub fn with_interpreter_factory(factory: InterpreterFactory) -> Self {
        Self {
            kernels: Arc::new(RwLock::new(HashMap::new())),
            interpreter_factory: factory,
        }
    }
}

impl Default for InMemoryKernelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KernelManager for InMemoryKernelManager {
    async fn create_kernel(&self, options: KernelOptions) -> Result<KernelId> {
        let id = KernelId::random();
        let interpreter = (self.interpreter_factory)();
        let kernel = Kernel::new(id, interpreter);
        kernel.initialize(options).await?;

        self.kernels.write().await.insert(id, kernel);
        Ok(id)
    }

    async fn get_kernel(&self, id: KernelId) -> Option<Kernel> {
        self.kernels.read().await.get(&id).cloned()
    }

    async fn destroy_kernel(&self, id: KernelId) -> Result<()> {
        let kernel = self.kernels.write().await.remove(&id);
        if let Some(kernel) = kernel {
            kernel.terminate().await;
        }
        Ok(())
    }

    async fn list_kernels(&self) -> Vec<KernelId> {
        self.kernels.read().await.keys().copied().collect()
    }
}

/// Looks up a kernel by id, returning [`Error::NotFound`] if absent.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if no kernel is registered under `id`.
pub async fn require_kernel(manager: &dyn KernelManager, id: KernelId) -> Result<Kernel> {
    manager.get_kernel(id).await.ok_or(Error::NotFound { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_then_destroy_round_trips() {
        let manager = InMemoryKernelManager::new();
        let id = manager.create_kernel(KernelOptions::default()).await.unwrap();

        assert!(manager.get_kernel(id).await.is_some());
        assert_eq!(manager.list_kernels().await, vec![id]);

        manager.destroy_kernel(id).await.unwrap();
        assert!(manager.get_kernel(id).await.is_none());
    }

    #[tokio::test]
    async fn destroying_an_unknown_id_is_not_an_error() {
        let manager = InMemoryKernelManager::new();
        manager.destroy_kernel(KernelId::random()).await.unwrap();
    }

    #[tokio::test]
    async fn require_kernel_reports_not_found_for_missing_id() {
        let manager = InMemoryKernelManager::new();
        let err = require_kernel(&manager, KernelId::random()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
