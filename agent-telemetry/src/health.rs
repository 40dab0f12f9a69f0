//! Liveness/readiness snapshot combining Agent Manager and Kernel Manager
//! state.

use agent_kernel::KernelManager;
use agent_manager::{AgentManager, AgentManagerStats};
use serde::Serialize;

/// Aggregate counts a host can expose on a health/readiness endpoint.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct HealthReport {
    /// Total number of agents across all namespaces.
    pub total_agents: usize,
    /// Number of distinct namespaces in use.
    pub namespaces: usize,
    /// Number of agents with a kernel currently attached.
    pub agents_with_kernel: usize,
    /// Number of agents carrying a recorded startup error.
    pub agents_with_startup_error: usize,
    /// Number of kernels the kernel manager is currently tracking, if one is
    /// wired in.
    pub active_kernels: Option<usize>,
}

impl HealthReport {
    /// Snapshots `manager`'s stats, plus `kernel_manager`'s live kernel count
    /// if one is given.
    pub async fn snapshot(manager: &AgentManager, kernel_manager: Option<&dyn KernelManager>) -> Self {
        let AgentManagerStats {
            total_agents,
            namespaces,
            agents_with_kernel,
            agents_with_startup_error,
        } = manager.get_stats().await;

        let active_kernels = match kernel_manager {
            Some(kernel_manager) => Some(kernel_manager.list_kernels().await.len()),
            None => None,
        };

        Self {
            total_agents,
            namespaces,
            agents_with_kernel,
            agents_with_startup_error,
            active_kernels,
        }
    }
}
