//! Late-wired collaborator that answers "how many agents use this model".
//!
//! The registry needs an agent count to reject `removeModel` on an in-use
//! entry and to rank `getModelStats`, but the agents live in a separate
//! crate (`agent-manager`) that itself depends on this one. Rather than
//! create a dependency cycle, the registry is constructed without this
//! knowledge and the owner wires in a usage probe afterward, mirroring the
//! teacher's own late-wiring design note for its kernel-manager reference.

use crate::settings::ModelUsageKey;

/// Counts how many agents currently resolve to a given `(model, baseURL)`
/// pair. Implemented by the Agent Manager and injected into the registry
/// via [`crate::ModelRegistry::set_usage_provider`].
pub trait ModelUsageProvider: Send + Sync {
    /// Returns the number of agents whose resolved model settings match
    /// `key`.
    fn agents_using(&self, key: &ModelUsageKey) -> usize;
}

/// Usage provider that reports zero agents for every key.
///
/// Used as the default before a real provider is wired in, and in tests that
/// don't care about usage accounting.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoUsage;

impl ModelUsageProvider for NoUsage {
    fn agents_using(&self, _key: &ModelUsageKey) -> usize {
        0
    }
}
