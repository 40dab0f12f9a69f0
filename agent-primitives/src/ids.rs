//! Kernel identifier type.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Opaque identifier for a kernel owned by a `KernelManager`.
///
/// The Agent Manager treats this as a handle only and never inspects or
/// parses its contents.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KernelId(Uuid);

impl KernelId {
    /// Generates a random kernel identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for KernelId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for KernelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for KernelId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<KernelId> for Uuid {
    fn from(value: KernelId) -> Self {
        value.0
    }
}

impl FromStr for KernelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(Error::from)?;
        Ok(Self::from_uuid(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_kernel_id() {
        let id = KernelId::random();
        let parsed = id.to_string().parse::<KernelId>().expect("parse");
        assert_eq!(id, parsed);
    }
}
