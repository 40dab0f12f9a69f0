//! Events published by the model registry.

use agent_events::BusEvent;

use crate::settings::ModelSettings;

/// Lifecycle events emitted by [`crate::ModelRegistry`].
#[derive(Clone, Debug)]
pub enum ModelEvent {
    /// A model was added to the registry.
    Added {
        /// The new entry's id.
        id: String,
        /// The settings it was registered with.
        settings: ModelSettings,
    },
    /// A model was removed from the registry.
    Removed {
        /// The removed entry's id.
        id: String,
    },
    /// A model's settings were replaced in place.
    Updated {
        /// The entry's id.
        id: String,
        /// The settings prior to the update.
        old_settings: ModelSettings,
        /// The settings after the update.
        new_settings: ModelSettings,
    },
}

impl BusEvent for ModelEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Added { .. } => "MODEL_ADDED",
            Self::Removed { .. } => "MODEL_REMOVED",
            Self::Updated { .. } => "MODEL_UPDATED",
        }
    }
}
