//! Type-safe message system for the engine
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::climate::FanMode;
use super::climate::HorizontalSwing;
use super::climate::HvacMode;
use super::climate::Preset;
use super::climate::SwingMode;
use super::entity::EntityRegistration;
use super::state::EntityState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        registration: EntityRegistration,
        integration_name: String,
    },

    /// An entity was removed (integration unloaded, device gone, etc.)
    EntityRemoved { entity_id: String },

    /// An entity's state was (re-)read and should replace the stored one
    StateChanged {
        entity_id: String,
        state: EntityState,
    },
}

/// Actions a climate entity accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum ClimateCommand {
    TurnOn,
    TurnOff,
    SetTemperature(f64),
    SetHvacMode(HvacMode),
    SetFanMode(FanMode),
    SetSwingMode(SwingMode),
    SetSwingHorizontalMode(HorizontalSwing),
    SetPresetMode(Preset),
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Command for a climate entity
    ClimateCommand {
        entity_id: String,
        command: ClimateCommand,
    },

    /// Command to switch a switch entity on or off
    SwitchCommand { entity_id: String, on: bool },
}

impl ToIntegrationMessage {
    /// Entity the command is addressed to
    pub fn entity_id(&self) -> &str {
        match self {
            ToIntegrationMessage::ClimateCommand { entity_id, .. } => entity_id,
            ToIntegrationMessage::SwitchCommand { entity_id, .. } => entity_id,
        }
    }
}
