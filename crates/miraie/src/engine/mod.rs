pub mod climate;
mod device;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod integration;
mod message;
pub mod state;

pub use device::DeviceInfo;
pub use engine::Engine;
pub use entity::Entity;
pub use entity::EntityRegistration;
pub use entity::Platform;
pub use entity::slugify;
pub use entity::unique_entity_id;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::ClimateCommand;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use state::ClimateState;
pub use state::EntityState;
pub use state::SensorState;
pub use state::State;
pub use state::SwitchState;
