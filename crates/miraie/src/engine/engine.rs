use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::device::Device;
use super::device::DeviceInfo;
use super::entity::EntityRegistration;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::ClimateCommand;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::State;
use crate::engine::IntegrationContext;
use crate::integrations::Connectors;

/// What the engine remembers about a registered entity
struct EntityEntry {
    integration_name: String,
    registration: EntityRegistration,
}

/// Home automation engine
///
/// This structure handles the flow of events from integrations, routes commands
/// to the integration owning an entity, and maintains a view of the world with
/// State and the device registry.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> registration and owning integration, for routing
    entities: std::sync::Mutex<HashMap<String, EntityEntry>>,

    /// Device registry keyed by `domain:identifier`
    devices: std::sync::Mutex<HashMap<String, Device>>,

    /// Communication channels to integrations (for commands)
    integration_channels: HashMap<String, ToIntegrationSender>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: Vec<JoinHandle<()>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entities: std::sync::Mutex::new(HashMap::new()),
            devices: std::sync::Mutex::new(HashMap::new()),
            integration_channels: HashMap::new(),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: Vec::new(),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every factory in the integration registry against the config and
    /// registers the integrations that are configured and enabled.
    pub fn register_integrations_from_config(
        &mut self,
        cfg: &crate::config::Config,
        connectors: &Connectors,
    ) {
        let ctx = IntegrationContext {
            config: cfg,
            connectors,
        };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        self.integration_channels
            .insert(name.clone(), to_integration_tx);

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        self.integration_handles.push(handle);
    }

    /// Names of the integrations registered so far
    pub fn integration_names(&self) -> Vec<String> {
        self.integration_channels.keys().cloned().collect()
    }

    /// Send a command to an integration
    ///
    /// Routes the command to the appropriate integration based on entity_id.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        let entity_id = msg.entity_id().to_string();

        // Route to the integration that owns this entity
        let entities = self
            .entities
            .lock()
            .map_err(|e| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::other(e.to_string()))
            })?;

        let integration_name = entities
            .get(&entity_id)
            .map(|entry| entry.integration_name.clone())
            .ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("No integration found for entity: {}", entity_id),
                ))
            })?;
        drop(entities);

        let tx = self.integration_channels.get(&integration_name).ok_or_else(
            || -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Integration channel not found: {}", integration_name),
                ))
            },
        )?;

        tx.send(msg)
            .map_err(|e| -> Box<dyn Error + Send> { Box::new(e) })
    }

    /// Send a command to a climate entity
    pub fn send_climate_command(
        &self,
        entity_id: String,
        command: ClimateCommand,
    ) -> Result<(), Box<dyn Error + Send>> {
        self.send_command(ToIntegrationMessage::ClimateCommand { entity_id, command })
    }

    /// Turn a switch entity on or off
    pub fn send_switch_command(
        &self,
        entity_id: String,
        on: bool,
    ) -> Result<(), Box<dyn Error + Send>> {
        self.send_command(ToIntegrationMessage::SwitchCommand { entity_id, on })
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        // Main event loop - only receives FromIntegration messages
        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            if let Err(e) = self.handle_event(msg) {
                warn!("Error handling event: {}", e);
            }
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Stop every integration and wait for their tasks to finish
    ///
    /// Dropping the command channels ends each integration's command loop,
    /// which then runs the integration's own shutdown.
    pub async fn shutdown(&mut self) {
        self.integration_channels.clear();
        for handle in self.integration_handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("Integration task failed: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Registration record of an entity, if it is known
    pub fn entity(&self, entity_id: &str) -> Option<EntityRegistration> {
        self.entities
            .lock()
            .ok()?
            .get(entity_id)
            .map(|entry| entry.registration.clone())
    }

    /// Device registry record and entity ids for a device key (`domain:identifier`)
    pub fn device(&self, key: &str) -> Option<(DeviceInfo, Vec<String>)> {
        self.devices
            .lock()
            .ok()?
            .get(key)
            .map(|d| (d.info.clone(), d.entity_ids.clone()))
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                registration,
                integration_name,
            } => {
                let entity_id = registration.entity_id.clone();
                info!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                if let Some(info) = &registration.device {
                    if let Some(key) = info.key() {
                        if let Ok(mut devices) = self.devices.lock() {
                            let device = devices.entry(key).or_insert_with(|| {
                                info!("Device registered: {}", info.name);
                                Device::new(info.clone())
                            });
                            device.info = info.clone();
                            device.add_entity(entity_id.clone());
                        }
                    }
                }

                // State is not populated until the first state-change message arrives.
                if let Ok(mut entities) = self.entities.lock() {
                    if entities.contains_key(&entity_id) {
                        warn!("Entity {} registered twice, replacing", entity_id);
                    }
                    entities.insert(
                        entity_id,
                        EntityEntry {
                            integration_name,
                            registration,
                        },
                    );
                }
            }
            FromIntegrationMessage::EntityRemoved { entity_id } => {
                info!("Entity removed: {}", entity_id);

                {
                    let mut state = State::clone(&self.state.load());
                    state.remove(&entity_id);
                    self.state.store(Arc::new(state));
                }

                let removed = self
                    .entities
                    .lock()
                    .ok()
                    .and_then(|mut entities| entities.remove(&entity_id));

                let device_key = removed
                    .and_then(|entry| entry.registration.device)
                    .and_then(|info| info.key());
                if let (Some(key), Ok(mut devices)) = (device_key, self.devices.lock()) {
                    if let Some(device) = devices.get_mut(&key) {
                        device.remove_entity(&entity_id);
                        if device.entity_ids.is_empty() {
                            devices.remove(&key);
                        }
                    }
                }
            }
            FromIntegrationMessage::StateChanged { entity_id, state } => {
                info!("State changed: {} -> {:?}", entity_id, state);

                let known = self
                    .entities
                    .lock()
                    .map(|entities| entities.contains_key(&entity_id))
                    .unwrap_or(false);
                if !known {
                    return Err(Box::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("State for unknown entity: {}", entity_id),
                    )));
                }

                let mut snapshot = State::clone(&self.state.load());
                snapshot.apply(entity_id, state);
                self.state.store(Arc::new(snapshot));
            }
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
