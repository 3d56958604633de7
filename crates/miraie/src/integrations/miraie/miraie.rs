use std::collections::HashMap;
use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Zoned;
use jiff::tz::TimeZone;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::DOMAIN;
use super::client::Callback;
use super::client::Connector;
use super::client::Hub;
use super::client::Subscription;
use super::climate::Climate;
use super::config::Config;
use super::sensor::EnergySensor;
use super::sensor::UpdateOutcome;
use super::switch::DisplaySwitch;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;
use crate::engine::unique_entity_id;

type SharedSensor = Arc<Mutex<EnergySensor>>;

fn boxed(e: super::Error) -> Box<dyn Error + Send> {
    Box::new(e)
}

/// Entities created for the account's devices during setup
#[derive(Default)]
struct Entities {
    climates: HashMap<String, Climate>,
    switches: HashMap<String, DisplaySwitch>,
    sensors: Vec<SharedSensor>,
}

impl Entities {
    /// Re-read a climate or switch entity
    fn read_state(&self, entity_id: &str) -> Option<EntityState> {
        if let Some(climate) = self.climates.get(entity_id) {
            return Some(climate.state());
        }
        self.switches.get(entity_id).map(|switch| switch.state())
    }
}

/// mirAIe integration for the engine
///
/// Logs in to the vendor cloud, exposes every air conditioner on the account
/// and keeps the engine's view of them current from device pushes and periodic
/// energy polls.
pub struct MiraieIntegration {
    connector: Arc<dyn Connector>,
    config: Config,
    time_zone: TimeZone,
    hub: Option<Arc<dyn Hub>>,
    entities: Arc<Entities>,
    /// Push callbacks; dropping them unregisters from the devices
    subscriptions: Vec<Subscription>,
    refresh_task: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    to_engine: Option<FromIntegrationSender>,
}

impl MiraieIntegration {
    pub fn new(connector: Arc<dyn Connector>, config: &Config, time_zone: TimeZone) -> Self {
        Self {
            connector,
            config: config.clone(),
            time_zone,
            hub: None,
            entities: Arc::new(Entities::default()),
            subscriptions: Vec::new(),
            refresh_task: None,
            poll_task: None,
            to_engine: None,
        }
    }

    fn now(time_zone: &TimeZone) -> Zoned {
        Zoned::now().with_time_zone(time_zone.clone())
    }

    /// One climate, display switch and set of energy sensors per device.
    ///
    /// Devices may share a name, so ids already handed out get a numeric
    /// suffix in discovery order.
    fn build_entities(&self, hub: &dyn Hub) -> Entities {
        let mut entities = Entities::default();
        let mut taken = HashSet::new();
        let mut claim = |base: &str| {
            let entity_id = unique_entity_id(base, &taken);
            taken.insert(entity_id.clone());
            entity_id
        };

        for device in hub.devices() {
            info!(
                "Found mirAIe device {} ({})",
                device.friendly_name(),
                device.id()
            );

            let climate = Climate::new(device.clone());
            let entity_id = claim(climate.entity_id());
            let climate = climate.with_entity_id(entity_id);
            entities
                .climates
                .insert(climate.entity_id().to_string(), climate);

            let switch = DisplaySwitch::new(device.clone());
            let entity_id = claim(switch.entity_id());
            let switch = switch.with_entity_id(entity_id);
            entities
                .switches
                .insert(switch.entity_id().to_string(), switch);

            for sensor in EnergySensor::for_device(&device, self.config.cutoff_hour) {
                let entity_id = claim(sensor.entity_id());
                let sensor = sensor.with_entity_id(entity_id);
                entities.sensors.push(Arc::new(Mutex::new(sensor)));
            }
        }
        entities
    }

    /// Update one sensor, logging rather than returning vendor failures
    async fn update_sensor(sensor: &mut EnergySensor, hub: &dyn Hub, now: &Zoned) {
        match sensor.update(hub, now).await {
            Ok(UpdateOutcome::Updated) => {
                debug!("Updated {}: {:?}", sensor.entity_id(), sensor.value());
            }
            Ok(UpdateOutcome::Skipped) => {}
            Err(e) => warn!("Failed to update {}: {}", sensor.entity_id(), e),
        }
    }

    /// Update every sensor in turn and report each one's state after its update
    async fn poll_sensors(
        hub: &dyn Hub,
        sensors: &[SharedSensor],
        time_zone: &TimeZone,
        to_engine: &FromIntegrationSender,
    ) {
        let now = Self::now(time_zone);
        for sensor in sensors {
            let mut sensor = sensor.lock().await;
            Self::update_sensor(&mut sensor, hub, &now).await;
            Self::report_state_static(sensor.entity_id(), sensor.state(), to_engine).await;
        }
    }

    async fn poll_task(
        hub: Arc<dyn Hub>,
        sensors: Vec<SharedSensor>,
        time_zone: TimeZone,
        interval: Duration,
        to_engine: FromIntegrationSender,
    ) {
        // The first tick of a plain interval fires at once; setup already polled
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            debug!("Polling energy consumption for {} sensors", sensors.len());
            Self::poll_sensors(hub.as_ref(), &sensors, &time_zone, &to_engine).await;
        }
    }

    /// Drain push notifications, re-reading and reporting each named entity
    async fn refresh_task(
        entities: Arc<Entities>,
        mut refresh_rx: mpsc::UnboundedReceiver<String>,
        to_engine: FromIntegrationSender,
    ) {
        while let Some(entity_id) = refresh_rx.recv().await {
            match entities.read_state(&entity_id) {
                Some(state) => Self::report_state_static(&entity_id, state, &to_engine).await,
                None => warn!("Status push for unknown entity {}", entity_id),
            }
        }
    }

    async fn register_entity_static(entity: &dyn Entity, to_engine: &FromIntegrationSender) {
        let msg = FromIntegrationMessage::EntityDiscovered {
            registration: entity.registration(),
            integration_name: DOMAIN.to_string(),
        };
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send EntityDiscovered message: {}", e);
        } else {
            info!("Registered entity: {}", entity.entity_id());
        }
        Self::report_state_static(entity.entity_id(), entity.state(), to_engine).await;
    }

    async fn report_state_static(
        entity_id: &str,
        state: EntityState,
        to_engine: &FromIntegrationSender,
    ) {
        let msg = FromIntegrationMessage::StateChanged {
            entity_id: entity_id.to_string(),
            state,
        };
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send StateChanged message: {}", e);
        }
    }

    async fn notify_entity_removed_static(entity_id: &str, to_engine: &FromIntegrationSender) {
        let msg = FromIntegrationMessage::EntityRemoved {
            entity_id: entity_id.to_string(),
        };
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send EntityRemoved message: {}", e);
        } else {
            info!("Notified engine of entity removal: {}", entity_id);
        }
    }

    /// Entity ids of every entity this integration registered
    async fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entities
            .climates
            .keys()
            .chain(self.entities.switches.keys())
            .cloned()
            .collect();
        for sensor in &self.entities.sensors {
            ids.push(sensor.lock().await.entity_id().to_string());
        }
        ids
    }
}

#[async_trait]
impl Integration for MiraieIntegration {
    fn name(&self) -> &str {
        DOMAIN
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        info!("Logging in to mirAIe as {}", self.config.username);
        let hub = self
            .connector
            .connect(&self.config.credentials())
            .await
            .map_err(|e| boxed(e.into()))?;
        info!("Logged in to mirAIe");

        let entities = self.build_entities(hub.as_ref());

        // Sensors report their first reading together with their registration
        let now = Self::now(&self.time_zone);
        for sensor in &entities.sensors {
            Self::update_sensor(&mut *sensor.lock().await, hub.as_ref(), &now).await;
        }

        for climate in entities.climates.values() {
            Self::register_entity_static(climate, &tx).await;
        }
        for switch in entities.switches.values() {
            Self::register_entity_static(switch, &tx).await;
        }
        for sensor in &entities.sensors {
            Self::register_entity_static(&*sensor.lock().await, &tx).await;
        }

        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let on_update = |entity_id: &str| -> Callback {
            let refresh_tx = refresh_tx.clone();
            let entity_id = entity_id.to_string();
            Arc::new(move || {
                // The refresh task is gone once we shut down
                let _ = refresh_tx.send(entity_id.clone());
            })
        };
        for climate in entities.climates.values() {
            self.subscriptions
                .push(climate.attach(on_update(climate.entity_id())));
        }
        for switch in entities.switches.values() {
            self.subscriptions
                .push(switch.attach(on_update(switch.entity_id())));
        }

        self.entities = Arc::new(entities);
        self.refresh_task = Some(tokio::spawn(Self::refresh_task(
            self.entities.clone(),
            refresh_rx,
            tx.clone(),
        )));
        self.poll_task = Some(tokio::spawn(Self::poll_task(
            hub.clone(),
            self.entities.sensors.clone(),
            self.time_zone.clone(),
            self.config.poll_interval(),
            tx,
        )));
        self.hub = Some(hub);

        info!(
            "mirAIe integration ready with {} devices",
            self.entities.climates.len()
        );
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::ClimateCommand { entity_id, command } => {
                info!("Handling climate command for {}: {:?}", entity_id, command);
                let climate = self
                    .entities
                    .climates
                    .get(&entity_id)
                    .ok_or_else(|| boxed(super::Error::UnknownEntity(entity_id.clone())))?;
                climate.handle(command).await.map_err(boxed)?;
            }
            ToIntegrationMessage::SwitchCommand { entity_id, on } => {
                info!("Handling switch command for {}: on={}", entity_id, on);
                let switch = self
                    .entities
                    .switches
                    .get(&entity_id)
                    .ok_or_else(|| boxed(super::Error::UnknownEntity(entity_id.clone())))?;
                switch.set(on).await.map_err(boxed)?;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("mirAIe integration shutting down");

        self.subscriptions.clear();
        for task in [self.refresh_task.take(), self.poll_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }

        if let Some(hub) = self.hub.take() {
            hub.close_session().await;
        }

        if let Some(to_engine) = self.to_engine.take() {
            for entity_id in self.entity_ids().await {
                Self::notify_entity_removed_static(&entity_id, &to_engine).await;
            }
        }
        self.entities = Arc::new(Entities::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::client;
    use super::super::fake::Call;
    use super::super::fake::FakeConnector;
    use super::super::fake::FakeDevice;
    use super::super::fake::FakeHub;
    use super::*;
    use crate::engine::ClimateCommand;
    use crate::engine::Platform;
    use crate::engine::climate::HvacMode;

    fn config() -> Config {
        Config {
            username: "user@example.com".to_string(),
            password: "secret".to_string(),
            enabled: true,
            poll_interval_minutes: 30,
            cutoff_hour: 12,
            timezone: Some("UTC".to_string()),
        }
    }

    fn integration(hub: &Arc<FakeHub>) -> (MiraieIntegration, Arc<FakeConnector>) {
        let connector = FakeConnector::new(hub.clone());
        let integration = MiraieIntegration::new(connector.clone(), &config(), TimeZone::UTC);
        (integration, connector)
    }

    async fn set_up(
        integration: &mut MiraieIntegration,
    ) -> mpsc::Receiver<FromIntegrationMessage> {
        let (tx, rx) = mpsc::channel(100);
        integration.setup(tx).await.unwrap();
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<FromIntegrationMessage>) -> Vec<FromIntegrationMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    fn discovered(messages: &[FromIntegrationMessage]) -> Vec<(String, Platform)> {
        messages
            .iter()
            .filter_map(|msg| match msg {
                FromIntegrationMessage::EntityDiscovered { registration, .. } => {
                    Some((registration.entity_id.clone(), registration.platform))
                }
                _ => None,
            })
            .collect()
    }

    fn sensor_value(messages: &[FromIntegrationMessage], entity_id: &str) -> Option<f64> {
        messages.iter().find_map(|msg| match msg {
            FromIntegrationMessage::StateChanged {
                entity_id: id,
                state: EntityState::Sensor(state),
            } if id == entity_id => Some(state.value),
            _ => None,
        })?
    }

    #[tokio::test]
    async fn test_setup_registers_entities_with_state() {
        let device = FakeDevice::named("ac-1", "Bedroom", "Bedroom AC");
        let hub = Arc::new(FakeHub::with_devices(vec![device.clone()]));
        let (mut integration, connector) = integration(&hub);

        let mut rx = set_up(&mut integration).await;
        let messages = drain(&mut rx);

        assert_eq!(connector.logins(), vec!["user@example.com".to_string()]);
        assert_eq!(messages.len(), 10);
        assert_eq!(
            discovered(&messages),
            vec![
                ("climate.bedroom_ac".to_string(), Platform::Climate),
                ("switch.bedroom_ac_display".to_string(), Platform::Switch),
                ("sensor.bedroom_daily_energy".to_string(), Platform::Sensor),
                ("sensor.bedroom_weekly_energy".to_string(), Platform::Sensor),
                ("sensor.bedroom_monthly_energy".to_string(), Platform::Sensor),
            ]
        );

        // Each discovery is followed by the entity's state
        match (&messages[0], &messages[1]) {
            (
                FromIntegrationMessage::EntityDiscovered { integration_name, .. },
                FromIntegrationMessage::StateChanged {
                    entity_id,
                    state: EntityState::Climate(state),
                },
            ) => {
                assert_eq!(integration_name, "miraie");
                assert_eq!(entity_id, "climate.bedroom_ac");
                assert_eq!(state.hvac_mode, HvacMode::Cool);
                assert_eq!(state.target_temperature, 24.0);
            }
            other => panic!("unexpected messages: {:?}", other),
        }

        // Sensors were polled before they were registered
        assert_eq!(hub.queries().len(), 3);
        assert_eq!(device.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_sensor_does_not_stop_others() {
        let device = FakeDevice::named("ac-1", "Bedroom", "Bedroom AC");
        let hub = Arc::new(FakeHub::with_devices(vec![device]));

        let today = Zoned::now().with_time_zone(TimeZone::UTC).date();
        let yesterday = today.yesterday().unwrap();
        hub.set_consumption(
            client::ConsumptionPeriodType::Daily,
            &yesterday.strftime("%d%m%Y").to_string(),
            4.5,
        );
        hub.set_consumption(
            client::ConsumptionPeriodType::Monthly,
            &yesterday.strftime("%m%Y").to_string(),
            61.0,
        );
        hub.fail_period(client::ConsumptionPeriodType::Weekly, "server error");
        let (mut integration, _) = integration(&hub);

        let mut rx = set_up(&mut integration).await;
        let messages = drain(&mut rx);

        assert_eq!(hub.queries().len(), 3);
        assert_eq!(sensor_value(&messages, "sensor.bedroom_daily_energy"), Some(4.5));
        assert_eq!(sensor_value(&messages, "sensor.bedroom_weekly_energy"), None);
        assert_eq!(
            sensor_value(&messages, "sensor.bedroom_monthly_energy"),
            Some(61.0)
        );
    }

    #[tokio::test]
    async fn test_push_refreshes_state() {
        let device = FakeDevice::new("ac-1", "Bedroom AC");
        let hub = Arc::new(FakeHub::with_devices(vec![device.clone()]));
        let (mut integration, _) = integration(&hub);
        let mut rx = set_up(&mut integration).await;
        drain(&mut rx);
        assert_eq!(device.subscriber_count(), 2);

        device.push_status(|s| {
            s.temperature = 19.0;
            s.display_mode = client::DisplayMode::Off;
        });

        match rx.recv().await.unwrap() {
            FromIntegrationMessage::StateChanged {
                entity_id,
                state: EntityState::Climate(state),
            } => {
                assert_eq!(entity_id, "climate.bedroom_ac");
                assert_eq!(state.target_temperature, 19.0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            FromIntegrationMessage::StateChanged {
                entity_id,
                state: EntityState::Switch(state),
            } => {
                assert_eq!(entity_id, "switch.bedroom_ac_display");
                assert!(!state.on);
                assert_eq!(state.icon.as_deref(), Some("mdi:eye-off-outline"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_switch_icon_follows_pushes() {
        let device = FakeDevice::new("ac-1", "Bedroom AC");
        let hub = Arc::new(FakeHub::with_devices(vec![device.clone()]));
        let (mut integration, _) = integration(&hub);
        let mut rx = set_up(&mut integration).await;
        drain(&mut rx);

        let mut icons = Vec::new();
        for mode in [client::DisplayMode::Off, client::DisplayMode::On] {
            device.push_status(|s| s.display_mode = mode);
            // Climate first, then the switch
            rx.recv().await.unwrap();
            match rx.recv().await.unwrap() {
                FromIntegrationMessage::StateChanged {
                    state: EntityState::Switch(state),
                    ..
                } => icons.push(state.icon),
                other => panic!("unexpected message: {:?}", other),
            }
        }

        assert_eq!(
            icons,
            vec![
                Some("mdi:eye-off-outline".to_string()),
                Some("mdi:eye-outline".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_devices_sharing_a_name_stay_apart() {
        let first = FakeDevice::new("ac-1", "AC");
        let second = FakeDevice::new("ac-2", "AC");
        let hub = Arc::new(FakeHub::with_devices(vec![first.clone(), second.clone()]));
        let (mut integration, _) = integration(&hub);
        let mut rx = set_up(&mut integration).await;

        let mut ids: Vec<String> = discovered(&drain(&mut rx))
            .into_iter()
            .map(|(entity_id, _)| entity_id)
            .collect();
        ids.sort();
        assert_eq!(
            ids,
            vec![
                "climate.ac",
                "climate.ac_2",
                "sensor.ac_daily_energy",
                "sensor.ac_daily_energy_2",
                "sensor.ac_monthly_energy",
                "sensor.ac_monthly_energy_2",
                "sensor.ac_weekly_energy",
                "sensor.ac_weekly_energy_2",
                "switch.ac_display",
                "switch.ac_display_2",
            ]
        );
        assert_eq!(first.subscriber_count(), 2);
        assert_eq!(second.subscriber_count(), 2);

        integration
            .handle_message(ToIntegrationMessage::ClimateCommand {
                entity_id: "climate.ac".to_string(),
                command: ClimateCommand::TurnOff,
            })
            .await
            .unwrap();
        integration
            .handle_message(ToIntegrationMessage::ClimateCommand {
                entity_id: "climate.ac_2".to_string(),
                command: ClimateCommand::SetTemperature(20.0),
            })
            .await
            .unwrap();

        assert_eq!(first.calls(), vec![Call::TurnOff]);
        assert_eq!(second.calls(), vec![Call::SetTemperature(20.0)]);

        second.push_status(|s| s.temperature = 21.0);
        match rx.recv().await.unwrap() {
            FromIntegrationMessage::StateChanged { entity_id, .. } => {
                assert_eq!(entity_id, "climate.ac_2");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_reports_every_sensor() {
        let device = FakeDevice::new("ac-1", "Bedroom AC");
        let hub = Arc::new(FakeHub::with_devices(vec![device]));
        let (mut integration, _) = integration(&hub);
        let mut rx = set_up(&mut integration).await;
        drain(&mut rx);

        let mut polled = Vec::new();
        for _ in 0..3 {
            match rx.recv().await.unwrap() {
                FromIntegrationMessage::StateChanged {
                    entity_id,
                    state: EntityState::Sensor(_),
                } => polled.push(entity_id),
                other => panic!("unexpected message: {:?}", other),
            }
        }

        assert_eq!(
            polled,
            vec![
                "sensor.bedroom_ac_daily_energy",
                "sensor.bedroom_ac_weekly_energy",
                "sensor.bedroom_ac_monthly_energy",
            ]
        );
        assert_eq!(hub.queries().len(), 6);
    }

    #[tokio::test]
    async fn test_commands_are_routed() {
        let device = FakeDevice::new("ac-1", "Bedroom AC");
        device.update_status(|s| s.power_mode = client::PowerMode::Off);
        let hub = Arc::new(FakeHub::with_devices(vec![device.clone()]));
        let (mut integration, _) = integration(&hub);
        let _rx = set_up(&mut integration).await;

        integration
            .handle_message(ToIntegrationMessage::ClimateCommand {
                entity_id: "climate.bedroom_ac".to_string(),
                command: ClimateCommand::SetHvacMode(HvacMode::Heat),
            })
            .await
            .unwrap();
        integration
            .handle_message(ToIntegrationMessage::SwitchCommand {
                entity_id: "switch.bedroom_ac_display".to_string(),
                on: false,
            })
            .await
            .unwrap();

        assert_eq!(
            device.calls(),
            vec![
                Call::TurnOn,
                Call::SetHvacMode(client::HvacMode::Heat),
                Call::SetDisplayMode(client::DisplayMode::Off),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_entity_is_an_error() {
        let hub = Arc::new(FakeHub::with_devices(vec![FakeDevice::new(
            "ac-1",
            "Bedroom AC",
        )]));
        let (mut integration, _) = integration(&hub);
        let _rx = set_up(&mut integration).await;

        let err = integration
            .handle_message(ToIntegrationMessage::SwitchCommand {
                entity_id: "switch.hallway_display".to_string(),
                on: true,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown entity: switch.hallway_display");
    }

    #[tokio::test]
    async fn test_shutdown_detaches_and_removes_entities() {
        let device = FakeDevice::new("ac-1", "Bedroom AC");
        let hub = Arc::new(FakeHub::with_devices(vec![device.clone()]));
        let (mut integration, _) = integration(&hub);
        let mut rx = set_up(&mut integration).await;
        drain(&mut rx);

        integration.shutdown().await.unwrap();

        assert_eq!(device.subscriber_count(), 0);
        assert_eq!(hub.sessions_closed(), 1);

        let mut removed: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|msg| match msg {
                FromIntegrationMessage::EntityRemoved { entity_id } => Some(entity_id),
                _ => None,
            })
            .collect();
        removed.sort();
        assert_eq!(
            removed,
            vec![
                "climate.bedroom_ac",
                "sensor.bedroom_ac_daily_energy",
                "sensor.bedroom_ac_monthly_energy",
                "sensor.bedroom_ac_weekly_energy",
                "switch.bedroom_ac_display",
            ]
        );

        // Pushes after shutdown go nowhere
        device.push_status(|s| s.temperature = 18.0);
        assert!(rx.try_recv().is_err());
    }
}
