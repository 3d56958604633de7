use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::DOMAIN;
use super::Error;
use super::client::Callback;
use super::client::ClientResult;
use super::client::Device;
use super::client::PowerMode;
use super::client::Subscription;
use super::modes;
use super::modes::PresetCommand;
use crate::engine::ClimateCommand;
use crate::engine::ClimateState;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Platform;
use crate::engine::climate::ClimateCapabilities;
use crate::engine::climate::ClimateFeature;
use crate::engine::climate::FanMode;
use crate::engine::climate::HorizontalSwing;
use crate::engine::climate::HvacMode;
use crate::engine::climate::Preset;
use crate::engine::climate::SwingMode;
use crate::engine::climate::VerticalSwing;
use crate::engine::slugify;

const MIN_TEMP: f64 = 16.0;
const MAX_TEMP: f64 = 30.0;

/// Switch the unit to `mode`.
///
/// `Off` powers the unit down. Any other mode first powers a switched-off unit
/// on, since the unit ignores mode changes while off, and then sets the mode.
/// Vendor errors are returned as they are; nothing is verified afterwards.
pub async fn set_hvac_mode(device: &dyn Device, mode: HvacMode) -> ClientResult<()> {
    let Some(vendor_mode) = modes::vendor_hvac_mode(mode) else {
        return device.turn_off().await;
    };

    if device.status().power_mode == PowerMode::Off {
        device.turn_on().await?;
    }

    device.set_hvac_mode(vendor_mode).await
}

/// Registry record shared by all entities of a device
pub(super) fn device_info(device: &dyn Device) -> DeviceInfo {
    let details = device.details();
    DeviceInfo {
        identifiers: vec![(DOMAIN.to_string(), device.id().to_string())],
        name: device.friendly_name().to_string(),
        manufacturer: Some(details.brand.clone()),
        model: Some(details.model_number.clone()),
        sw_version: Some(details.firmware_version.clone()),
    }
}

/// Climate entity for one air conditioner
///
/// Holds no state of its own: every read goes to the device's live status.
pub struct Climate {
    entity_id: String,
    device: Arc<dyn Device>,
}

impl Climate {
    pub fn new(device: Arc<dyn Device>) -> Self {
        let entity_id = format!("climate.{}", slugify(device.friendly_name()));
        Self { entity_id, device }
    }

    /// Replace the entity id derived from the device name
    pub fn with_entity_id(self, entity_id: String) -> Self {
        Self { entity_id, ..self }
    }

    pub fn climate_capabilities() -> ClimateCapabilities {
        ClimateCapabilities {
            hvac_modes: vec![
                HvacMode::Auto,
                HvacMode::Cool,
                HvacMode::Heat,
                HvacMode::Off,
                HvacMode::Dry,
                HvacMode::FanOnly,
            ],
            preset_modes: Preset::all(),
            fan_modes: vec![
                FanMode::Auto,
                FanMode::Low,
                FanMode::Medium,
                FanMode::High,
                FanMode::Off,
            ],
            swing_modes: vec![
                VerticalSwing::V0,
                VerticalSwing::V1,
                VerticalSwing::V2,
                VerticalSwing::V3,
                VerticalSwing::V4,
                VerticalSwing::V5,
            ],
            swing_horizontal_modes: vec![
                HorizontalSwing::H0,
                HorizontalSwing::H1,
                HorizontalSwing::H2,
                HorizontalSwing::H3,
                HorizontalSwing::H4,
                HorizontalSwing::H5,
            ],
            min_temp: MIN_TEMP,
            max_temp: MAX_TEMP,
            target_temperature_step: 1.0,
            precision: 1.0,
            temperature_unit: "°C",
            supported_features: vec![
                ClimateFeature::TargetTemperature,
                ClimateFeature::FanMode,
                ClimateFeature::PresetMode,
                ClimateFeature::SwingMode,
                ClimateFeature::TurnOff,
                ClimateFeature::TurnOn,
                ClimateFeature::SwingHorizontalMode,
            ],
        }
    }

    pub fn available(&self) -> bool {
        self.device.status().is_online
    }

    pub fn hvac_mode(&self) -> HvacMode {
        let status = self.device.status();
        modes::hvac_mode(status.power_mode, status.hvac_mode)
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.device.status().room_temperature
    }

    pub fn target_temperature(&self) -> f64 {
        self.device.status().temperature
    }

    pub fn preset_mode(&self) -> Preset {
        let status = self.device.status();
        modes::preset(status.preset_mode, status.converti_mode)
    }

    pub fn fan_mode(&self) -> FanMode {
        self.device.status().fan_mode.into()
    }

    pub fn swing_mode(&self) -> VerticalSwing {
        self.device.status().v_swing_mode.into()
    }

    pub fn swing_horizontal_mode(&self) -> HorizontalSwing {
        self.device.status().h_swing_mode.into()
    }

    /// Read every attribute from one status snapshot
    pub fn climate_state(&self) -> ClimateState {
        let status = self.device.status();
        ClimateState {
            available: status.is_online,
            hvac_mode: modes::hvac_mode(status.power_mode, status.hvac_mode),
            current_temperature: status.room_temperature,
            target_temperature: status.temperature,
            fan_mode: status.fan_mode.into(),
            preset_mode: modes::preset(status.preset_mode, status.converti_mode),
            swing_mode: status.v_swing_mode.into(),
            swing_horizontal_mode: status.h_swing_mode.into(),
        }
    }

    pub async fn turn_on(&self) -> Result<(), Error> {
        self.set_hvac_mode(HvacMode::Cool).await
    }

    pub async fn turn_off(&self) -> Result<(), Error> {
        self.set_hvac_mode(HvacMode::Off).await
    }

    pub async fn set_temperature(&self, temperature: f64) -> Result<(), Error> {
        debug!("Set temperature of {} to {}", self.entity_id, temperature);

        if !Self::climate_capabilities().accepts_temperature(temperature) {
            return Err(Error::TemperatureOutOfRange {
                value: temperature,
                min: MIN_TEMP,
                max: MAX_TEMP,
            });
        }

        Ok(self.device.set_temperature(temperature).await?)
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<(), Error> {
        debug!("Set hvac mode of {} to {}", self.entity_id, mode);
        Ok(set_hvac_mode(self.device.as_ref(), mode).await?)
    }

    pub async fn set_fan_mode(&self, mode: FanMode) -> Result<(), Error> {
        debug!("Set fan mode of {} to {}", self.entity_id, mode);
        Ok(self.device.set_fan_mode(mode.into()).await?)
    }

    pub async fn set_swing_mode(&self, mode: SwingMode) -> Result<(), Error> {
        debug!("Set swing mode of {} to {}", self.entity_id, mode);
        match mode {
            SwingMode::Vertical(v) => self.device.set_v_swing_mode(v.into()).await?,
            SwingMode::Horizontal(h) => self.device.set_h_swing_mode(h.into()).await?,
        }
        Ok(())
    }

    pub async fn set_swing_horizontal_mode(&self, mode: HorizontalSwing) -> Result<(), Error> {
        self.set_swing_mode(SwingMode::Horizontal(mode)).await
    }

    pub async fn set_preset_mode(&self, preset: Preset) -> Result<(), Error> {
        debug!("Set preset mode of {} to {}", self.entity_id, preset);
        match modes::preset_command(preset)? {
            PresetCommand::Preset(mode) => self.device.set_preset_mode(mode).await?,
            PresetCommand::Converti(mode) => self.device.set_converti_mode(mode).await?,
        }
        Ok(())
    }

    /// Execute a command from the engine
    pub async fn handle(&self, command: ClimateCommand) -> Result<(), Error> {
        match command {
            ClimateCommand::TurnOn => self.turn_on().await,
            ClimateCommand::TurnOff => self.turn_off().await,
            ClimateCommand::SetTemperature(t) => self.set_temperature(t).await,
            ClimateCommand::SetHvacMode(mode) => self.set_hvac_mode(mode).await,
            ClimateCommand::SetFanMode(mode) => self.set_fan_mode(mode).await,
            ClimateCommand::SetSwingMode(mode) => self.set_swing_mode(mode).await,
            ClimateCommand::SetSwingHorizontalMode(mode) => {
                self.set_swing_horizontal_mode(mode).await
            }
            ClimateCommand::SetPresetMode(preset) => self.set_preset_mode(preset).await,
        }
    }

    /// Start receiving status pushes; they stop when the subscription is dropped
    pub fn attach(&self, on_update: Callback) -> Subscription {
        debug!("Attaching {} to device {}", self.entity_id, self.device.id());
        Subscription::new(self.device.clone(), on_update)
    }
}

impl Entity for Climate {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn unique_id(&self) -> String {
        self.device.id().to_string()
    }

    fn platform(&self) -> Platform {
        Platform::Climate
    }

    fn name(&self) -> String {
        self.device.friendly_name().to_string()
    }

    fn icon(&self) -> Option<&'static str> {
        Some("mdi:air-conditioner")
    }

    fn translation_key(&self) -> Option<&'static str> {
        Some(DOMAIN)
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(device_info(self.device.as_ref()))
    }

    fn capabilities(&self) -> serde_json::Value {
        match serde_json::to_value(Self::climate_capabilities()) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                warn!("Failed to serialize capabilities of {}: {}", self.entity_id, e);
                serde_json::Value::Null
            }
        }
    }

    fn state(&self) -> EntityState {
        EntityState::Climate(self.climate_state())
    }
}
