use std::sync::Arc;

use tracing::debug;

use super::DOMAIN;
use super::Error;
use super::client::Callback;
use super::client::Device;
use super::client::DisplayMode;
use super::client::Subscription;
use super::climate::device_info;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Platform;
use crate::engine::SwitchState;
use crate::engine::slugify;

/// Switch for the indoor unit's display panel
pub struct DisplaySwitch {
    entity_id: String,
    device: Arc<dyn Device>,
}

impl DisplaySwitch {
    pub fn new(device: Arc<dyn Device>) -> Self {
        let entity_id = format!("switch.{}_display", slugify(device.friendly_name()));
        Self { entity_id, device }
    }

    /// Replace the entity id derived from the device name
    pub fn with_entity_id(self, entity_id: String) -> Self {
        Self { entity_id, ..self }
    }

    pub fn is_on(&self) -> bool {
        self.device.status().display_mode == DisplayMode::On
    }

    pub async fn turn_on(&self) -> Result<(), Error> {
        debug!("Turning on {}", self.entity_id);
        Ok(self.device.set_display_mode(DisplayMode::On).await?)
    }

    pub async fn turn_off(&self) -> Result<(), Error> {
        debug!("Turning off {}", self.entity_id);
        Ok(self.device.set_display_mode(DisplayMode::Off).await?)
    }

    pub async fn set(&self, on: bool) -> Result<(), Error> {
        if on {
            self.turn_on().await
        } else {
            self.turn_off().await
        }
    }

    pub fn attach(&self, on_update: Callback) -> Subscription {
        debug!("Attaching {} to device {}", self.entity_id, self.device.id());
        Subscription::new(self.device.clone(), on_update)
    }
}

impl Entity for DisplaySwitch {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn unique_id(&self) -> String {
        self.device.id().to_string()
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn name(&self) -> String {
        format!("{} Display", self.device.friendly_name())
    }

    fn icon(&self) -> Option<&'static str> {
        if self.is_on() {
            Some("mdi:eye-outline")
        } else {
            Some("mdi:eye-off-outline")
        }
    }

    fn translation_key(&self) -> Option<&'static str> {
        Some(DOMAIN)
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(device_info(self.device.as_ref()))
    }

    fn state(&self) -> EntityState {
        // The icon follows the display, so it travels with every state report
        EntityState::Switch(SwitchState {
            on: self.is_on(),
            icon: self.icon().map(str::to_string),
        })
    }
}
