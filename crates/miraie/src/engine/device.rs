use serde::Deserialize;
use serde::Serialize;

/// Device registry record supplied by an integration alongside its entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `(domain, identifier)` pairs that uniquely name the device
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    /// Registry key derived from the first identifier.
    pub fn key(&self) -> Option<String> {
        self.identifiers
            .first()
            .map(|(domain, id)| format!("{}:{}", domain, id))
    }
}

/// A device in the engine's registry.
///
/// A device represents a physical or logical device that contains one or more entities.
#[derive(Debug, Clone)]
pub struct Device {
    pub info: DeviceInfo,
    pub entity_ids: Vec<String>,
}

impl Device {
    pub fn new(info: DeviceInfo) -> Self {
        Self {
            info,
            entity_ids: Vec::new(),
        }
    }

    pub fn add_entity(&mut self, entity_id: String) {
        if !self.entity_ids.contains(&entity_id) {
            self.entity_ids.push(entity_id);
        }
    }

    pub fn remove_entity(&mut self, entity_id: &str) {
        self.entity_ids.retain(|id| id != entity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DeviceInfo {
        DeviceInfo {
            identifiers: vec![("miraie".to_string(), "ac-1".to_string())],
            name: "Bedroom AC".to_string(),
            manufacturer: Some("Panasonic".to_string()),
            model: None,
            sw_version: None,
        }
    }

    #[test]
    fn test_key() {
        assert_eq!(info().key().as_deref(), Some("miraie:ac-1"));
    }

    #[test]
    fn test_add_entity_deduplicates() {
        let mut device = Device::new(info());
        device.add_entity("climate.bedroom_ac".to_string());
        device.add_entity("climate.bedroom_ac".to_string());
        device.add_entity("switch.bedroom_ac_display".to_string());
        assert_eq!(device.entity_ids.len(), 2);

        device.remove_entity("climate.bedroom_ac");
        assert_eq!(device.entity_ids, vec!["switch.bedroom_ac_display"]);
    }
}
