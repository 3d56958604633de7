//! Entity abstraction for the engine
//!
//! All entities (climates, switches, sensors) implement the Entity trait. The
//! engine never holds entities directly: integrations describe them with an
//! [`EntityRegistration`] and report their [`EntityState`] as it changes.

use std::collections::HashSet;

use serde::Serialize;
use strum::Display;

use super::device::DeviceInfo;
use super::state::EntityState;

/// Platform an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Climate,
    Switch,
    Sensor,
}

/// Everything the engine records about an entity when it is discovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRegistration {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: Platform,
    pub name: String,
    pub icon: Option<String>,
    pub translation_key: Option<String>,
    pub device: Option<DeviceInfo>,
    /// Platform-specific static attributes (supported modes, units, ...)
    pub capabilities: serde_json::Value,
}

/// Base trait that all entities must implement
pub trait Entity: Send + Sync {
    fn entity_id(&self) -> &str;

    fn unique_id(&self) -> String;

    /// Return the platform type of this entity
    fn platform(&self) -> Platform;

    fn name(&self) -> String;

    fn icon(&self) -> Option<&'static str> {
        None
    }

    fn translation_key(&self) -> Option<&'static str> {
        None
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }

    fn capabilities(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Read the entity's current state
    fn state(&self) -> EntityState;

    fn registration(&self) -> EntityRegistration {
        EntityRegistration {
            entity_id: self.entity_id().to_string(),
            unique_id: self.unique_id(),
            platform: self.platform(),
            name: self.name(),
            icon: self.icon().map(str::to_string),
            translation_key: self.translation_key().map(str::to_string),
            device: self.device_info(),
            capabilities: self.capabilities(),
        }
    }
}

/// Turn a display name into an entity id object part, e.g. `"Living Room AC"`
/// becomes `"living_room_ac"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("unnamed");
    }
    slug
}

/// First of `base`, `base_2`, `base_3`, ... that is not in `taken`.
pub fn unique_entity_id(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
