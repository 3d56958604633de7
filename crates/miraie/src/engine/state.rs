use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::climate::FanMode;
use super::climate::HorizontalSwing;
use super::climate::HvacMode;
use super::climate::Preset;
use super::climate::VerticalSwing;

/// State of a climate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    /// Whether the device behind the entity is reachable.
    pub available: bool,

    pub hvac_mode: HvacMode,

    /// Measured room temperature, if the device reports one.
    pub current_temperature: Option<f64>,

    pub target_temperature: f64,

    pub fan_mode: FanMode,

    pub preset_mode: Preset,

    pub swing_mode: VerticalSwing,

    pub swing_horizontal_mode: HorizontalSwing,
}

/// State of a switch entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchState {
    pub on: bool,

    /// Icon for the current state, when it differs between on and off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// State of a numeric sensor entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorState {
    /// Current reading; `None` renders as "unknown".
    pub value: Option<f64>,

    /// Start of the accumulation period for `total` sensors.
    pub last_reset: Option<jiff::Zoned>,
}

/// State of any entity, tagged by platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum EntityState {
    Climate(ClimateState),
    Switch(SwitchState),
    Sensor(SensorState),
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub climates: HashMap<String, ClimateState>,
    pub switches: HashMap<String, SwitchState>,
    pub sensors: HashMap<String, SensorState>,
}

impl State {
    /// Record the latest state of an entity.
    pub fn apply(&mut self, entity_id: String, state: EntityState) {
        match state {
            EntityState::Climate(s) => {
                self.climates.insert(entity_id, s);
            }
            EntityState::Switch(s) => {
                self.switches.insert(entity_id, s);
            }
            EntityState::Sensor(s) => {
                self.sensors.insert(entity_id, s);
            }
        }
    }

    /// Forget an entity on every platform.
    pub fn remove(&mut self, entity_id: &str) {
        self.climates.remove(entity_id);
        self.switches.remove(entity_id);
        self.sensors.remove(entity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_and_remove() {
        let mut state = State::default();
        state.apply(
            "switch.bedroom_display".to_string(),
            EntityState::Switch(SwitchState { on: true, icon: None }),
        );
        state.apply(
            "sensor.bedroom_daily_energy".to_string(),
            EntityState::Sensor(SensorState {
                value: Some(1.5),
                last_reset: None,
            }),
        );
        assert_eq!(state.switches.len(), 1);
        assert_eq!(state.sensors["sensor.bedroom_daily_energy"].value, Some(1.5));

        state.remove("switch.bedroom_display");
        assert!(state.switches.is_empty());
        assert_eq!(state.sensors.len(), 1);
    }

    #[test]
    fn test_climate_state_json() {
        let state = ClimateState {
            available: true,
            hvac_mode: HvacMode::FanOnly,
            current_temperature: Some(27.0),
            target_temperature: 24.0,
            fan_mode: FanMode::Off,
            preset_mode: Preset::Converti(70),
            swing_mode: VerticalSwing::V2,
            swing_horizontal_mode: HorizontalSwing::H0,
        };
        insta::assert_snapshot!(
            serde_json::to_string(&state).unwrap(),
            @r#"{"available":true,"hvac_mode":"fan_only","current_temperature":27.0,"target_temperature":24.0,"fan_mode":"off","preset_mode":"cv 70","swing_mode":"V2","swing_horizontal_mode":"H0"}"#
        );
    }
}
