//! Climate vocabulary shared by the engine and its integrations.
//!
//! These are the host-facing values: what the engine stores in its state
//! snapshot and what commands carry. Integrations translate their device's own
//! modes into these.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

/// HVAC operating mode of a climate entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    Off,
    Auto,
    Cool,
    Heat,
    Dry,
    FanOnly,
}

/// Fan speed of a climate entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FanMode {
    Auto,
    Low,
    Medium,
    High,
    Off,
}

/// Vertical louver position. `V0` is the neutral position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum VerticalSwing {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
}

/// Horizontal louver position. `H0` is the neutral position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum HorizontalSwing {
    H0,
    H1,
    H2,
    H3,
    H4,
    H5,
}

/// A swing request as it arrives through the generic "set swing mode" call.
///
/// The axis is chosen by prefix: `V*` positions the vertical louver, `H*` the
/// horizontal one. An unrecognised position on a known axis resolves to that
/// axis' neutral position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwingMode {
    Vertical(VerticalSwing),
    Horizontal(HorizontalSwing),
}

impl FromStr for SwingMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('V') {
            Ok(Self::Vertical(s.parse().unwrap_or(VerticalSwing::V0)))
        } else if s.starts_with('H') {
            Ok(Self::Horizontal(s.parse().unwrap_or(HorizontalSwing::H0)))
        } else {
            Err(ParseModeError::new("swing mode", s))
        }
    }
}

impl fmt::Display for SwingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertical(v) => write!(f, "{}", v),
            Self::Horizontal(h) => write!(f, "{}", h),
        }
    }
}

/// Converti levels (percent of rated capacity) offered as presets.
pub const CONVERTI_LEVELS: [u8; 8] = [110, 100, 90, 80, 70, 55, 40, 0];

const CONVERTI_PREFIX: &str = "cv";

/// Preset of a climate entity.
///
/// Converti presets render as `"cv <level>"`, e.g. `"cv 70"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    None,
    Eco,
    Boost,
    Converti(u8),
}

impl Preset {
    /// Every preset a converti-capable air conditioner offers, in display order.
    pub fn all() -> Vec<Preset> {
        let mut presets = vec![Preset::None, Preset::Eco, Preset::Boost];
        presets.extend(CONVERTI_LEVELS.iter().map(|level| Preset::Converti(*level)));
        presets
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Eco => f.write_str("eco"),
            Self::Boost => f.write_str("boost"),
            Self::Converti(level) => write!(f, "{} {}", CONVERTI_PREFIX, level),
        }
    }
}

impl FromStr for Preset {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => return Ok(Self::None),
            "eco" => return Ok(Self::Eco),
            "boost" => return Ok(Self::Boost),
            _ => {}
        }

        let level = s
            .split_once(' ')
            .filter(|(prefix, _)| *prefix == CONVERTI_PREFIX)
            .and_then(|(_, level)| level.parse::<u8>().ok())
            .filter(|level| CONVERTI_LEVELS.contains(level))
            .ok_or_else(|| ParseModeError::new("preset", s))?;

        Ok(Self::Converti(level))
    }
}

impl Serialize for Preset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Preset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when a host-facing mode string does not name a known value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseModeError {
    kind: &'static str,
    value: String,
}

impl ParseModeError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Optional features a climate entity may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClimateFeature {
    TargetTemperature,
    FanMode,
    PresetMode,
    SwingMode,
    SwingHorizontalMode,
    TurnOn,
    TurnOff,
}

/// Static capability set advertised when a climate entity is registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateCapabilities {
    pub hvac_modes: Vec<HvacMode>,
    pub preset_modes: Vec<Preset>,
    pub fan_modes: Vec<FanMode>,
    pub swing_modes: Vec<VerticalSwing>,
    pub swing_horizontal_modes: Vec<HorizontalSwing>,
    pub min_temp: f64,
    pub max_temp: f64,
    pub target_temperature_step: f64,
    pub precision: f64,
    pub temperature_unit: &'static str,
    pub supported_features: Vec<ClimateFeature>,
}

impl ClimateCapabilities {
    /// Whether `temperature` lies within the advertised bounds.
    pub fn accepts_temperature(&self, temperature: f64) -> bool {
        (self.min_temp..=self.max_temp).contains(&temperature)
    }
}
