//! Translation between mirAIe device modes and the engine's climate modes.
//!
//! Every conversion here is total. Device values without a host counterpart
//! resolve to a neutral host value instead of failing.

use super::client as vendor;
use super::Error;
use crate::engine::climate as host;

/// Host HVAC mode for a device status. A powered-off unit is `Off` whatever
/// mode it last ran in.
pub fn hvac_mode(power: vendor::PowerMode, mode: vendor::HvacMode) -> host::HvacMode {
    match power {
        vendor::PowerMode::Off => host::HvacMode::Off,
        vendor::PowerMode::On => mode.into(),
    }
}

impl From<vendor::HvacMode> for host::HvacMode {
    fn from(mode: vendor::HvacMode) -> Self {
        match mode {
            vendor::HvacMode::Auto => host::HvacMode::Auto,
            vendor::HvacMode::Cool => host::HvacMode::Cool,
            vendor::HvacMode::Heat => host::HvacMode::Heat,
            vendor::HvacMode::Dry => host::HvacMode::Dry,
            vendor::HvacMode::Fan => host::HvacMode::FanOnly,
        }
    }
}

/// Device mode for a host HVAC mode. `Off` is not a device mode: the unit is
/// powered down instead.
pub fn vendor_hvac_mode(mode: host::HvacMode) -> Option<vendor::HvacMode> {
    match mode {
        host::HvacMode::Off => None,
        host::HvacMode::Auto => Some(vendor::HvacMode::Auto),
        host::HvacMode::Cool => Some(vendor::HvacMode::Cool),
        host::HvacMode::Heat => Some(vendor::HvacMode::Heat),
        host::HvacMode::Dry => Some(vendor::HvacMode::Dry),
        host::HvacMode::FanOnly => Some(vendor::HvacMode::Fan),
    }
}

// The host has no "quiet" fan speed; the unit's quiet setting is shown as off.
impl From<vendor::FanMode> for host::FanMode {
    fn from(mode: vendor::FanMode) -> Self {
        match mode {
            vendor::FanMode::Auto => host::FanMode::Auto,
            vendor::FanMode::Low => host::FanMode::Low,
            vendor::FanMode::Medium => host::FanMode::Medium,
            vendor::FanMode::High => host::FanMode::High,
            vendor::FanMode::Quiet => host::FanMode::Off,
        }
    }
}

impl From<host::FanMode> for vendor::FanMode {
    fn from(mode: host::FanMode) -> Self {
        match mode {
            host::FanMode::Auto => vendor::FanMode::Auto,
            host::FanMode::Low => vendor::FanMode::Low,
            host::FanMode::Medium => vendor::FanMode::Medium,
            host::FanMode::High => vendor::FanMode::High,
            host::FanMode::Off => vendor::FanMode::Quiet,
        }
    }
}

impl From<vendor::SwingMode> for host::VerticalSwing {
    fn from(mode: vendor::SwingMode) -> Self {
        match mode.0 {
            1 => host::VerticalSwing::V1,
            2 => host::VerticalSwing::V2,
            3 => host::VerticalSwing::V3,
            4 => host::VerticalSwing::V4,
            5 => host::VerticalSwing::V5,
            _ => host::VerticalSwing::V0,
        }
    }
}

impl From<host::VerticalSwing> for vendor::SwingMode {
    fn from(mode: host::VerticalSwing) -> Self {
        vendor::SwingMode(match mode {
            host::VerticalSwing::V0 => 0,
            host::VerticalSwing::V1 => 1,
            host::VerticalSwing::V2 => 2,
            host::VerticalSwing::V3 => 3,
            host::VerticalSwing::V4 => 4,
            host::VerticalSwing::V5 => 5,
        })
    }
}

impl From<vendor::SwingMode> for host::HorizontalSwing {
    fn from(mode: vendor::SwingMode) -> Self {
        match mode.0 {
            1 => host::HorizontalSwing::H1,
            2 => host::HorizontalSwing::H2,
            3 => host::HorizontalSwing::H3,
            4 => host::HorizontalSwing::H4,
            5 => host::HorizontalSwing::H5,
            _ => host::HorizontalSwing::H0,
        }
    }
}

impl From<host::HorizontalSwing> for vendor::SwingMode {
    fn from(mode: host::HorizontalSwing) -> Self {
        vendor::SwingMode(match mode {
            host::HorizontalSwing::H0 => 0,
            host::HorizontalSwing::H1 => 1,
            host::HorizontalSwing::H2 => 2,
            host::HorizontalSwing::H3 => 3,
            host::HorizontalSwing::H4 => 4,
            host::HorizontalSwing::H5 => 5,
        })
    }
}

impl From<vendor::PresetMode> for host::Preset {
    fn from(mode: vendor::PresetMode) -> Self {
        match mode {
            vendor::PresetMode::None => host::Preset::None,
            vendor::PresetMode::Eco => host::Preset::Eco,
            vendor::PresetMode::Boost => host::Preset::Boost,
        }
    }
}

/// Host preset for a device status. An active converti limit takes precedence
/// over the preset mode.
pub fn preset(mode: vendor::PresetMode, converti: vendor::ConvertiMode) -> host::Preset {
    match converti.level() {
        Some(level) if converti.is_active() => host::Preset::Converti(level),
        _ => mode.into(),
    }
}

/// Device command that applies a host preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetCommand {
    Preset(vendor::PresetMode),
    Converti(vendor::ConvertiMode),
}

pub fn preset_command(preset: host::Preset) -> Result<PresetCommand, Error> {
    match preset {
        host::Preset::None => Ok(PresetCommand::Preset(vendor::PresetMode::None)),
        host::Preset::Eco => Ok(PresetCommand::Preset(vendor::PresetMode::Eco)),
        host::Preset::Boost => Ok(PresetCommand::Preset(vendor::PresetMode::Boost)),
        host::Preset::Converti(level) => vendor::ConvertiMode::from_level(level)
            .map(PresetCommand::Converti)
            .ok_or(Error::UnsupportedConvertiLevel(level)),
    }
}
