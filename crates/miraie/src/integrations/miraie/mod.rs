//! mirAIe air conditioners.
//!
//! Each device on the account becomes a climate entity, a display switch and
//! three energy sensors (daily, weekly, monthly consumption).

mod client;
mod climate;
mod config;
#[cfg(test)]
mod fake;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod miraie;
mod modes;
mod sensor;
mod switch;

use anyhow::Context;
use linkme::distributed_slice;

pub use client::Callback;
pub use client::CallbackId;
pub use client::ClientError;
pub use client::ClientResult;
pub use client::Connector;
pub use client::ConsumptionPeriodType;
pub use client::ConvertiMode;
pub use client::Credentials;
pub use client::Device;
pub use client::DeviceDetails;
pub use client::DisplayMode;
pub use client::FanMode;
pub use client::Hub;
pub use client::HvacMode;
pub use client::PowerMode;
pub use client::PresetMode;
pub use client::Status;
pub use client::Subscribers;
pub use client::Subscription;
pub use client::SwingMode;
pub use climate::Climate;
pub use climate::set_hvac_mode;
pub use config::Config as MiraieConfig;
pub use miraie::MiraieIntegration;
pub use sensor::EnergySensor;
pub use sensor::PollState;
pub use sensor::UpdateOutcome;
pub use switch::DisplaySwitch;

use crate::engine;

/// Integration domain, used in device identifiers and translation keys
pub const DOMAIN: &str = "miraie";

/// Errors raised while serving mirAIe entities
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The vendor client failed; its error is passed on as is
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("temperature {value} is outside the supported range {min}-{max}")]
    TemperatureOutOfRange { value: f64, min: f64, max: f64 },

    #[error("unsupported converti level: {0}")]
    UnsupportedConvertiLevel(u8),

    #[error("failed to compute {period} consumption dates: {source}")]
    Time {
        period: ConsumptionPeriodType,
        #[source]
        source: jiff::Error,
    },
}

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_miraie(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let miraie_config = if let Some(c) = &ctx.config.integrations.miraie {
        c
    } else {
        return Ok(None);
    };

    if !miraie_config.enabled {
        return Ok(None);
    }

    let connector = ctx
        .connectors
        .miraie
        .clone()
        .context("mirAIe is configured but no vendor connector was supplied")?;
    let time_zone = miraie_config
        .time_zone()
        .context("Invalid mirAIe time zone")?;

    Ok(Some(Box::new(MiraieIntegration::new(
        connector,
        miraie_config,
        time_zone,
    ))))
}
