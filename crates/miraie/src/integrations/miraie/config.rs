use std::fmt;
use std::time::Duration;

use jiff::tz::TimeZone;
use serde::Deserialize;

use super::client::Credentials;
use crate::config::ConfigError;

/// One week
const MAX_POLL_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

fn default_true() -> bool {
    true
}

fn default_poll_interval_minutes() -> u64 {
    30
}

fn default_cutoff_hour() -> i8 {
    12
}

/// Configuration for the mirAIe integration
#[derive(Clone, Deserialize)]
pub struct Config {
    /// mirAIe account login (phone number or e-mail)
    pub username: String,

    pub password: String,

    /// Enable the integration (default: true when section is present)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minutes between energy consumption polls (default: 30)
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,

    /// Hour of day before which missing consumption data is expected
    /// (default: 12). The cloud publishes the previous day's figures some time
    /// in the morning.
    #[serde(default = "default_cutoff_hour")]
    pub cutoff_hour: i8,

    /// IANA time zone for consumption dates (default: system time zone)
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Config {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }

    pub fn time_zone(&self) -> Result<TimeZone, ConfigError> {
        match &self.timezone {
            Some(name) => TimeZone::get(name).map_err(|source| ConfigError::TimeZone {
                name: name.clone(),
                source,
            }),
            None => Ok(TimeZone::system()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=23).contains(&self.cutoff_hour) {
            return Err(ConfigError::Invalid {
                field: "integrations.miraie.cutoff_hour".to_string(),
                message: format!("{} is not an hour of the day (0-23)", self.cutoff_hour),
            });
        }

        if !(1..=MAX_POLL_INTERVAL_MINUTES).contains(&self.poll_interval_minutes) {
            return Err(ConfigError::Invalid {
                field: "integrations.miraie.poll_interval_minutes".to_string(),
                message: format!(
                    "{} is outside 1-{}",
                    self.poll_interval_minutes, MAX_POLL_INTERVAL_MINUTES
                ),
            });
        }

        self.time_zone().map(|_| ())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("poll_interval_minutes", &self.poll_interval_minutes)
            .field("cutoff_hour", &self.cutoff_hour)
            .field("timezone", &self.timezone)
            .finish()
    }
}
