//! Energy consumption sensors.
//!
//! The cloud publishes consumption figures for a day some time the following
//! morning. Until `cutoff_hour` a missing figure is expected and the previous
//! reading is kept; after it a missing figure is reported as unknown.

use std::sync::Arc;

use jiff::Span;
use jiff::Zoned;
use jiff::civil::Date;
use serde_json::json;
use tracing::debug;

use super::Error;
use super::client::ConsumptionPeriodType;
use super::client::Device;
use super::client::Hub;
use super::climate::device_info;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Platform;
use crate::engine::SensorState;
use crate::engine::slugify;

/// Where a sensor is in its fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Never updated, or every update so far was skipped
    AwaitingFirstFetch,
    HasValue,
    /// The last update found no figure before the cutoff and kept the old one
    StaleSkip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Skipped,
}

/// Last Sunday strictly before `date`
fn last_sunday(date: Date) -> Result<Date, jiff::Error> {
    let days_back = date.weekday().to_monday_zero_offset() + 1;
    date.checked_sub(Span::new().days(days_back))
}

/// Consumption for one device over one aggregation period
pub struct EnergySensor {
    entity_id: String,
    unique_id: String,
    name: String,
    device: Arc<dyn Device>,
    period: ConsumptionPeriodType,
    cutoff_hour: i8,
    value: Option<f64>,
    last_reset: Option<Zoned>,
    poll_state: PollState,
}

impl EnergySensor {
    pub fn new(device: Arc<dyn Device>, period: ConsumptionPeriodType, cutoff_hour: i8) -> Self {
        let period_name = period.to_string().to_lowercase();
        let entity_id = format!("sensor.{}_{}_energy", slugify(device.name()), period_name);
        let unique_id = format!(
            "sensor.{}_{}_{}_energy",
            device.name().to_lowercase(),
            device.id(),
            period_name
        );
        let name = format!("{} {} Energy", device.name(), period);

        Self {
            entity_id,
            unique_id,
            name,
            device,
            period,
            cutoff_hour,
            value: None,
            last_reset: None,
            poll_state: PollState::AwaitingFirstFetch,
        }
    }

    /// Replace the entity id derived from the device name
    pub fn with_entity_id(self, entity_id: String) -> Self {
        Self { entity_id, ..self }
    }

    /// One sensor per period for `device`
    pub fn for_device(device: &Arc<dyn Device>, cutoff_hour: i8) -> Vec<EnergySensor> {
        [
            ConsumptionPeriodType::Daily,
            ConsumptionPeriodType::Weekly,
            ConsumptionPeriodType::Monthly,
        ]
        .into_iter()
        .map(|period| EnergySensor::new(device.clone(), period, cutoff_hour))
        .collect()
    }

    pub fn period(&self) -> ConsumptionPeriodType {
        self.period
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn last_reset(&self) -> Option<&Zoned> {
        self.last_reset.as_ref()
    }

    pub fn poll_state(&self) -> PollState {
        self.poll_state
    }

    /// Key of the consumption entry to read on `today`
    ///
    /// Daily and monthly figures are read for yesterday, weekly ones for the
    /// week starting last Sunday.
    pub fn date_key(&self, today: Date) -> Result<String, Error> {
        let (date, format) = match self.period {
            ConsumptionPeriodType::Daily => (today.yesterday(), "%d%m%Y"),
            ConsumptionPeriodType::Weekly => (last_sunday(today), "%d%m%Y"),
            ConsumptionPeriodType::Monthly => (today.yesterday(), "%m%Y"),
        };
        date.map(|d| d.strftime(format).to_string())
            .map_err(|source| self.time_error(source))
    }

    /// Midnight at the start of the period containing `now`
    pub fn period_start(&self, now: &Zoned) -> Result<Zoned, Error> {
        let today = now.date();
        let start = match self.period {
            ConsumptionPeriodType::Daily => Ok(today),
            ConsumptionPeriodType::Weekly => last_sunday(today),
            ConsumptionPeriodType::Monthly => Ok(today.first_of_month()),
        };
        start
            .and_then(|date| date.to_zoned(now.time_zone().clone()))
            .map_err(|source| self.time_error(source))
    }

    fn time_error(&self, source: jiff::Error) -> Error {
        Error::Time {
            period: self.period,
            source,
        }
    }

    fn before_cutoff(&self, now: &Zoned) -> Result<bool, Error> {
        let cutoff = now
            .date()
            .at(self.cutoff_hour, 0, 0, 0)
            .to_zoned(now.time_zone().clone())
            .map_err(|source| self.time_error(source))?;
        Ok(now <= &cutoff)
    }

    /// Fetch the latest figure as of `now`
    pub async fn update(&mut self, hub: &dyn Hub, now: &Zoned) -> Result<UpdateOutcome, Error> {
        hub.ensure_session().await?;

        let key = self.date_key(now.date())?;
        debug!(
            "Fetching {} energy consumption for {}, period: {}",
            self.period, self.name, key
        );
        let consumption = hub
            .get_energy_consumption(self.device.as_ref(), self.period, &key)
            .await?
            .get(&key)
            .copied();

        if consumption.is_none() && self.before_cutoff(now)? {
            debug!("No {} figure for {} yet, keeping last reading", key, self.name);
            if self.poll_state == PollState::HasValue {
                self.poll_state = PollState::StaleSkip;
            }
            return Ok(UpdateOutcome::Skipped);
        }

        let start = self.period_start(now)?;
        if self.last_reset.as_ref().is_none_or(|previous| *previous < start) {
            self.last_reset = Some(start);
        }
        self.value = consumption;
        self.poll_state = PollState::HasValue;
        Ok(UpdateOutcome::Updated)
    }

    pub fn sensor_state(&self) -> SensorState {
        SensorState {
            value: self.value,
            last_reset: self.last_reset.clone(),
        }
    }
}

impl Entity for EnergySensor {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn unique_id(&self) -> String {
        self.unique_id.clone()
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(device_info(self.device.as_ref()))
    }

    fn capabilities(&self) -> serde_json::Value {
        json!({
            "device_class": "energy",
            "state_class": "total",
            "unit_of_measurement": "kWh",
            "suggested_display_precision": 2,
        })
    }

    fn state(&self) -> EntityState {
        EntityState::Sensor(self.sensor_state())
    }
}
