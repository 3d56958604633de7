//! In-memory vendor client for tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use super::client::Callback;
use super::client::CallbackId;
use super::client::ClientResult;
use super::client::Connector;
use super::client::ConsumptionPeriodType;
use super::client::ConvertiMode;
use super::client::Credentials;
use super::client::Device;
use super::client::DeviceDetails;
use super::client::DisplayMode;
use super::client::FanMode;
use super::client::Hub;
use super::client::HvacMode;
use super::client::PowerMode;
use super::client::PresetMode;
use super::client::Status;
use super::client::Subscribers;
use super::client::SwingMode;

/// A vendor call recorded by [`FakeDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    TurnOn,
    TurnOff,
    SetTemperature(f64),
    SetHvacMode(HvacMode),
    SetFanMode(FanMode),
    SetVSwingMode(SwingMode),
    SetHSwingMode(SwingMode),
    SetPresetMode(PresetMode),
    SetConvertiMode(ConvertiMode),
    SetDisplayMode(DisplayMode),
}

pub struct FakeDevice {
    id: String,
    name: String,
    friendly_name: String,
    details: DeviceDetails,
    status: Mutex<Status>,
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<String>>,
    subscribers: Subscribers,
}

impl FakeDevice {
    pub fn new(id: &str, friendly_name: &str) -> Arc<Self> {
        Self::named(id, friendly_name, friendly_name)
    }

    pub fn named(id: &str, name: &str, friendly_name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            name: name.to_string(),
            friendly_name: friendly_name.to_string(),
            details: DeviceDetails {
                brand: "Panasonic".to_string(),
                model_number: "CS-TEST".to_string(),
                firmware_version: "1.0.0".to_string(),
            },
            status: Mutex::new(Status {
                is_online: true,
                power_mode: PowerMode::On,
                hvac_mode: HvacMode::Cool,
                fan_mode: FanMode::Auto,
                v_swing_mode: SwingMode(0),
                h_swing_mode: SwingMode(0),
                preset_mode: PresetMode::None,
                converti_mode: ConvertiMode::Off,
                temperature: 24.0,
                room_temperature: Some(26.0),
                display_mode: DisplayMode::On,
            }),
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            subscribers: Subscribers::new(),
        })
    }

    /// Change the status without telling subscribers
    pub fn update_status(&self, f: impl FnOnce(&mut Status)) {
        f(&mut self.status.lock().unwrap());
    }

    /// Change the status as a cloud push would
    pub fn push_status(&self, f: impl FnOnce(&mut Status)) {
        self.update_status(f);
        self.subscribers.notify();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Make the next vendor call fail with `message`
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn record(&self, call: Call, apply: impl FnOnce(&mut Status)) -> ClientResult<()> {
        self.calls.lock().unwrap().push(call);
        if let Some(message) = self.failure.lock().unwrap().take() {
            return Err(message.into());
        }
        self.update_status(apply);
        Ok(())
    }
}

#[async_trait]
impl Device for FakeDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    fn details(&self) -> &DeviceDetails {
        &self.details
    }

    fn status(&self) -> Status {
        self.status.lock().unwrap().clone()
    }

    async fn turn_on(&self) -> ClientResult<()> {
        self.record(Call::TurnOn, |s| s.power_mode = PowerMode::On)
    }

    async fn turn_off(&self) -> ClientResult<()> {
        self.record(Call::TurnOff, |s| s.power_mode = PowerMode::Off)
    }

    async fn set_temperature(&self, temperature: f64) -> ClientResult<()> {
        self.record(Call::SetTemperature(temperature), |s| {
            s.temperature = temperature
        })
    }

    async fn set_hvac_mode(&self, mode: HvacMode) -> ClientResult<()> {
        self.record(Call::SetHvacMode(mode), |s| s.hvac_mode = mode)
    }

    async fn set_fan_mode(&self, mode: FanMode) -> ClientResult<()> {
        self.record(Call::SetFanMode(mode), |s| s.fan_mode = mode)
    }

    async fn set_v_swing_mode(&self, mode: SwingMode) -> ClientResult<()> {
        self.record(Call::SetVSwingMode(mode), |s| s.v_swing_mode = mode)
    }

    async fn set_h_swing_mode(&self, mode: SwingMode) -> ClientResult<()> {
        self.record(Call::SetHSwingMode(mode), |s| s.h_swing_mode = mode)
    }

    async fn set_preset_mode(&self, mode: PresetMode) -> ClientResult<()> {
        self.record(Call::SetPresetMode(mode), |s| s.preset_mode = mode)
    }

    async fn set_converti_mode(&self, mode: ConvertiMode) -> ClientResult<()> {
        self.record(Call::SetConvertiMode(mode), |s| s.converti_mode = mode)
    }

    async fn set_display_mode(&self, mode: DisplayMode) -> ClientResult<()> {
        self.record(Call::SetDisplayMode(mode), |s| s.display_mode = mode)
    }

    fn register_callback(&self, callback: Callback) -> CallbackId {
        self.subscribers.add(callback)
    }

    fn remove_callback(&self, id: CallbackId) {
        self.subscribers.remove(id);
    }
}

#[derive(Default)]
pub struct FakeHub {
    devices: Vec<Arc<dyn Device>>,
    consumption: Mutex<HashMap<ConsumptionPeriodType, HashMap<String, f64>>>,
    failing_periods: Mutex<HashMap<ConsumptionPeriodType, String>>,
    queries: Mutex<Vec<(String, ConsumptionPeriodType, String)>>,
    session_open: AtomicBool,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<Arc<FakeDevice>>) -> Self {
        Self {
            devices: devices
                .into_iter()
                .map(|d| d as Arc<dyn Device>)
                .collect(),
            ..Self::default()
        }
    }

    pub fn set_consumption(&self, period: ConsumptionPeriodType, key: &str, kwh: f64) {
        self.consumption
            .lock()
            .unwrap()
            .entry(period)
            .or_default()
            .insert(key.to_string(), kwh);
    }

    /// Make every query for `period` fail with `message`
    pub fn fail_period(&self, period: ConsumptionPeriodType, message: &str) {
        self.failing_periods
            .lock()
            .unwrap()
            .insert(period, message.to_string());
    }

    /// `(device id, period, from_date)` of every query so far
    pub fn queries(&self) -> Vec<(String, ConsumptionPeriodType, String)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Hub for FakeHub {
    fn devices(&self) -> Vec<Arc<dyn Device>> {
        self.devices.clone()
    }

    async fn get_energy_consumption(
        &self,
        device: &dyn Device,
        period: ConsumptionPeriodType,
        from_date: &str,
    ) -> ClientResult<HashMap<String, f64>> {
        self.queries
            .lock()
            .unwrap()
            .push((device.id().to_string(), period, from_date.to_string()));

        if let Some(message) = self.failing_periods.lock().unwrap().get(&period) {
            return Err(message.clone().into());
        }

        Ok(self
            .consumption
            .lock()
            .unwrap()
            .get(&period)
            .cloned()
            .unwrap_or_default())
    }

    async fn ensure_session(&self) -> ClientResult<()> {
        if !self.session_open.swap(true, Ordering::SeqCst) {
            self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn close_session(&self) {
        if self.session_open.swap(false, Ordering::SeqCst) {
            self.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeConnector {
    hub: Arc<FakeHub>,
    logins: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(hub: Arc<FakeHub>) -> Arc<Self> {
        Arc::new(Self {
            hub,
            logins: Mutex::new(Vec::new()),
        })
    }

    /// Usernames of every login so far
    pub fn logins(&self) -> Vec<String> {
        self.logins.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, credentials: &Credentials) -> ClientResult<Arc<dyn Hub>> {
        self.logins
            .lock()
            .unwrap()
            .push(credentials.username.clone());
        Ok(self.hub.clone())
    }
}
