//! The mirAIe vendor client, as seen by this integration.
//!
//! Talking to the mirAIe cloud (login, the device push connection, the
//! consumption API) is the vendor client's job. These traits are the seam: an
//! application implements them on top of its vendor client and hands a
//! [`Connector`] to the integration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

/// Error raised by the vendor client. Passed through untouched.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PowerMode {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum HvacMode {
    Auto,
    Cool,
    Heat,
    Dry,
    Fan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum FanMode {
    Auto,
    Low,
    Medium,
    High,
    Quiet,
}

/// Louver position as reported by the device. Positions 0 through 5 are
/// defined; firmware may report others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwingMode(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PresetMode {
    None,
    Eco,
    Boost,
}

/// Capacity limit ("converti") setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum ConvertiMode {
    Off,
    /// The unit has no converti support
    NotSupported,
    C40,
    C55,
    C70,
    C80,
    C90,
    C100,
    C110,
}

impl ConvertiMode {
    /// Capacity level in percent. `Off` is level 0.
    pub fn level(self) -> Option<u8> {
        match self {
            ConvertiMode::Off => Some(0),
            ConvertiMode::NotSupported => None,
            ConvertiMode::C40 => Some(40),
            ConvertiMode::C55 => Some(55),
            ConvertiMode::C70 => Some(70),
            ConvertiMode::C80 => Some(80),
            ConvertiMode::C90 => Some(90),
            ConvertiMode::C100 => Some(100),
            ConvertiMode::C110 => Some(110),
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(ConvertiMode::Off),
            40 => Some(ConvertiMode::C40),
            55 => Some(ConvertiMode::C55),
            70 => Some(ConvertiMode::C70),
            80 => Some(ConvertiMode::C80),
            90 => Some(ConvertiMode::C90),
            100 => Some(ConvertiMode::C100),
            110 => Some(ConvertiMode::C110),
            _ => None,
        }
    }

    /// Whether a capacity limit is in effect.
    pub fn is_active(self) -> bool {
        !matches!(self, ConvertiMode::Off | ConvertiMode::NotSupported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DisplayMode {
    On,
    Off,
}

/// Aggregation period of a consumption query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum ConsumptionPeriodType {
    Daily,
    Weekly,
    Monthly,
}

/// Snapshot of a device's reported status.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub is_online: bool,
    pub power_mode: PowerMode,
    pub hvac_mode: HvacMode,
    pub fan_mode: FanMode,
    pub v_swing_mode: SwingMode,
    pub h_swing_mode: SwingMode,
    pub preset_mode: PresetMode,
    pub converti_mode: ConvertiMode,
    /// Target temperature in °C
    pub temperature: f64,
    /// Room temperature in °C, when the unit reports it
    pub room_temperature: Option<f64>,
    pub display_mode: DisplayMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDetails {
    pub brand: String,
    pub model_number: String,
    pub firmware_version: String,
}

/// Account credentials for the vendor cloud.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Callback invoked whenever a device's status changes.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Handle for removing a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Status-change subscribers of one device.
///
/// A ready-made observer list for [`Device`] implementations: callbacks are
/// added and removed by id and the list does not own anything the callbacks
/// point at.
#[derive(Default)]
pub struct Subscribers {
    next_id: AtomicU64,
    callbacks: std::sync::Mutex<Vec<(CallbackId, Callback)>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, callback: Callback) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));
        id
    }

    /// Returns false if no callback was registered under `id`.
    pub fn remove(&self, id: CallbackId) -> bool {
        let mut callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Invoke every callback. The list is not locked while callbacks run, so a
    /// callback may add or remove subscriptions.
    pub fn notify(&self) {
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One air conditioner known to the vendor hub.
#[async_trait]
pub trait Device: Send + Sync {
    fn id(&self) -> &str;

    /// Internal device name, used for energy sensor names
    fn name(&self) -> &str;

    /// User-chosen display name
    fn friendly_name(&self) -> &str;

    fn details(&self) -> &DeviceDetails;

    /// Current status snapshot
    fn status(&self) -> Status;

    async fn turn_on(&self) -> ClientResult<()>;

    async fn turn_off(&self) -> ClientResult<()>;

    async fn set_temperature(&self, temperature: f64) -> ClientResult<()>;

    async fn set_hvac_mode(&self, mode: HvacMode) -> ClientResult<()>;

    async fn set_fan_mode(&self, mode: FanMode) -> ClientResult<()>;

    async fn set_v_swing_mode(&self, mode: SwingMode) -> ClientResult<()>;

    async fn set_h_swing_mode(&self, mode: SwingMode) -> ClientResult<()>;

    async fn set_preset_mode(&self, mode: PresetMode) -> ClientResult<()>;

    async fn set_converti_mode(&self, mode: ConvertiMode) -> ClientResult<()>;

    async fn set_display_mode(&self, mode: DisplayMode) -> ClientResult<()>;

    /// Call `callback` after every status change pushed by the cloud
    fn register_callback(&self, callback: Callback) -> CallbackId;

    fn remove_callback(&self, id: CallbackId);
}

/// A logged-in vendor account and its devices.
#[async_trait]
pub trait Hub: Send + Sync {
    fn devices(&self) -> Vec<Arc<dyn Device>>;

    /// Consumption figures in kWh keyed by date string, starting at `from_date`
    ///
    /// `from_date` is `%d%m%Y` for daily and weekly queries and `%m%Y` for
    /// monthly ones; the result uses the same format for its keys.
    async fn get_energy_consumption(
        &self,
        device: &dyn Device,
        period: ConsumptionPeriodType,
        from_date: &str,
    ) -> ClientResult<HashMap<String, f64>>;

    /// Reopen the HTTP session used for consumption queries if it was closed
    async fn ensure_session(&self) -> ClientResult<()>;

    async fn close_session(&self);
}

/// Logs in to the vendor cloud.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> ClientResult<Arc<dyn Hub>>;
}

/// A registered status callback, removed again when dropped.
pub struct Subscription {
    device: Arc<dyn Device>,
    id: CallbackId,
}

impl Subscription {
    pub fn new(device: Arc<dyn Device>, callback: Callback) -> Self {
        let id = device.register_callback(callback);
        Self { device, id }
    }

    pub fn device_id(&self) -> &str {
        self.device.id()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.device.remove_callback(self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_converti_levels() {
        for mode in ConvertiMode::iter() {
            match mode.level() {
                Some(level) => assert_eq!(ConvertiMode::from_level(level), Some(mode)),
                None => assert_eq!(mode, ConvertiMode::NotSupported),
            }
        }
        assert_eq!(ConvertiMode::from_level(65), None);
        assert!(!ConvertiMode::Off.is_active());
        assert!(!ConvertiMode::NotSupported.is_active());
        assert!(ConvertiMode::C55.is_active());
    }

    #[test]
    fn test_wire_tokens() {
        assert_eq!(HvacMode::Fan.to_string(), "fan");
        assert_eq!("quiet".parse::<FanMode>(), Ok(FanMode::Quiet));
        assert_eq!(ConsumptionPeriodType::Weekly.to_string(), "Weekly");
    }

    #[test]
    fn test_subscribers_add_notify_remove() {
        let subscribers = Subscribers::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let first = subscribers.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = calls.clone();
        let second = subscribers.add(Arc::new(move || {
            counter.fetch_add(10, Ordering::SeqCst);
        }));
        assert_ne!(first, second);

        subscribers.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 11);

        assert!(subscribers.remove(first));
        assert!(!subscribers.remove(first));
        subscribers.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 21);
        assert_eq!(subscribers.len(), 1);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
