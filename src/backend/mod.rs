//! Audio backends - hardware session, render clock and capture
//!
//! The mixer talks to hardware only through [`AudioBackend`]. The offline
//! backend drives everything from a software clock; the cpal backend (feature
//! `cpal`) opens real devices.

use crate::error::BackendError;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "cpal")]
pub mod cpal;
pub mod offline;

pub use offline::OfflineBackend;

/// Pulled by the backend once per output cycle (render domain)
pub trait Renderer: Send + Sync {
    /// Fill `out` (interleaved, `channels` wide) completely
    fn render(&self, out: &mut [f32], channels: usize);
}

/// Receives captured input (capture domain)
pub trait InputSink: Send + Sync {
    fn on_input(&self, interleaved: &[f32], channels: usize);
}

/// Input port kinds the host can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    #[serde(rename = "hdmi")]
    Hdmi,
    #[serde(rename = "airplay")]
    AirPlay,
    #[serde(rename = "bluetoothA2DP")]
    BluetoothA2dp,
    #[serde(rename = "bluetoothHFP")]
    BluetoothHfp,
    #[serde(rename = "bluetoothLE")]
    BluetoothLe,
    #[serde(rename = "builtInMic")]
    BuiltInMic,
    #[serde(rename = "headsetMicWired")]
    HeadsetMicWired,
    #[serde(rename = "headsetMicUsb")]
    HeadsetMicUsb,
    #[serde(rename = "lineIn")]
    LineIn,
    #[serde(rename = "thunderbolt")]
    Thunderbolt,
    #[serde(rename = "usbAudio")]
    UsbAudio,
    #[serde(rename = "virtual")]
    Virtual,
}

impl PortType {
    pub const ALL: [PortType; 12] = [
        PortType::Hdmi,
        PortType::AirPlay,
        PortType::BluetoothA2dp,
        PortType::BluetoothHfp,
        PortType::BluetoothLe,
        PortType::BuiltInMic,
        PortType::HeadsetMicWired,
        PortType::HeadsetMicUsb,
        PortType::LineIn,
        PortType::Thunderbolt,
        PortType::UsbAudio,
        PortType::Virtual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PortType::Hdmi => "hdmi",
            PortType::AirPlay => "airplay",
            PortType::BluetoothA2dp => "bluetoothA2DP",
            PortType::BluetoothHfp => "bluetoothHFP",
            PortType::BluetoothLe => "bluetoothLE",
            PortType::BuiltInMic => "builtInMic",
            PortType::HeadsetMicWired => "headsetMicWired",
            PortType::HeadsetMicUsb => "headsetMicUsb",
            PortType::LineIn => "lineIn",
            PortType::Thunderbolt => "thunderbolt",
            PortType::UsbAudio => "usbAudio",
            PortType::Virtual => "virtual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Whether a port of kind `actual` satisfies a request for `self`
    ///
    /// Wired and USB headsets are the same port kind at the hardware level.
    pub fn matches(&self, actual: PortType) -> bool {
        *self == actual || (self.is_headset() && actual.is_headset())
    }

    fn is_headset(&self) -> bool {
        matches!(self, PortType::HeadsetMicWired | PortType::HeadsetMicUsb)
    }

    /// Best guess from a device name, for hosts that expose names only
    pub fn guess_from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("hdmi") || lower.contains("displayport") {
            PortType::Hdmi
        } else if lower.contains("airplay") {
            PortType::AirPlay
        } else if lower.contains("hands-free") || lower.contains("hfp") {
            PortType::BluetoothHfp
        } else if lower.contains("airpods") || lower.contains("bluetooth") {
            PortType::BluetoothA2dp
        } else if lower.contains("headset") || lower.contains("headphone") {
            if lower.contains("usb") {
                PortType::HeadsetMicUsb
            } else {
                PortType::HeadsetMicWired
            }
        } else if lower.contains("usb") {
            PortType::UsbAudio
        } else if lower.contains("thunderbolt") {
            PortType::Thunderbolt
        } else if lower.contains("line") {
            PortType::LineIn
        } else if lower.contains("virtual") || lower.contains("loopback") || lower.contains("monitor") {
            PortType::Virtual
        } else {
            PortType::BuiltInMic
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable hardware input
#[derive(Debug, Clone, PartialEq)]
pub struct PortDescriptor {
    pub uid: String,
    pub name: String,
    pub port_type: PortType,
    pub channels: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRequest {
    /// `None` keeps the system default input
    pub preferred_input: Option<PortDescriptor>,
    /// Only applied when positive
    pub io_buffer_duration: Option<f64>,
}

/// What the backend actually selected
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRoute {
    pub input: Option<PortDescriptor>,
    pub io_buffer_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub channels: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChangeReason {
    OldDeviceUnavailable,
    NewDeviceAvailable,
    CategoryChange,
    Override,
    ConfigurationChange,
    WakeFromSleep,
    NoSuitableRoute,
    Unknown,
}

/// Asynchronous session-level notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotification {
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    RouteChanged(RouteChangeReason),
    MediaServicesLost,
    MediaServicesReset,
}

pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Register a receiver for session notifications
    fn subscribe(&self, tx: Sender<SessionNotification>);

    fn available_inputs(&self) -> Vec<PortDescriptor>;

    fn activate(&self, request: &SessionRequest) -> Result<ActiveRoute, BackendError>;

    fn deactivate(&self);

    /// Format of the currently selected input, if there is one
    fn input_format(&self) -> Option<StreamFormat>;

    fn output_format(&self) -> StreamFormat;

    /// Start pulling `renderer` from the output clock
    fn start(&self, renderer: Arc<dyn Renderer>) -> Result<(), BackendError>;

    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Deliver captured input from the selected device to `sink`
    fn open_input(&self, sink: Arc<dyn InputSink>) -> Result<InputHandle, BackendError>;

    /// Stop delivery to a sink. Returns once no further callback can start.
    fn close_input(&self, handle: InputHandle);
}
