//! Host-facing events
//!
//! Payloads serialize to exactly what the host listens for:
//! `{handlerType}`, `{meterLevel}` and `{milliSeconds, seconds, minutes, hours}`.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionHandlerType {
    #[serde(rename = "INTERRUPT_BEGAN")]
    InterruptBegan,
    #[serde(rename = "INTERRUPT_ENDED")]
    InterruptEnded,
    #[serde(rename = "ROUTE_DEVICE_DISCONNECTED")]
    RouteDeviceDisconnected,
    #[serde(rename = "ROUTE_DEVICE_RECONNECTED")]
    RouteDeviceReconnected,
    #[serde(rename = "ROUTE_NEW_DEVICE_FOUND")]
    RouteNewDeviceFound,
}

/// Elapsed time split into display fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerTime {
    pub milli_seconds: u32,
    pub seconds: u32,
    pub minutes: u32,
    pub hours: u32,
}

impl MixerTime {
    pub fn from_seconds(t: f64) -> Self {
        let t = if t.is_finite() { t.max(0.0) } else { 0.0 };
        let whole = t.floor();
        let total = whole as u64;
        // rounded so 3725.25 reads back as 250 despite float error
        let millis = (((t - whole) * 1000.0).round() as u32).min(999);
        Self {
            milli_seconds: millis,
            seconds: (total % 60) as u32,
            minutes: ((total / 60) % 60) as u32,
            hours: (total / 3600) as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MixerEvent {
    Session {
        #[serde(rename = "handlerType")]
        handler_type: SessionHandlerType,
    },
    Meter {
        #[serde(rename = "meterLevel")]
        meter_level: f32,
    },
    Time(MixerTime),
}

/// Delivers named events to the host
///
/// Called from worker and notification threads; implementations must not
/// call back into the mixer.
pub trait EventBridge: Send + Sync {
    fn notify(&self, event_name: &str, event: &MixerEvent);
}

/// Named event as queued by [`ChannelEventBridge`]
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEvent {
    pub name: String,
    pub event: MixerEvent,
}

/// Bridge forwarding into a crossbeam channel, for hosts that poll
pub struct ChannelEventBridge {
    tx: Sender<NamedEvent>,
}

impl ChannelEventBridge {
    pub fn new(tx: Sender<NamedEvent>) -> Self {
        Self { tx }
    }
}

impl EventBridge for ChannelEventBridge {
    fn notify(&self, event_name: &str, event: &MixerEvent) {
        if event_name.is_empty() {
            return;
        }
        let _ = self.tx.send(NamedEvent {
            name: event_name.to_string(),
            event: event.clone(),
        });
    }
}

/// Bridge that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBridge;

impl EventBridge for NullEventBridge {
    fn notify(&self, _event_name: &str, _event: &MixerEvent) {}
}
