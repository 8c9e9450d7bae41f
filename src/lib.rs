//! Mixer - multi-channel audio mixing engine
//!
//! File and microphone channels each run through their own EQ and gain
//! stages into a shared mix bus. [`Mixer`] is the control surface; every
//! operation returns a [`Response`] envelope.

pub mod api;
pub mod audio;
pub mod backend;
pub mod capture;
pub mod channel;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod events;
pub mod registry;
pub mod session;
pub mod source;

#[cfg(feature = "tauri")]
pub mod plugin;

pub use api::{Mixer, Response, ResponseStatus};
pub use backend::{AudioBackend, OfflineBackend, PortType, SessionNotification};
pub use config::MixerConfig;
pub use error::{MixerError, MixerResult};
pub use events::{ChannelEventBridge, EventBridge, MixerEvent, MixerTime, NamedEvent, SessionHandlerType};
