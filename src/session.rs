//! Session manager - hardware session lifecycle and disruption recovery
//!
//! ```text
//! Inactive --init--> Active --interruption began--> Interrupted --ended--> Active
//!                      |                                                   ^
//!                      +--old device unavailable--> RouteChanging --new device--+
//! ```
//!
//! An interruption and a lost input route can overlap. They are tracked
//! separately; [`SessionPhase`] reports the interruption first.
//!
//! Notifications arrive on the mixer's notification thread, which holds the
//! same lock as control calls while [`SessionManager::handle`] runs.

use crate::backend::{
    AudioBackend, PortDescriptor, PortType, RouteChangeReason, SessionNotification, SessionRequest,
};
use crate::channel::ChannelControl;
use crate::engine::Engine;
use crate::error::{MixerError, MixerResult};
use crate::events::{EventBridge, MixerEvent, SessionHandlerType};
use crate::registry::ChannelRegistry;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Inactive,
    Active,
    Interrupted,
    RouteChanging,
}

/// What `init` ended up selecting
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub input: Option<PortDescriptor>,
    pub io_buffer_duration: f64,
}

pub struct SessionManager {
    backend: Arc<dyn AudioBackend>,
    engine: Arc<Engine>,
    events: Arc<dyn EventBridge>,
    active: bool,
    in_interruption: bool,
    route_lost: bool,
    preferred_input: Option<PortDescriptor>,
    io_buffer_duration: f64,
    interrupted: BTreeSet<String>,
    listener_name: String,
}

impl SessionManager {
    pub fn new(engine: Arc<Engine>, events: Arc<dyn EventBridge>) -> Self {
        Self {
            backend: engine.backend().clone(),
            engine,
            events,
            active: false,
            in_interruption: false,
            route_lost: false,
            preferred_input: None,
            io_buffer_duration: 0.0,
            interrupted: BTreeSet::new(),
            listener_name: String::new(),
        }
    }

    /// Activate the hardware session, preferring an input of `port_type`
    pub fn init(
        &mut self,
        port_type: Option<PortType>,
        io_buffer_duration: Option<f64>,
        listener_name: &str,
    ) -> MixerResult<SessionInfo> {
        if self.active {
            return Err(MixerError::Precondition(
                "Audio Session is already active, please call 'deinitAudioSession' prior to initializing a new audio session."
                    .to_string(),
            ));
        }

        let preferred = port_type.and_then(|wanted| {
            let found = self
                .backend
                .available_inputs()
                .into_iter()
                .find(|p| wanted.matches(p.port_type));
            if found.is_none() {
                log::info!("[Session] No {} input available, using system default", wanted);
            }
            found
        });

        let request = SessionRequest {
            preferred_input: preferred,
            io_buffer_duration: io_buffer_duration.filter(|d| *d > 0.0),
        };
        let route = self.backend.activate(&request).map_err(|e| {
            log::error!("[Session] Activation failed: {}", e);
            MixerError::SessionActivation(e.to_string())
        })?;

        self.active = true;
        self.in_interruption = false;
        self.route_lost = false;
        self.preferred_input = route.input.clone();
        self.io_buffer_duration = route.io_buffer_duration;
        self.listener_name = listener_name.to_string();
        self.interrupted.clear();

        log::info!(
            "[Session] Active on {} (input: {}, io buffer {:.4}s)",
            self.backend.name(),
            route.input.as_ref().map(|p| p.name.as_str()).unwrap_or("none"),
            route.io_buffer_duration
        );
        Ok(SessionInfo {
            input: route.input,
            io_buffer_duration: route.io_buffer_duration,
        })
    }

    /// Deactivate the session; channels stay alive
    pub fn deinit(&mut self) {
        if self.active {
            self.backend.deactivate();
            log::info!("[Session] Deactivated");
        }
        self.active = false;
        self.in_interruption = false;
        self.route_lost = false;
        self.interrupted.clear();
    }

    /// Deactivate, destroy every channel and stop rendering
    pub fn reset_all(&mut self, registry: &mut ChannelRegistry) {
        self.deinit();
        let destroyed = registry.reset_all();
        self.engine.stop();
        self.preferred_input = None;
        self.listener_name.clear();
        log::info!("[Session] Reset, {} channels destroyed", destroyed.len());
    }

    /// Apply one notification. Returns the event emitted, if any.
    pub fn handle(
        &mut self,
        notification: SessionNotification,
        registry: &mut ChannelRegistry,
    ) -> Option<SessionHandlerType> {
        if !self.active {
            log::debug!("[Session] Ignoring {:?} while inactive", notification);
            return None;
        }

        let handler = match notification {
            SessionNotification::InterruptionBegan => self.interruption_began(registry),
            SessionNotification::InterruptionEnded { should_resume } => {
                self.interruption_ended(should_resume, registry)
            }
            SessionNotification::RouteChanged(RouteChangeReason::OldDeviceUnavailable) => {
                self.device_lost(registry)
            }
            SessionNotification::RouteChanged(RouteChangeReason::NewDeviceAvailable) => {
                self.device_found(registry)
            }
            SessionNotification::RouteChanged(reason) => {
                log::info!("[Session] Route changed ({:?}), no action", reason);
                None
            }
            SessionNotification::MediaServicesLost => {
                log::warn!("[Session] Media services lost");
                None
            }
            SessionNotification::MediaServicesReset => {
                log::warn!("[Session] Media services reset");
                None
            }
        }?;

        self.events.notify(
            &self.listener_name,
            &MixerEvent::Session {
                handler_type: handler,
            },
        );
        Some(handler)
    }

    fn interruption_began(&mut self, registry: &mut ChannelRegistry) -> Option<SessionHandlerType> {
        if self.in_interruption {
            return None;
        }
        for (id, channel) in registry.file_channels() {
            if channel.pause_for_interrupt() {
                self.interrupted.insert(id.clone());
            }
        }
        log::info!(
            "[Session] Interruption began, {} channels paused",
            self.interrupted.len()
        );
        self.in_interruption = true;
        Some(SessionHandlerType::InterruptBegan)
    }

    fn interruption_ended(
        &mut self,
        should_resume: bool,
        registry: &mut ChannelRegistry,
    ) -> Option<SessionHandlerType> {
        if !self.in_interruption {
            return None;
        }
        let ids = std::mem::take(&mut self.interrupted);
        if should_resume {
            for id in &ids {
                let Some(channel) = registry.get(id).and_then(|c| c.as_file()) else {
                    continue;
                };
                if let Err(e) = channel.resume() {
                    log::error!("[Session] Could not resume {}: {}", channel.id(), e);
                }
            }
            log::info!("[Session] Interruption ended, {} channels resumed", ids.len());
        } else {
            log::info!("[Session] Interruption ended without resume");
        }
        self.in_interruption = false;
        Some(SessionHandlerType::InterruptEnded)
    }

    fn device_lost(&mut self, registry: &mut ChannelRegistry) -> Option<SessionHandlerType> {
        for (_, mic) in registry.mic_channels_mut() {
            mic.interrupt();
        }
        log::info!("[Session] Input device disconnected");
        self.route_lost = true;
        Some(SessionHandlerType::RouteDeviceDisconnected)
    }

    fn device_found(&mut self, registry: &mut ChannelRegistry) -> Option<SessionHandlerType> {
        let reconnect = std::mem::take(&mut self.route_lost);
        for (id, mic) in registry.mic_channels_mut() {
            // stays Interrupted; the next route change retries
            if let Err(e) = mic.resume_from_interrupt() {
                log::error!("[Session] Mic {} did not resume: {}", id, e);
            }
        }
        if reconnect {
            log::info!("[Session] Input device reconnected");
            Some(SessionHandlerType::RouteDeviceReconnected)
        } else {
            log::info!("[Session] New input device found");
            Some(SessionHandlerType::RouteNewDeviceFound)
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.active {
            SessionPhase::Inactive
        } else if self.in_interruption {
            SessionPhase::Interrupted
        } else if self.route_lost {
            SessionPhase::RouteChanging
        } else {
            SessionPhase::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn interrupted_channel_ids(&self) -> &BTreeSet<String> {
        &self.interrupted
    }

    pub fn preferred_input(&self) -> Option<&PortDescriptor> {
        self.preferred_input.as_ref()
    }

    pub fn io_buffer_duration(&self) -> f64 {
        self.io_buffer_duration
    }

    pub fn listener_name(&self) -> &str {
        &self.listener_name
    }
}
