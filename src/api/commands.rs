//! Control-plane commands
//!
//! [`Mixer`] is the process-scoped object a host creates once. Every
//! operation takes a request DTO and returns a [`Response`] envelope; errors
//! never escape as `Err`. Control calls and session notifications share one
//! lock, so a notification never observes a half-finished control call.

use super::dto::*;
use crate::audio::eq::{EqBand, FREQUENCY_UNSPECIFIED};
use crate::backend::{AudioBackend, PortType, SessionNotification};
use crate::channel::{Channel, ChannelContext, ChannelKind, ChannelSettings, DestroySummary};
use crate::config::MixerConfig;
use crate::engine::Engine;
use crate::error::{MixerError, MixerResult};
use crate::events::{EventBridge, MixerTime};
use crate::registry::ChannelRegistry;
use crate::session::{SessionManager, SessionPhase};
use crate::source::{FrameSourceProvider, WavFrameSourceProvider};
use crossbeam_channel::{bounded, select, unbounded, Sender};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

/// Lowest gain `adjustEq` accepts
const MIN_EQ_GAIN: f32 = -100.0;
const NOT_IMPLEMENTED: &str = "Not implemented.";

struct MixerCore {
    session: SessionManager,
    registry: ChannelRegistry,
    ctx: ChannelContext,
}

impl MixerCore {
    fn require_session(&self) -> MixerResult<()> {
        if !self.session.is_active() {
            return Err(MixerError::Precondition(
                "Must call initAudioSession prior to any other usage".to_string(),
            ));
        }
        Ok(())
    }

    /// Guard shared by every per-channel operation
    fn channel(&self, audio_id: &str, op: &str) -> MixerResult<&Channel> {
        self.require_session()?;
        if audio_id.is_empty() {
            return Err(MixerError::Validation(format!("from {} - audioId not found", op)));
        }
        self.registry
            .get(audio_id)
            .ok_or_else(|| MixerError::NotFound(format!("from {} - File not yet added to queue", op)))
    }

    /// Like [`Self::channel`], additionally checking the caller's `inputType`
    fn typed_channel(&self, audio_id: &str, input_type: &str, op: &str) -> MixerResult<&Channel> {
        let channel = self.channel(audio_id, op)?;
        let kind = ChannelKind::parse(input_type).ok_or_else(|| {
            MixerError::Validation(format!("from {} - unknown inputType '{}'", op, input_type))
        })?;
        if channel.kind() != kind {
            return Err(MixerError::NotFound("Could not find object at [audioId]".to_string()));
        }
        Ok(channel)
    }

    fn file_channel(&self, audio_id: &str, op: &str) -> MixerResult<&crate::channel::FileChannel> {
        self.channel(audio_id, op)?
            .as_file()
            .ok_or_else(|| MixerError::NotFound("Could not find object at [audioId]".to_string()))
    }

    fn settings(&self, eq: Option<EqSettingsDto>, volume: Option<f32>, listener: Option<String>) -> ChannelSettings {
        let config = &self.ctx.config;
        ChannelSettings {
            volume: volume.unwrap_or(config.default_volume),
            listener_name: listener.unwrap_or_default(),
            eq_settings: eq.unwrap_or_default().resolve(config.default_eq),
            ..ChannelSettings::from_config(config)
        }
    }
}

pub struct Mixer {
    core: Arc<Mutex<MixerCore>>,
    shutdown: Option<Sender<()>>,
    listener: Option<JoinHandle<()>>,
}

impl Mixer {
    /// Mixer with the WAV provider and configuration from disk
    pub fn new(backend: Arc<dyn AudioBackend>, events: Arc<dyn EventBridge>) -> Self {
        Self::with_parts(backend, events, Arc::new(WavFrameSourceProvider), MixerConfig::load())
    }

    pub fn with_parts(
        backend: Arc<dyn AudioBackend>,
        events: Arc<dyn EventBridge>,
        sources: Arc<dyn FrameSourceProvider>,
        config: MixerConfig,
    ) -> Self {
        let engine = Arc::new(Engine::new(backend.clone()));
        let core = Arc::new(Mutex::new(MixerCore {
            session: SessionManager::new(engine.clone(), events.clone()),
            registry: ChannelRegistry::new(),
            ctx: ChannelContext {
                engine,
                events,
                sources,
                config: Arc::new(config),
            },
        }));

        let (tx, rx) = unbounded::<SessionNotification>();
        backend.subscribe(tx);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let weak: Weak<Mutex<MixerCore>> = Arc::downgrade(&core);
        let listener = std::thread::Builder::new()
            .name("mixer.session".to_string())
            .spawn(move || loop {
                select! {
                    recv(rx) -> msg => {
                        let Ok(notification) = msg else { break };
                        let Some(core) = weak.upgrade() else { break };
                        let mut core = core.lock();
                        let MixerCore { session, registry, .. } = &mut *core;
                        session.handle(notification, registry);
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            })
            .map_err(|e| log::error!("[Mixer] Session listener not started: {}", e))
            .ok();

        Self {
            core,
            shutdown: Some(shutdown_tx),
            listener,
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn init_audio_session(&self, req: InitSessionRequest) -> Response<SessionInfoDto> {
        let mut core = self.core.lock();
        let port_type = req.input_port_type.as_deref().filter(|s| !s.is_empty()).and_then(|s| {
            let parsed = PortType::parse(s);
            if parsed.is_none() {
                log::warn!("[Mixer] Unknown inputPortType '{}', using system default", s);
            }
            parsed
        });
        let default_duration = core.ctx.config.io_buffer_duration;
        let duration = req.io_buffer_duration.filter(|d| *d > 0.0).or(Some(default_duration));
        let listener = req.audio_session_listener_name.unwrap_or_default();

        let result = core.session.init(port_type, duration, &listener).and_then(|info| {
            if !core.registry.is_empty() {
                core.ctx.engine.ensure_running()?;
            }
            Ok(SessionInfoDto {
                preferred_input_port_type: info.input.as_ref().map(|p| p.port_type.to_string()),
                preferred_input_port_name: info.input.map(|p| p.name),
                preferred_io_buffer_duration: info.io_buffer_duration as f32,
            })
        });
        Response::from_result(result, "successfully initialized audio session")
    }

    pub fn deinit_audio_session(&self) -> Response<EmptyDto> {
        self.core.lock().session.deinit();
        Response::success("Successfully deinitialized audio session", EmptyDto {})
    }

    /// Destroy everything and return to the initial state
    pub fn reset_plugin(&self) -> Response<EmptyDto> {
        let mut core = self.core.lock();
        let MixerCore { session, registry, .. } = &mut *core;
        session.reset_all(registry);
        Response::success("Successfully restarted plugin to original state.", EmptyDto {})
    }

    pub fn get_audio_session_preferred_input_port_type(&self) -> Response<ValueDto<Option<String>>> {
        let core = self.core.lock();
        let result = core.require_session().map(|_| ValueDto {
            value: core.session.preferred_input().map(|p| p.port_type.to_string()),
        });
        Response::from_result(result, "got preferred input")
    }

    pub fn get_input_channel_count(&self) -> Response<InputChannelCountDto> {
        let core = self.core.lock();
        let result = core.require_session().map(|_| {
            let backend = core.ctx.engine.backend();
            InputChannelCountDto {
                channel_count: backend.input_format().map(|f| f.channels).unwrap_or(0),
                device_name: core
                    .session
                    .preferred_input()
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
            }
        });
        Response::from_result(result, "got input channel count and device name")
    }

    // =========================================================================
    // Channel lifecycle
    // =========================================================================

    pub fn init_audio_file(&self, req: InitAudioFileRequest) -> Response<ValueDto<String>> {
        let mut core = self.core.lock();
        let result = (|| -> MixerResult<ValueDto<String>> {
            core.require_session()?;
            if req.file_path.is_empty() {
                return Err(MixerError::Validation("filePath not found".to_string()));
            }
            if req.audio_id.is_empty() {
                return Err(MixerError::Validation("audioId not found".to_string()));
            }
            let mut settings = core.settings(req.eq_settings, req.volume, req.channel_listener_name.clone());
            settings.elapsed_time_event_name = req.elapsed_time_event_name.clone().unwrap_or_default();

            let MixerCore { registry, ctx, .. } = &mut *core;
            registry.create(&req.audio_id, ChannelKind::File, &req.file_path, &settings, ctx)?;
            Ok(ValueDto {
                value: req.audio_id.clone(),
            })
        })();
        Response::from_result(result, "file is initialized")
    }

    pub fn init_mic_input(&self, req: InitMicInputRequest) -> Response<ValueDto<String>> {
        let mut core = self.core.lock();
        let result = (|| -> MixerResult<ValueDto<String>> {
            core.require_session()?;
            if req.audio_id.is_empty() {
                return Err(MixerError::Validation("audioId not found".to_string()));
            }
            let channel_number = match req.channel_number {
                Some(n) if n >= 0 => n as usize,
                _ => return Err(MixerError::Validation("no channel number".to_string())),
            };
            let mut settings = core.settings(req.eq_settings, req.volume, req.channel_listener_name.clone());
            settings.channel_number = channel_number;

            let MixerCore { registry, ctx, .. } = &mut *core;
            registry.create(&req.audio_id, ChannelKind::Mic, "", &settings, ctx)?;
            Ok(ValueDto {
                value: req.audio_id.clone(),
            })
        })();
        Response::from_result(result, "mic was successfully initialized")
    }

    fn destroy(&self, audio_id: &str, kind: ChannelKind, op: &str) -> MixerResult<DestroySummary> {
        let mut core = self.core.lock();
        if core.channel(audio_id, op)?.kind() != kind {
            return Err(MixerError::NotFound("Could not find object at [audioId]".to_string()));
        }
        core.registry.destroy(audio_id)
    }

    pub fn destroy_audio_file(&self, req: AudioIdRequest) -> Response<DestroySummary> {
        let result = self.destroy(&req.audio_id, ChannelKind::File, "destroyAudioFile");
        Response::from_result(result, format!("Audio file {} destroyed", req.audio_id))
    }

    pub fn destroy_mic_input(&self, req: AudioIdRequest) -> Response<DestroySummary> {
        let result = self.destroy(&req.audio_id, ChannelKind::Mic, "destroyMicInput");
        Response::from_result(result, format!("Mic input {} destroyed", req.audio_id))
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Toggle play/pause on a file channel
    pub fn play(&self, req: AudioIdRequest) -> Response<StateDto> {
        let core = self.core.lock();
        let result = core.channel(&req.audio_id, "play").and_then(|channel| match channel {
            Channel::File(file) => file.play_or_pause(),
            Channel::Mic(_) => Ok(NOT_IMPLEMENTED),
        });
        let result = result.map(|state| StateDto {
            state: state.to_string(),
        });
        Response::from_result(result, "playing or pausing playback")
    }

    pub fn stop(&self, req: AudioIdRequest) -> Response<StateDto> {
        let core = self.core.lock();
        let result = core.channel(&req.audio_id, "stop").map(|channel| match channel {
            Channel::File(file) => file.stop(),
            Channel::Mic(_) => NOT_IMPLEMENTED,
        });
        let result = result.map(|state| StateDto {
            state: state.to_string(),
        });
        Response::from_result(result, "stopping playback")
    }

    pub fn is_playing(&self, req: AudioIdRequest) -> Response<ValueDto<bool>> {
        let core = self.core.lock();
        let result = core.channel(&req.audio_id, "isPlaying").map(|channel| ValueDto {
            value: match channel {
                Channel::File(file) => file.is_playing(),
                Channel::Mic(mic) => mic.is_running(),
            },
        });
        Response::from_result(result, "audio file is playing")
    }

    // =========================================================================
    // Volume / EQ
    // =========================================================================

    pub fn adjust_volume(&self, req: AdjustVolumeRequest) -> Response<EmptyDto> {
        let core = self.core.lock();
        let result = (|| -> MixerResult<EmptyDto> {
            let channel = core.typed_channel(&req.audio_id, &req.input_type, "adjustVolume")?;
            let volume = req.volume.unwrap_or(core.ctx.config.default_volume);
            if volume < 0.0 {
                return Err(MixerError::Validation(
                    "in adjustVolume - volume cannot be less than zero percent".to_string(),
                ));
            }
            channel.control().set_volume(volume);
            Ok(EmptyDto {})
        })();
        Response::from_result(result, "you are adjusting the volume")
    }

    pub fn get_current_volume(&self, req: InputTypeRequest) -> Response<VolumeDto> {
        let core = self.core.lock();
        let result = core
            .typed_channel(&req.audio_id, &req.input_type, "getCurrentVolume")
            .map(|channel| VolumeDto {
                volume: channel.control().volume(),
            });
        Response::from_result(result, "here is the current volume")
    }

    pub fn adjust_eq(&self, req: AdjustEqRequest) -> Response<EmptyDto> {
        let core = self.core.lock();
        let result = (|| -> MixerResult<EmptyDto> {
            let channel = core.typed_channel(&req.audio_id, &req.input_type, "adjustEq")?;
            if req.eq_type.is_empty() {
                return Err(MixerError::Validation("from adjustEq - filter type not specified".to_string()));
            }
            let gain = req.gain.unwrap_or(MIN_EQ_GAIN);
            if gain < MIN_EQ_GAIN {
                return Err(MixerError::Validation("from adjustEq - gain too low".to_string()));
            }
            let frequency = req.frequency.unwrap_or(FREQUENCY_UNSPECIFIED);
            if frequency < FREQUENCY_UNSPECIFIED {
                return Err(MixerError::Validation("from adjustEq - frequency not specified".to_string()));
            }
            let band = EqBand::parse(&req.eq_type).ok_or_else(|| {
                log::warn!("[Mixer] Unknown eqType '{}'", req.eq_type);
                MixerError::Validation(format!("from adjustEq - unknown eqType '{}'", req.eq_type))
            })?;
            channel.control().adjust_eq(band, gain, frequency);
            Ok(EmptyDto {})
        })();
        Response::from_result(result, "you are adjusting EQ")
    }

    pub fn get_current_eq(&self, req: InputTypeRequest) -> Response<crate::audio::eq::EqSettings> {
        let core = self.core.lock();
        let result = core
            .typed_channel(&req.audio_id, &req.input_type, "getCurrentEq")
            .map(|channel| channel.control().current_eq());
        Response::from_result(result, "here is the current EQ")
    }

    // =========================================================================
    // Time
    // =========================================================================

    pub fn set_elapsed_time_event(&self, req: SetElapsedTimeEventRequest) -> Response<EmptyDto> {
        let mut core = self.core.lock();
        let result = (|| -> MixerResult<EmptyDto> {
            core.file_channel(&req.audio_id, "setElapsedTimeEvent")?;
            if req.event_name.is_empty() {
                return Err(MixerError::Validation(
                    "from setElapsedTimeEvent - eventName not found".to_string(),
                ));
            }
            match core.registry.get_mut(&req.audio_id) {
                Some(Channel::File(file)) => file.set_elapsed_time_event(&req.event_name)?,
                _ => return Err(MixerError::NotFound("Could not find object at [audioId]".to_string())),
            }
            Ok(EmptyDto {})
        })();
        Response::from_result(result, "set elapsed time event")
    }

    pub fn get_elapsed_time(&self, req: AudioIdRequest) -> Response<MixerTime> {
        let core = self.core.lock();
        let result = core
            .file_channel(&req.audio_id, "getElapsedTime")
            .map(|file| MixerTime::from_seconds(file.elapsed()));
        Response::from_result(result, "got Elapsed Time")
    }

    pub fn get_total_time(&self, req: AudioIdRequest) -> Response<MixerTime> {
        let core = self.core.lock();
        let result = core
            .file_channel(&req.audio_id, "getTotalTime")
            .map(|file| MixerTime::from_seconds(file.total()));
        Response::from_result(result, "got total time")
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn session_phase(&self) -> SessionPhase {
        self.core.lock().session.phase()
    }

    pub fn interrupted_channel_ids(&self) -> BTreeSet<String> {
        self.core.lock().session.interrupted_channel_ids().clone()
    }

    pub fn channel_count(&self) -> usize {
        self.core.lock().registry.len()
    }

    /// Apply a session notification synchronously
    pub fn handle_notification(&self, notification: SessionNotification) {
        let mut core = self.core.lock();
        let MixerCore { session, registry, .. } = &mut *core;
        session.handle(notification, registry);
    }

    pub fn engine(&self) -> Arc<Engine> {
        self.core.lock().ctx.engine.clone()
    }
}

impl Drop for Mixer {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
        let mut core = self.core.lock();
        let MixerCore { session, registry, .. } = &mut *core;
        session.reset_all(registry);
    }
}
