//! Tauri plugin surface
//!
//! Each command forwards its request to the managed [`Mixer`] and returns the
//! envelope unchanged. Events go out through `Emitter::emit`.

use crate::api::*;
use crate::audio::eq::EqSettings;
use crate::backend::AudioBackend;
use crate::channel::DestroySummary;
use crate::events::{EventBridge, MixerEvent, MixerTime};
use std::sync::Arc;
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, Runtime, State};

struct TauriEventBridge<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> EventBridge for TauriEventBridge<R> {
    fn notify(&self, event_name: &str, event: &MixerEvent) {
        if event_name.is_empty() {
            return;
        }
        if let Err(e) = self.app.emit(event_name, event.clone()) {
            log::warn!("[Plugin] Failed to emit {}: {}", event_name, e);
        }
    }
}

fn default_backend() -> Arc<dyn AudioBackend> {
    #[cfg(feature = "cpal")]
    {
        Arc::new(crate::backend::cpal::CpalBackend::new())
    }
    #[cfg(not(feature = "cpal"))]
    {
        Arc::new(crate::backend::OfflineBackend::new())
    }
}

// =============================================================================
// Commands
// =============================================================================

#[tauri::command]
fn init_audio_session(mixer: State<'_, Mixer>, request: InitSessionRequest) -> Response<SessionInfoDto> {
    mixer.init_audio_session(request)
}

#[tauri::command]
fn deinit_audio_session(mixer: State<'_, Mixer>) -> Response<EmptyDto> {
    mixer.deinit_audio_session()
}

#[tauri::command]
fn reset_plugin(mixer: State<'_, Mixer>) -> Response<EmptyDto> {
    mixer.reset_plugin()
}

#[tauri::command]
fn get_audio_session_preferred_input_port_type(mixer: State<'_, Mixer>) -> Response<ValueDto<Option<String>>> {
    mixer.get_audio_session_preferred_input_port_type()
}

#[tauri::command]
fn get_input_channel_count(mixer: State<'_, Mixer>) -> Response<InputChannelCountDto> {
    mixer.get_input_channel_count()
}

#[tauri::command]
fn init_audio_file(mixer: State<'_, Mixer>, request: InitAudioFileRequest) -> Response<ValueDto<String>> {
    mixer.init_audio_file(request)
}

#[tauri::command]
fn init_mic_input(mixer: State<'_, Mixer>, request: InitMicInputRequest) -> Response<ValueDto<String>> {
    mixer.init_mic_input(request)
}

#[tauri::command]
fn destroy_audio_file(mixer: State<'_, Mixer>, request: AudioIdRequest) -> Response<DestroySummary> {
    mixer.destroy_audio_file(request)
}

#[tauri::command]
fn destroy_mic_input(mixer: State<'_, Mixer>, request: AudioIdRequest) -> Response<DestroySummary> {
    mixer.destroy_mic_input(request)
}

#[tauri::command]
fn play(mixer: State<'_, Mixer>, request: AudioIdRequest) -> Response<StateDto> {
    mixer.play(request)
}

#[tauri::command]
fn stop(mixer: State<'_, Mixer>, request: AudioIdRequest) -> Response<StateDto> {
    mixer.stop(request)
}

#[tauri::command]
fn is_playing(mixer: State<'_, Mixer>, request: AudioIdRequest) -> Response<ValueDto<bool>> {
    mixer.is_playing(request)
}

#[tauri::command]
fn adjust_volume(mixer: State<'_, Mixer>, request: AdjustVolumeRequest) -> Response<EmptyDto> {
    mixer.adjust_volume(request)
}

#[tauri::command]
fn get_current_volume(mixer: State<'_, Mixer>, request: InputTypeRequest) -> Response<VolumeDto> {
    mixer.get_current_volume(request)
}

#[tauri::command]
fn adjust_eq(mixer: State<'_, Mixer>, request: AdjustEqRequest) -> Response<EmptyDto> {
    mixer.adjust_eq(request)
}

#[tauri::command]
fn get_current_eq(mixer: State<'_, Mixer>, request: InputTypeRequest) -> Response<EqSettings> {
    mixer.get_current_eq(request)
}

#[tauri::command]
fn set_elapsed_time_event(mixer: State<'_, Mixer>, request: SetElapsedTimeEventRequest) -> Response<EmptyDto> {
    mixer.set_elapsed_time_event(request)
}

#[tauri::command]
fn get_elapsed_time(mixer: State<'_, Mixer>, request: AudioIdRequest) -> Response<MixerTime> {
    mixer.get_elapsed_time(request)
}

#[tauri::command]
fn get_total_time(mixer: State<'_, Mixer>, request: AudioIdRequest) -> Response<MixerTime> {
    mixer.get_total_time(request)
}

// =============================================================================
// Plugin Entry
// =============================================================================

pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("mixer")
        .invoke_handler(tauri::generate_handler![
            init_audio_session,
            deinit_audio_session,
            reset_plugin,
            get_audio_session_preferred_input_port_type,
            get_input_channel_count,
            init_audio_file,
            init_mic_input,
            destroy_audio_file,
            destroy_mic_input,
            play,
            stop,
            is_playing,
            adjust_volume,
            get_current_volume,
            adjust_eq,
            get_current_eq,
            set_elapsed_time_event,
            get_elapsed_time,
            get_total_time,
        ])
        .setup(|app, _api| {
            let events = Arc::new(TauriEventBridge { app: app.clone() });
            app.manage(Mixer::new(default_backend(), events));
            log::info!("[Plugin] Mixer ready");
            Ok(())
        })
        .build()
}
