#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver};
use mixer_lib::source::WavFrameSourceProvider;
use mixer_lib::{ChannelEventBridge, Mixer, MixerConfig, NamedEvent, OfflineBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SESSION_LISTENER: &str = "audioSessionEvents";

pub struct Harness {
    pub mixer: Mixer,
    pub backend: Arc<OfflineBackend>,
    pub events: Receiver<NamedEvent>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let backend = Arc::new(OfflineBackend::new());
        let (tx, events) = unbounded();
        let mixer = Mixer::with_parts(
            backend.clone(),
            Arc::new(ChannelEventBridge::new(tx)),
            Arc::new(WavFrameSourceProvider),
            MixerConfig::default(),
        );
        Self {
            mixer,
            backend,
            events,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Harness with an active session
    pub fn active() -> Self {
        let harness = Self::new();
        let response = harness.mixer.init_audio_session(
            serde_json::from_value(serde_json::json!({
                "audioSessionListenerName": SESSION_LISTENER,
            }))
            .unwrap(),
        );
        assert!(response.is_success(), "{}", response.message);
        harness
    }

    /// Mono 48 kHz WAV of `frames` frames at a constant level
    pub fn wav(&self, name: &str, frames: usize) -> String {
        let path = self.dir.path().join(name);
        write_wav(&path, frames);
        path.to_string_lossy().into_owned()
    }

    pub fn next_event(&self, name: &str) -> NamedEvent {
        loop {
            let event = self
                .events
                .recv_timeout(Duration::from_secs(2))
                .unwrap_or_else(|_| panic!("no '{}' event", name));
            if event.name == name {
                return event;
            }
        }
    }
}

pub fn write_wav(path: &Path, frames: usize) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        writer.write_sample(8192i16).unwrap();
    }
    writer.finalize().unwrap();
    path.to_path_buf()
}

pub fn request<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
