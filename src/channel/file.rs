//! File channel - decoded file playback
//!
//! The whole file is decoded once at setup. Scheduling only re-arms the
//! in-memory frames, so play/stop cycles never touch storage again.

use super::{ChannelContext, ChannelControl, ChannelSettings, DestroySummary, SignalPath};
use crate::audio::eq::{EqBand, EqSettings};
use crate::audio::meters::{BlockAccumulator, MeterSample, MeterTap};
use crate::audio::source::{FilePlayerNode, FileTransport};
use crate::capture::{tap_queue, BackgroundQueue};
use crate::engine::Engine;
use crate::error::{MixerError, MixerResult};
use crate::events::{EventBridge, MixerEvent, MixerTime};
use arc_swap::ArcSwap;
use std::sync::Arc;

pub struct FileChannel {
    id: String,
    path: SignalPath,
    transport: Arc<FileTransport>,
    engine: Arc<Engine>,
    events: Arc<dyn EventBridge>,
    listener_name: Arc<ArcSwap<String>>,
    elapsed_event: Arc<ArcSwap<String>>,
    meter: Option<BackgroundQueue>,
    queue_depth: usize,
    block_size: usize,
}

impl FileChannel {
    /// Open `file_path`, attach the signal path and start the engine
    pub fn setup(
        id: &str,
        file_path: &str,
        settings: &ChannelSettings,
        ctx: &ChannelContext,
    ) -> MixerResult<Self> {
        let mut source = ctx.sources.open(file_path)?;
        let format = source.format();
        let frames = Arc::new(source.read()?);
        log::debug!(
            "[FileChannel] {}: {} frames @ {} Hz, {} ch",
            id,
            frames.frame_count(),
            format.sample_rate,
            frames.channel_count()
        );

        let transport = Arc::new(FileTransport::new(frames.frame_count() as u64, frames.sample_rate()));
        let graph = ctx.engine.graph();
        let player = FilePlayerNode::new(
            format!("{}.player", id),
            frames,
            transport.clone(),
            graph.sample_rate(),
            ctx.config.source_trim,
        );
        let path = SignalPath::attach(graph, id, Box::new(player), settings, &ctx.config)?;

        let mut channel = Self {
            id: id.to_string(),
            path,
            transport,
            engine: ctx.engine.clone(),
            events: ctx.events.clone(),
            listener_name: Arc::new(ArcSwap::from_pointee(settings.listener_name.clone())),
            elapsed_event: Arc::new(ArcSwap::from_pointee(settings.elapsed_time_event_name.clone())),
            meter: None,
            queue_depth: ctx.config.queue_depth,
            block_size: ctx.config.tap_block_size,
        };

        let started = channel
            .refresh_meter()
            .and_then(|_| ctx.engine.ensure_running());
        if let Err(e) = started {
            channel.destroy();
            return Err(e);
        }

        log::info!("[FileChannel] {} ready ({:.2}s)", id, channel.total());
        Ok(channel)
    }

    /// Install the output tap once either event name is set
    fn refresh_meter(&mut self) -> MixerResult<()> {
        let wanted = !self.listener_name.load().is_empty() || !self.elapsed_event.load().is_empty();
        if !wanted || self.meter.is_some() {
            return Ok(());
        }

        let (sender, receiver) = tap_queue(self.queue_depth, self.block_size);
        let events = self.events.clone();
        let listener = self.listener_name.clone();
        let elapsed_event = self.elapsed_event.clone();
        let transport = self.transport.clone();
        let mut blocks = BlockAccumulator::new(self.block_size);

        let worker = BackgroundQueue::spawn(format!("mixer.audioMeter.{}", self.id), receiver, move |samples| {
            blocks.push(samples, |block| {
                let listener = listener.load();
                if !listener.is_empty() {
                    let level = MeterSample::measure(block).level_db;
                    events.notify(&listener, &MixerEvent::Meter { meter_level: level });
                }
                let elapsed_event = elapsed_event.load();
                if !elapsed_event.is_empty() {
                    let time = MixerTime::from_seconds(transport.elapsed_seconds());
                    events.notify(&elapsed_event, &MixerEvent::Time(time));
                }
            });
        })
        .map_err(|e| MixerError::EngineStart(format!("meter worker: {}", e)))?;

        self.path
            .install_tap(MeterTap::gated(sender, self.transport.playing_flag()));
        self.meter = Some(worker);
        Ok(())
    }

    /// Arm the decoded frames for playback; no-op if already armed
    pub fn schedule_frames(&self) -> bool {
        self.transport.schedule()
    }

    /// Toggle play/pause, scheduling first when needed
    pub fn play_or_pause(&self) -> MixerResult<&'static str> {
        if self.transport.is_playing() {
            self.transport.pause();
            log::debug!("[FileChannel] {} paused", self.id);
            return Ok("pause");
        }
        self.start_playback()?;
        Ok("play")
    }

    fn start_playback(&self) -> MixerResult<()> {
        self.engine.ensure_running()?;
        if !self.transport.is_scheduled() {
            self.schedule_frames();
        }
        self.transport.play();
        log::debug!("[FileChannel] {} playing", self.id);
        Ok(())
    }

    /// Halt and rewind; the channel stays playable
    pub fn stop(&self) -> &'static str {
        self.transport.stop();
        log::debug!("[FileChannel] {} stopped", self.id);
        "stop"
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn is_scheduled(&self) -> bool {
        self.transport.is_scheduled()
    }

    /// Pause for a session interruption; true if it was playing
    pub fn pause_for_interrupt(&self) -> bool {
        if self.transport.is_playing() {
            self.transport.pause();
            true
        } else {
            false
        }
    }

    /// Resume after an interruption
    pub fn resume(&self) -> MixerResult<()> {
        self.start_playback()
    }

    pub fn set_elapsed_time_event(&mut self, event_name: &str) -> MixerResult<()> {
        self.elapsed_event.store(Arc::new(event_name.to_string()));
        self.refresh_meter()
    }

    pub fn listener_name(&self) -> String {
        self.listener_name.load().to_string()
    }

    pub fn elapsed_time_event_name(&self) -> String {
        self.elapsed_event.load().to_string()
    }

    pub fn elapsed(&self) -> f64 {
        self.transport.elapsed_seconds()
    }

    pub fn total(&self) -> f64 {
        self.transport.total_seconds()
    }

    pub fn has_meter(&self) -> bool {
        self.path.has_tap()
    }

    pub fn is_attached(&self) -> bool {
        self.path.is_attached()
    }
}

impl ChannelControl for FileChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_volume(&self, volume: f32) {
        self.path.gain().set_volume(volume);
    }

    fn volume(&self) -> f32 {
        self.path.gain().volume()
    }

    fn adjust_eq(&self, band: EqBand, gain: f32, frequency: f32) -> EqSettings {
        self.path.eq().adjust_band(band, gain, frequency)
    }

    fn current_eq(&self) -> EqSettings {
        self.path.eq().current_settings()
    }

    fn destroy(&mut self) -> DestroySummary {
        self.transport.stop();
        self.path.remove_tap();
        if let Some(mut meter) = self.meter.take() {
            meter.cancel();
        }
        self.path.detach();
        log::info!("[FileChannel] {} destroyed", self.id);
        DestroySummary {
            listener_name: self.listener_name(),
            elapsed_time_event_name: self.elapsed_time_event_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AudioBackend, OfflineBackend};
    use crate::config::MixerConfig;
    use crate::error::FrameSourceError;
    use crate::events::NullEventBridge;
    use crate::source::{DecodedFrames, FrameSource, FrameSourceProvider, SourceFormat};

    struct ToneProvider;

    struct Tone;

    impl FrameSource for Tone {
        fn format(&self) -> SourceFormat {
            SourceFormat {
                sample_rate: 48000.0,
                frame_count: 4800,
                channels: 1,
            }
        }

        fn read(&mut self) -> Result<DecodedFrames, FrameSourceError> {
            Ok(DecodedFrames::new(48000.0, vec![vec![0.5; 4800]]))
        }
    }

    impl FrameSourceProvider for ToneProvider {
        fn open(&self, path: &str) -> Result<Box<dyn FrameSource>, FrameSourceError> {
            if path == "missing" {
                return Err(FrameSourceError::NotFound(path.to_string()));
            }
            Ok(Box::new(Tone))
        }
    }

    fn context(backend: Arc<OfflineBackend>) -> ChannelContext {
        ChannelContext {
            engine: Arc::new(Engine::new(backend)),
            events: Arc::new(NullEventBridge),
            sources: Arc::new(ToneProvider),
            config: Arc::new(MixerConfig::default()),
        }
    }

    fn settings() -> ChannelSettings {
        ChannelSettings::from_config(&MixerConfig::default())
    }

    #[test]
    fn test_play_pause_stop_cycle() {
        let backend = Arc::new(OfflineBackend::new());
        let ctx = context(backend.clone());
        let channel = FileChannel::setup("a", "tone", &settings(), &ctx).unwrap();
        assert!(backend.is_running());
        assert!(!channel.is_scheduled());

        assert_eq!(channel.play_or_pause().unwrap(), "play");
        assert!(channel.is_scheduled());
        backend.render(480);
        assert!((channel.elapsed() - 0.01).abs() < 1e-6);

        assert_eq!(channel.play_or_pause().unwrap(), "pause");
        assert_eq!(channel.stop(), "stop");
        assert_eq!(channel.elapsed(), 0.0);
        assert!(!channel.is_scheduled());
        assert!((channel.total() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let backend = Arc::new(OfflineBackend::new());
        let ctx = context(backend);
        let channel = FileChannel::setup("a", "tone", &settings(), &ctx).unwrap();
        assert!(channel.schedule_frames());
        assert!(!channel.schedule_frames());
    }

    #[test]
    fn test_completion_requires_reschedule() {
        let backend = Arc::new(OfflineBackend::new());
        let ctx = context(backend.clone());
        let channel = FileChannel::setup("a", "tone", &settings(), &ctx).unwrap();
        channel.play_or_pause().unwrap();
        backend.render(4800 + 64);
        assert!(!channel.is_playing());
        assert!(!channel.is_scheduled());

        assert_eq!(channel.play_or_pause().unwrap(), "play");
        assert!(channel.is_scheduled());
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let ctx = context(Arc::new(OfflineBackend::new()));
        let err = FileChannel::setup("a", "missing", &settings(), &ctx).err();
        assert!(matches!(err, Some(MixerError::Io(_))));
        assert_eq!(ctx.engine.graph().node_count(), 1);
    }

    #[test]
    fn test_engine_failure_rolls_back_nodes() {
        let backend = Arc::new(OfflineBackend::new());
        let ctx = context(backend.clone());
        backend.fail_next_start();
        let err = FileChannel::setup("a", "tone", &settings(), &ctx).err();
        assert!(matches!(err, Some(MixerError::EngineStart(_))));
        assert_eq!(ctx.engine.graph().node_count(), 1);
    }

    #[test]
    fn test_meter_installed_only_with_event_name() {
        let ctx = context(Arc::new(OfflineBackend::new()));
        let mut channel = FileChannel::setup("a", "tone", &settings(), &ctx).unwrap();
        assert!(!channel.has_meter());
        channel.set_elapsed_time_event("elapsed").unwrap();
        assert!(channel.has_meter());

        let summary = channel.destroy();
        assert_eq!(summary.elapsed_time_event_name, "elapsed");
        assert!(!channel.has_meter());
        assert!(!channel.is_attached());
    }
}
