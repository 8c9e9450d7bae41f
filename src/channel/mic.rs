//! Mic channel - live hardware input through the mix graph
//!
//! Capture and render are different clock domains. The input sink picks one
//! hardware channel and queues it to two workers: the relay worker writes
//! into the SPSC ring read by [`RelayPlayerNode`], the meter worker computes
//! levels. Neither worker runs in the capture callback.

use super::{ChannelContext, ChannelControl, ChannelSettings, DestroySummary, SignalPath};
use crate::audio::eq::{EqBand, EqSettings};
use crate::audio::meters::{BlockAccumulator, MeterSample};
use crate::audio::source::{RelayPlayerNode, RelayState};
use crate::backend::{AudioBackend, InputHandle, InputSink};
use crate::capture::{relay_ring, tap_queue, BackgroundQueue, RelayWriter, TapSender};
use crate::engine::Engine;
use crate::error::{MixerError, MixerResult};
use crate::events::{EventBridge, MixerEvent};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MicState {
    Running,
    Interrupted,
}

/// Extracts one channel of interleaved input into pooled blocks
struct ChannelExtractor {
    channel: usize,
    relay: TapSender,
    meter: Option<TapSender>,
}

impl ChannelExtractor {
    fn push(sender: &TapSender, interleaved: &[f32], channel: usize, width: usize) {
        for chunk in interleaved.chunks(sender.block_size() * width) {
            sender.offer_with(|block| {
                block.extend(chunk.iter().skip(channel).step_by(width).copied());
            });
        }
    }
}

impl InputSink for ChannelExtractor {
    fn on_input(&self, interleaved: &[f32], channels: usize) {
        let width = channels.max(1);
        if self.channel >= width {
            return;
        }
        Self::push(&self.relay, interleaved, self.channel, width);
        if let Some(meter) = &self.meter {
            Self::push(meter, interleaved, self.channel, width);
        }
    }
}

/// Streaming linear rate converter for the relay worker
struct LinearResampler {
    /// Input samples per output sample
    step: f64,
    /// Read position; -1..0 addresses `prev`
    pos: f64,
    prev: f32,
    out: Vec<f32>,
}

impl LinearResampler {
    fn new(input_rate: f64, output_rate: f64) -> Self {
        Self {
            step: input_rate / output_rate,
            pos: 0.0,
            prev: 0.0,
            out: Vec::new(),
        }
    }

    fn process(&mut self, input: &[f32]) -> &[f32] {
        self.out.clear();
        let Some(&last) = input.last() else {
            return &self.out;
        };
        let limit = (input.len() - 1) as f64;
        while self.pos < limit {
            let floor = self.pos.floor();
            let frac = (self.pos - floor) as f32;
            let a = if floor < 0.0 { self.prev } else { input[floor as usize] };
            let b = input[(floor + 1.0) as usize];
            self.out.push(a + (b - a) * frac);
            self.pos += self.step;
        }
        self.pos -= input.len() as f64;
        self.prev = last;
        &self.out
    }
}

/// Input stream and workers; exists only while Running
struct MicCapture {
    input: InputHandle,
    relay_worker: BackgroundQueue,
    meter_worker: Option<BackgroundQueue>,
}

pub struct MicChannel {
    id: String,
    path: SignalPath,
    engine: Arc<Engine>,
    events: Arc<dyn EventBridge>,
    listener_name: String,
    channel_number: usize,
    relay: RelayWriter,
    relay_state: Arc<RelayState>,
    capture: Option<MicCapture>,
    state: MicState,
    queue_depth: usize,
    block_size: usize,
}

impl MicChannel {
    pub fn setup(id: &str, settings: &ChannelSettings, ctx: &ChannelContext) -> MixerResult<Self> {
        let backend = ctx.engine.backend();
        let format = backend
            .input_format()
            .ok_or_else(|| MixerError::Validation("no input device available".to_string()))?;
        if settings.channel_number >= format.channels as usize {
            return Err(MixerError::Validation(format!(
                "channel number {} out of range, input has {} channels",
                settings.channel_number, format.channels
            )));
        }

        let (relay, reader) = relay_ring(ctx.config.relay_ring_frames);
        let relay_state = Arc::new(RelayState::default());
        let player = RelayPlayerNode::new(format!("{}.player", id), reader, relay_state.clone());
        let path = SignalPath::attach(ctx.engine.graph(), id, Box::new(player), settings, &ctx.config)?;

        let mut channel = Self {
            id: id.to_string(),
            path,
            engine: ctx.engine.clone(),
            events: ctx.events.clone(),
            listener_name: settings.listener_name.clone(),
            channel_number: settings.channel_number,
            relay,
            relay_state,
            capture: None,
            state: MicState::Interrupted,
            queue_depth: ctx.config.queue_depth,
            block_size: ctx.config.tap_block_size,
        };

        if let Err(e) = channel.start_capture() {
            channel.destroy();
            return Err(e);
        }
        log::info!(
            "[MicChannel] {} capturing input channel {} of {}",
            id,
            settings.channel_number,
            format.channels
        );
        Ok(channel)
    }

    /// Open the input, spawn both workers and start rendering
    fn start_capture(&mut self) -> MixerResult<()> {
        let backend = self.engine.backend().clone();
        let input_rate = backend
            .input_format()
            .map(|f| f.sample_rate)
            .unwrap_or_else(|| self.engine.sample_rate());
        let output_rate = self.engine.sample_rate();

        let (relay_tx, relay_rx) = tap_queue(self.queue_depth, self.block_size);
        let writer = self.relay.clone();
        let mut resampler = (input_rate > 0.0 && (input_rate - output_rate).abs() > f64::EPSILON)
            .then(|| LinearResampler::new(input_rate, output_rate));
        let relay_worker = BackgroundQueue::spawn(format!("mixer.micInput.{}", self.id), relay_rx, move |samples| {
            let samples = match resampler.as_mut() {
                Some(r) => r.process(samples),
                None => samples,
            };
            writer.write(samples);
        })
        .map_err(|e| MixerError::EngineStart(format!("mic relay worker: {}", e)))?;

        let mut meter_worker = None;
        let mut meter_tx = None;
        if !self.listener_name.is_empty() {
            let (tx, rx) = tap_queue(self.queue_depth, self.block_size);
            let events = self.events.clone();
            let listener = self.listener_name.clone();
            let mut blocks = BlockAccumulator::new(self.block_size);
            let worker = BackgroundQueue::spawn(format!("mixer.micMeter.{}", self.id), rx, move |samples| {
                blocks.push(samples, |block| {
                    let level = MeterSample::measure(block).level_db;
                    events.notify(&listener, &MixerEvent::Meter { meter_level: level });
                });
            })
            .map_err(|e| MixerError::EngineStart(format!("mic meter worker: {}", e)))?;
            meter_worker = Some(worker);
            meter_tx = Some(tx);
        }

        let sink = Arc::new(ChannelExtractor {
            channel: self.channel_number,
            relay: relay_tx,
            meter: meter_tx,
        });
        let input = backend.open_input(sink)?;

        // stale samples from before an interruption must not play
        self.relay_state.request_flush();
        self.relay_state.set_active(true);
        self.capture = Some(MicCapture {
            input,
            relay_worker,
            meter_worker,
        });
        self.state = MicState::Running;

        if let Err(e) = self.engine.ensure_running() {
            self.stop_capture(backend.as_ref());
            return Err(e);
        }
        Ok(())
    }

    fn stop_capture(&mut self, backend: &dyn AudioBackend) {
        self.relay_state.set_active(false);
        if let Some(mut capture) = self.capture.take() {
            backend.close_input(capture.input);
            capture.relay_worker.cancel();
            if let Some(mut meter) = capture.meter_worker.take() {
                meter.cancel();
            }
        }
        self.state = MicState::Interrupted;
    }

    /// Drop the input and workers, keep the graph nodes
    pub fn interrupt(&mut self) {
        if self.state == MicState::Interrupted {
            return;
        }
        let backend = self.engine.backend().clone();
        self.stop_capture(backend.as_ref());
        log::info!("[MicChannel] {} interrupted", self.id);
    }

    /// Re-acquire the (possibly different) input device
    pub fn resume_from_interrupt(&mut self) -> MixerResult<()> {
        if self.state == MicState::Running {
            return Ok(());
        }
        self.start_capture()?;
        log::info!("[MicChannel] {} resumed", self.id);
        Ok(())
    }

    pub fn state(&self) -> MicState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == MicState::Running
    }

    pub fn channel_number(&self) -> usize {
        self.channel_number
    }

    pub fn listener_name(&self) -> &str {
        &self.listener_name
    }
}

impl ChannelControl for MicChannel {
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
        let backend = self.engine.backend().clone();
        self.stop_capture(backend.as_ref());
        self.path.detach();
        log::info!("[MicChannel] {} destroyed", self.id);
        DestroySummary {
            listener_name: self.listener_name.clone(),
            elapsed_time_event_name: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::config::MixerConfig;
    use crate::events::ChannelEventBridge;
    use crate::source::WavFrameSourceProvider;
    use std::time::Duration;

    fn context(backend: Arc<OfflineBackend>, events: Arc<dyn EventBridge>) -> ChannelContext {
        ChannelContext {
            engine: Arc::new(Engine::new(backend)),
            events,
            sources: Arc::new(WavFrameSourceProvider),
            config: Arc::new(MixerConfig::default()),
        }
    }

    fn settings(channel_number: usize, listener: &str) -> ChannelSettings {
        ChannelSettings {
            channel_number,
            listener_name: listener.to_string(),
            ..ChannelSettings::from_config(&MixerConfig::default())
        }
    }

    #[test]
    fn test_channel_number_must_exist() {
        let backend = Arc::new(OfflineBackend::new());
        let (tx, _rx) = crossbeam_channel::unbounded();
        let ctx = context(backend, Arc::new(ChannelEventBridge::new(tx)));
        let err = MicChannel::setup("m", &settings(2, ""), &ctx).err();
        assert!(matches!(err, Some(MixerError::Validation(_))));
        assert_eq!(ctx.engine.graph().node_count(), 1);
    }

    #[test]
    fn test_selected_channel_is_metered() {
        let backend = Arc::new(OfflineBackend::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        let ctx = context(backend.clone(), Arc::new(ChannelEventBridge::new(tx)));
        let mic = MicChannel::setup("m", &settings(1, "level"), &ctx).unwrap();
        assert!(mic.is_running());

        // left silent, right full scale
        let input: Vec<f32> = (0..1024).flat_map(|_| [0.0, 1.0]).collect();
        backend.push_input(&input);

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.name, "level");
        match event.event {
            MixerEvent::Meter { meter_level } => assert!(meter_level.abs() < 1e-3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_interrupt_and_resume() {
        let backend = Arc::new(OfflineBackend::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        let ctx = context(backend.clone(), Arc::new(ChannelEventBridge::new(tx)));
        let mut mic = MicChannel::setup("m", &settings(0, "level"), &ctx).unwrap();

        mic.interrupt();
        assert_eq!(mic.state(), MicState::Interrupted);
        assert_eq!(backend.open_input_count(), 0);
        backend.push_input(&[0.5; 64]);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(ctx.engine.graph().node_count(), 4);

        mic.resume_from_interrupt().unwrap();
        assert_eq!(mic.state(), MicState::Running);
        backend.push_input(&[0.5; 2048]);
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());

        mic.destroy();
        assert_eq!(backend.open_input_count(), 0);
        assert_eq!(ctx.engine.graph().node_count(), 1);
    }

    #[test]
    fn test_resampler_ratio() {
        let mut r = LinearResampler::new(24000.0, 48000.0);
        let out = r.process(&[0.0, 1.0, 2.0, 3.0]).to_vec();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
        // continues across block boundaries through `prev`
        let out = r.process(&[4.0, 5.0]).to_vec();
        assert_eq!(out, vec![3.0, 3.5, 4.0, 4.5]);
    }
}
