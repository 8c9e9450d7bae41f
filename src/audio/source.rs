//! Source nodes - decoded file playback and mic relay playback

use super::buffer::AudioBuffer;
use super::node::{AudioNode, NodeType, PortBuffers, PortId};
use super::CHANNEL_PORTS;
use crate::capture::RelayReader;
use crate::source::DecodedFrames;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared playback state of one file channel
///
/// Written by the control domain (play/pause/stop/schedule) and by the
/// render domain (position advance, completion).
pub struct FileTransport {
    playing: Arc<AtomicBool>,
    scheduled: AtomicBool,
    /// Read position in source frames, f64 bits
    position: AtomicU64,
    frame_count: u64,
    sample_rate: f64,
    /// Last elapsed value handed out; keeps reports non-decreasing
    reported: Mutex<f64>,
}

impl FileTransport {
    pub fn new(frame_count: u64, sample_rate: f64) -> Self {
        Self {
            playing: Arc::new(AtomicBool::new(false)),
            scheduled: AtomicBool::new(false),
            position: AtomicU64::new(0.0_f64.to_bits()),
            frame_count,
            sample_rate,
            reported: Mutex::new(0.0),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Flag the output tap is gated on
    pub fn playing_flag(&self) -> Arc<AtomicBool> {
        self.playing.clone()
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Arm playback from the start. No-op (returns false) if already armed.
    pub fn schedule(&self) -> bool {
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let mut reported = self.reported.lock();
        self.position.store(0.0_f64.to_bits(), Ordering::Release);
        *reported = 0.0;
        true
    }

    pub fn play(&self) {
        self.playing.store(true, Ordering::Release);
    }

    pub fn pause(&self) {
        self.playing.store(false, Ordering::Release);
    }

    /// Halt, disarm and rewind
    pub fn stop(&self) {
        let mut reported = self.reported.lock();
        self.playing.store(false, Ordering::Release);
        self.scheduled.store(false, Ordering::Release);
        self.position.store(0.0_f64.to_bits(), Ordering::Release);
        *reported = 0.0;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn total_seconds(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.frame_count as f64 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Raw position in seconds, may go backwards after stop/reschedule
    pub fn position_seconds(&self) -> f64 {
        if self.sample_rate > 0.0 {
            f64::from_bits(self.position.load(Ordering::Acquire)) / self.sample_rate
        } else {
            0.0
        }
    }

    /// Elapsed seconds, never lower than a previously reported value since
    /// the last stop or schedule
    pub fn elapsed_seconds(&self) -> f64 {
        let mut reported = self.reported.lock();
        let fresh = self.position_seconds();
        if fresh > *reported {
            *reported = fresh;
        }
        *reported
    }

    /// Render-side advance; loses against a concurrent stop/schedule
    fn advance(&self, from_bits: u64, to: f64) -> bool {
        self.position
            .compare_exchange(from_bits, to.to_bits(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Render-side completion: stop and require a reschedule
    fn finish(&self) {
        self.playing.store(false, Ordering::Release);
        self.scheduled.store(false, Ordering::Release);
    }
}

/// Plays a fully decoded file, converting rate linearly
pub struct FilePlayerNode {
    label: String,
    frames: Arc<DecodedFrames>,
    transport: Arc<FileTransport>,
    /// Source frames per output frame
    step: f64,
    /// Fixed pre-EQ trim
    trim: f32,
    ports: PortBuffers,
}

impl FilePlayerNode {
    pub fn new(
        label: impl Into<String>,
        frames: Arc<DecodedFrames>,
        transport: Arc<FileTransport>,
        output_rate: f64,
        trim: f32,
    ) -> Self {
        let step = if output_rate > 0.0 && frames.sample_rate() > 0.0 {
            frames.sample_rate() / output_rate
        } else {
            1.0
        };
        Self {
            label: label.into(),
            frames,
            transport,
            step,
            trim,
            ports: PortBuffers::new(0, CHANNEL_PORTS),
        }
    }
}

impl AudioNode for FilePlayerNode {
    fn node_type(&self) -> NodeType {
        NodeType::Source
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn input_port_count(&self) -> usize {
        0
    }

    fn output_port_count(&self) -> usize {
        self.ports.output_count()
    }

    fn input_buffer_mut(&mut self, _port: PortId) -> Option<&mut AudioBuffer> {
        None
    }

    fn output_buffer(&self, port: PortId) -> Option<&AudioBuffer> {
        self.ports.output(port.index())
    }

    fn process(&mut self, frames: usize) {
        let transport = &self.transport;
        if !transport.is_playing() || !transport.is_scheduled() {
            return;
        }

        let start_bits = transport.position.load(Ordering::Acquire);
        let start = f64::from_bits(start_bits);
        let total = self.frames.frame_count() as f64;
        let remaining = (total - start).max(0.0);
        let count = ((remaining / self.step).ceil() as usize).min(frames);

        for port in 0..self.ports.output_count() {
            let data = self.frames.channel(port);
            let Some(out) = self.ports.output_mut(port) else {
                continue;
            };
            for (i, o) in out.samples_mut().iter_mut().take(count).enumerate() {
                let pos = start + i as f64 * self.step;
                let idx = pos as usize;
                let frac = (pos - idx as f64) as f32;
                let a = data.get(idx).copied().unwrap_or(0.0);
                let b = data.get(idx + 1).copied().unwrap_or(a);
                *o = (a + (b - a) * frac) * self.trim;
            }
        }

        let end = start + count as f64 * self.step;
        if transport.advance(start_bits, end) && end >= total {
            transport.finish();
        }
    }

    fn clear_buffers(&mut self, frames: usize) {
        self.ports.clear(frames);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Render-side switches for a relay player
#[derive(Default)]
pub struct RelayState {
    active: AtomicBool,
    flush: AtomicBool,
}

impl RelayState {
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Ask the render side to discard buffered samples on its next pass
    pub fn request_flush(&self) {
        self.flush.store(true, Ordering::Release);
    }
}

/// Plays mono samples relayed from a capture tap, duplicated to both ports
pub struct RelayPlayerNode {
    label: String,
    reader: RelayReader,
    state: Arc<RelayState>,
    ports: PortBuffers,
}

impl RelayPlayerNode {
    pub fn new(label: impl Into<String>, reader: RelayReader, state: Arc<RelayState>) -> Self {
        Self {
            label: label.into(),
            reader,
            state,
            ports: PortBuffers::new(0, CHANNEL_PORTS),
        }
    }
}

impl AudioNode for RelayPlayerNode {
    fn node_type(&self) -> NodeType {
        NodeType::Source
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn input_port_count(&self) -> usize {
        0
    }

    fn output_port_count(&self) -> usize {
        self.ports.output_count()
    }

    fn input_buffer_mut(&mut self, _port: PortId) -> Option<&mut AudioBuffer> {
        None
    }

    fn output_buffer(&self, port: PortId) -> Option<&AudioBuffer> {
        self.ports.output(port.index())
    }

    fn process(&mut self, _frames: usize) {
        if self.state.flush.swap(false, Ordering::AcqRel) {
            self.reader.flush();
        }
        if !self.state.is_active() {
            return;
        }
        if let [left, rest @ ..] = self.ports.outputs_mut() {
            self.reader.read(left.samples_mut());
            for other in rest {
                other.copy_from(left);
            }
        }
    }

    fn clear_buffers(&mut self, frames: usize) {
        self.ports.clear(frames);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::relay_ring;

    fn ramp_frames(len: usize, rate: f64) -> Arc<DecodedFrames> {
        let data: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        Arc::new(DecodedFrames::new(rate, vec![data]))
    }

    #[test]
    fn test_player_silent_until_scheduled_and_playing() {
        let transport = Arc::new(FileTransport::new(100, 48000.0));
        let mut node = FilePlayerNode::new("p", ramp_frames(100, 48000.0), transport.clone(), 48000.0, 1.0);

        node.clear_buffers(32);
        node.process(32);
        assert!(node.output_buffer(PortId::new(0)).unwrap().samples().iter().all(|&s| s == 0.0));

        transport.schedule();
        transport.play();
        node.clear_buffers(32);
        node.process(32);
        let out = node.output_buffer(PortId::new(1)).unwrap().samples();
        assert!((out[10] - 0.10).abs() < 1e-6);
        assert!((transport.position_seconds() - 32.0 / 48000.0).abs() < 1e-9);
    }

    #[test]
    fn test_player_completion_requires_reschedule() {
        let transport = Arc::new(FileTransport::new(40, 48000.0));
        let mut node = FilePlayerNode::new("p", ramp_frames(40, 48000.0), transport.clone(), 48000.0, 0.8);
        transport.schedule();
        transport.play();

        node.clear_buffers(64);
        node.process(64);
        let out = node.output_buffer(PortId::new(0)).unwrap().samples();
        assert_eq!(out[50], 0.0);
        assert!(!transport.is_playing());
        assert!(!transport.is_scheduled());
        assert!(transport.schedule());
    }

    #[test]
    fn test_player_converts_rate() {
        let transport = Arc::new(FileTransport::new(100, 24000.0));
        let mut node = FilePlayerNode::new("p", ramp_frames(100, 24000.0), transport.clone(), 48000.0, 1.0);
        transport.schedule();
        transport.play();

        node.clear_buffers(10);
        node.process(10);
        let out = node.output_buffer(PortId::new(0)).unwrap().samples();
        // half-speed read with interpolation between source frames
        assert!((out[1] - 0.005).abs() < 1e-6);
        assert!((out[2] - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_elapsed_never_decreases_until_stop() {
        let transport = FileTransport::new(48000, 48000.0);
        transport.schedule();
        transport.position.store(24000.0_f64.to_bits(), Ordering::Release);
        assert_eq!(transport.elapsed_seconds(), 0.5);

        // position source resets underneath
        transport.position.store(0.0_f64.to_bits(), Ordering::Release);
        assert_eq!(transport.elapsed_seconds(), 0.5);

        transport.stop();
        assert_eq!(transport.elapsed_seconds(), 0.0);
    }

    #[test]
    fn test_relay_player_duplicates_and_gates() {
        let (writer, reader) = relay_ring(64);
        let state = Arc::new(RelayState::default());
        let mut node = RelayPlayerNode::new("relay", reader, state.clone());

        writer.write(&[0.5; 16]);
        node.clear_buffers(16);
        node.process(16);
        assert!(node.output_buffer(PortId::new(0)).unwrap().samples().iter().all(|&s| s == 0.0));

        state.set_active(true);
        node.clear_buffers(16);
        node.process(16);
        assert!(node.output_buffer(PortId::new(1)).unwrap().samples().iter().all(|&s| s == 0.5));

        writer.write(&[0.5; 16]);
        state.request_flush();
        node.clear_buffers(16);
        node.process(16);
        assert!(node.output_buffer(PortId::new(0)).unwrap().samples().iter().all(|&s| s == 0.0));
    }
}
