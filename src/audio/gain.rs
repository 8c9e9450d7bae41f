//! Channel gain stage with an optional meter tap on its output

use super::buffer::AudioBuffer;
use super::meters::MeterTap;
use super::node::{AudioNode, NodeType, PortBuffers, PortId};
use super::CHANNEL_PORTS;
use crate::dsp::Dsp;
use arc_swap::ArcSwapOption;
use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Control-side volume, stored as f32 bits
pub struct GainControl {
    volume: AtomicU32,
}

impl GainControl {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: AtomicU32::new(volume.to_bits()),
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Release);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }
}

/// Install/remove point for a channel's output tap
pub type TapSlot = ArcSwapOption<MeterTap>;

pub struct GainNode {
    label: String,
    control: Arc<GainControl>,
    tap: Arc<TapSlot>,
    /// Gain applied at the end of the previous block (ramp start)
    current: f32,
    ports: PortBuffers,
}

impl GainNode {
    pub fn new(label: impl Into<String>, control: Arc<GainControl>) -> Self {
        let current = control.volume();
        Self {
            label: label.into(),
            control,
            tap: Arc::new(ArcSwapOption::empty()),
            current,
            ports: PortBuffers::new(CHANNEL_PORTS, CHANNEL_PORTS),
        }
    }

    /// Shared handle used by the owning channel to install or remove its tap
    pub fn tap_slot(&self) -> Arc<TapSlot> {
        self.tap.clone()
    }
}

impl AudioNode for GainNode {
    fn node_type(&self) -> NodeType {
        NodeType::Effect
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn input_port_count(&self) -> usize {
        self.ports.input_count()
    }

    fn output_port_count(&self) -> usize {
        self.ports.output_count()
    }

    fn input_buffer_mut(&mut self, port: PortId) -> Option<&mut AudioBuffer> {
        self.ports.input_mut(port.index())
    }

    fn output_buffer(&self, port: PortId) -> Option<&AudioBuffer> {
        self.ports.output(port.index())
    }

    fn process(&mut self, _frames: usize) {
        let target = self.control.volume();
        self.ports.pass_through();
        for port in 0..self.ports.output_count() {
            if let Some(out) = self.ports.output_mut(port) {
                Dsp::apply_gain_ramp(out.samples_mut(), self.current, target);
            }
        }
        self.current = target;

        let tap = self.tap.load();
        if let (Some(tap), Some(out)) = (&*tap, self.ports.output(0)) {
            tap.observe(out.samples());
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
    use crate::capture::tap_queue;

    fn feed(node: &mut GainNode, value: f32, frames: usize) {
        node.clear_buffers(frames);
        for port in 0..CHANNEL_PORTS {
            node.input_buffer_mut(PortId::new(port as u8))
                .unwrap()
                .write_samples(&vec![value; frames]);
        }
        node.process(frames);
    }

    #[test]
    fn test_volume_change_ramps_then_settles() {
        let control = Arc::new(GainControl::new(1.0));
        let mut node = GainNode::new("gain", control.clone());

        control.set_volume(0.5);
        feed(&mut node, 1.0, 256);
        let first = node.output_buffer(PortId::new(0)).unwrap().samples().to_vec();
        assert!(first[0] > 0.9);
        assert!((first[255] - 0.5).abs() < 1e-4);

        feed(&mut node, 1.0, 256);
        let second = node.output_buffer(PortId::new(1)).unwrap().samples();
        assert!(second.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_tap_sees_post_gain_samples() {
        let control = Arc::new(GainControl::new(0.25));
        let mut node = GainNode::new("gain", control);
        let (tx, rx) = tap_queue(4, 512);
        node.tap_slot().store(Some(Arc::new(MeterTap::new(tx))));

        feed(&mut node, 1.0, 128);
        let block = rx.receiver().try_recv().unwrap();
        assert_eq!(block.len(), 128);
        assert!(block.samples().iter().all(|&s| (s - 0.25).abs() < 1e-6));

        node.tap_slot().store(None);
        feed(&mut node, 1.0, 128);
        assert!(rx.receiver().try_recv().is_err());
    }
}
