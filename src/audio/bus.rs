//! Mix Bus - the summing point every channel feeds

use super::buffer::AudioBuffer;
use super::node::{AudioNode, NodeType, PortBuffers, PortId};
use std::any::Any;

/// Output bus
///
/// Has no fader of its own: channel levels are set on each channel's gain
/// node, and the graph sums all incoming edges into the input buffers.
pub struct MixBus {
    label: String,
    ports: PortBuffers,
}

impl MixBus {
    pub fn new(label: impl Into<String>, port_count: usize) -> Self {
        let port_count = port_count.max(1);
        Self {
            label: label.into(),
            ports: PortBuffers::new(port_count, port_count),
        }
    }

    pub fn new_stereo(label: impl Into<String>) -> Self {
        Self::new(label, 2)
    }
}

impl AudioNode for MixBus {
    fn node_type(&self) -> NodeType {
        NodeType::Bus
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
        self.ports.pass_through();
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
