//! AudioNode trait and core types

use super::buffer::AudioBuffer;
use std::any::Any;

/// Opaque node identifier inside one graph
///
/// The handle says nothing about the node's kind; the node itself carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value (for logging)
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Port (channel) index on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(u8);

impl PortId {
    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u8> for PortId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Node role, used to order nodes with equal dependency depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Produces audio (file player, mic relay)
    Source,
    /// Transforms audio (eq, gain)
    Effect,
    /// Final summing point feeding the hardware output
    Bus,
}

/// Unified interface for every node in the graph
///
/// Only `Send`: the graph lives behind one mutex, so nodes never need to be
/// shared between threads.
pub trait AudioNode: Send {
    fn node_type(&self) -> NodeType;

    fn label(&self) -> &str;

    fn input_port_count(&self) -> usize;

    fn output_port_count(&self) -> usize;

    fn input_buffer_mut(&mut self, port: PortId) -> Option<&mut AudioBuffer>;

    fn output_buffer(&self, port: PortId) -> Option<&AudioBuffer>;

    /// Run one block. Inputs have already been summed by the graph.
    ///
    /// Called from the render callback: must not allocate or block.
    fn process(&mut self, frames: usize);

    /// Zero every buffer and mark `frames` as valid
    fn clear_buffers(&mut self, frames: usize);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Input/output buffer sets shared by the node implementations
pub struct PortBuffers {
    inputs: Vec<AudioBuffer>,
    outputs: Vec<AudioBuffer>,
}

impl PortBuffers {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self {
            inputs: (0..inputs).map(|_| AudioBuffer::new()).collect(),
            outputs: (0..outputs).map(|_| AudioBuffer::new()).collect(),
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input(&self, port: usize) -> Option<&AudioBuffer> {
        self.inputs.get(port)
    }

    pub fn input_mut(&mut self, port: usize) -> Option<&mut AudioBuffer> {
        self.inputs.get_mut(port)
    }

    pub fn output(&self, port: usize) -> Option<&AudioBuffer> {
        self.outputs.get(port)
    }

    pub fn output_mut(&mut self, port: usize) -> Option<&mut AudioBuffer> {
        self.outputs.get_mut(port)
    }

    pub fn outputs_mut(&mut self) -> &mut [AudioBuffer] {
        &mut self.outputs
    }

    /// Borrow one input and the matching output at the same time
    pub fn pair_mut(&mut self, port: usize) -> Option<(&AudioBuffer, &mut AudioBuffer)> {
        let input = self.inputs.get(port)?;
        let output = self.outputs.get_mut(port)?;
        Some((input, output))
    }

    /// Copy each input to the output with the same index
    pub fn pass_through(&mut self) {
        for (input, output) in self.inputs.iter().zip(self.outputs.iter_mut()) {
            output.copy_from(input);
        }
    }

    pub fn clear(&mut self, frames: usize) {
        for buf in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            buf.clear(frames);
        }
    }
}
