//! Audio Graph Module
//!
//! Each channel contributes a linear chain `player -> eq -> gain` that feeds
//! the shared mix bus. Level control lives in the gain node; edges only route.

mod buffer;
mod edge;
mod graph;
mod node;

pub mod bus;
pub mod eq;
pub mod gain;
pub mod meters;
pub mod mix_graph;
pub mod source;

pub use buffer::AudioBuffer;
pub use edge::{Edge, EdgeId};
pub use graph::AudioGraph;
pub use node::{AudioNode, NodeHandle, NodeType, PortBuffers, PortId};
pub use mix_graph::{ChannelHandles, ChannelNodes, MixGraph};

/// Maximum frames per graph pass
pub const MAX_FRAMES: usize = 4096;

/// Ports on every channel path (stereo)
pub const CHANNEL_PORTS: usize = 2;

/// Default sample rate
pub const SAMPLE_RATE: f64 = 48000.0;
