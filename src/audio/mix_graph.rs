//! MixGraph - the shared render graph
//!
//! One mutex guards the whole [`AudioGraph`]. The control domain holds it
//! for the duration of an attach or detach, so a channel's three nodes and
//! their edges appear and disappear in one step. The render callback only
//! ever `try_lock`s: when a structural change is in progress it outputs
//! silence for that cycle instead of waiting.

use super::bus::MixBus;
use super::graph::AudioGraph;
use super::node::{AudioNode, NodeHandle, PortId};
use super::{CHANNEL_PORTS, MAX_FRAMES};
use crate::backend::Renderer;
use crate::dsp::Dsp;
use crate::error::GraphError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A channel's signal path before it is attached
pub struct ChannelNodes {
    pub player: Box<dyn AudioNode>,
    pub eq: Box<dyn AudioNode>,
    pub gain: Box<dyn AudioNode>,
}

/// Handles of an attached channel path, needed to detach it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelHandles {
    pub player: NodeHandle,
    pub eq: NodeHandle,
    pub gain: NodeHandle,
}

pub struct MixGraph {
    graph: Mutex<AudioGraph>,
    bus: NodeHandle,
    sample_rate: f64,
    /// Bumped on every structural change
    generation: AtomicU64,
    /// Render cycles that found the graph locked
    skipped_cycles: AtomicU64,
    rendered_frames: AtomicU64,
}

impl MixGraph {
    pub fn new(sample_rate: f64) -> Self {
        let mut graph = AudioGraph::new();
        let bus = graph.add_node(Box::new(MixBus::new("Main Mixer", CHANNEL_PORTS)));
        graph.rebuild_order();
        Self {
            graph: Mutex::new(graph),
            bus,
            sample_rate,
            generation: AtomicU64::new(0),
            skipped_cycles: AtomicU64::new(0),
            rendered_frames: AtomicU64::new(0),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn bus(&self) -> NodeHandle {
        self.bus
    }

    /// Wire `player -> eq -> gain -> bus` as one atomic change
    pub fn attach_channel(&self, nodes: ChannelNodes) -> Result<ChannelHandles, GraphError> {
        let mut graph = self.graph.lock();
        let handles = ChannelHandles {
            player: graph.add_node(nodes.player),
            eq: graph.add_node(nodes.eq),
            gain: graph.add_node(nodes.gain),
        };

        if let Err(e) = Self::connect_path(&mut graph, handles, self.bus).and_then(|_| graph.validate()) {
            Self::remove_path(&mut graph, handles);
            graph.rebuild_order();
            log::error!("[MixGraph] Attach failed: {}", e);
            return Err(e);
        }

        graph.rebuild_order();
        self.generation.fetch_add(1, Ordering::AcqRel);
        log::debug!(
            "[MixGraph] Attached channel path #{}/#{}/#{} ({} nodes)",
            handles.player.raw(),
            handles.eq.raw(),
            handles.gain.raw(),
            graph.node_count()
        );
        Ok(handles)
    }

    /// Remove a channel path; returns false if none of its nodes were present
    pub fn detach_channel(&self, handles: ChannelHandles) -> bool {
        let mut graph = self.graph.lock();
        let removed = Self::remove_path(&mut graph, handles);
        graph.rebuild_order();
        self.generation.fetch_add(1, Ordering::AcqRel);
        log::debug!(
            "[MixGraph] Detached channel path #{} ({} nodes left)",
            handles.player.raw(),
            graph.node_count()
        );
        removed
    }

    fn connect_path(
        graph: &mut AudioGraph,
        handles: ChannelHandles,
        bus: NodeHandle,
    ) -> Result<(), GraphError> {
        let hops = [
            (handles.player, handles.eq),
            (handles.eq, handles.gain),
            (handles.gain, bus),
        ];
        for (from, to) in hops {
            for port in 0..CHANNEL_PORTS as u8 {
                graph.add_edge(from, PortId::new(port), to, PortId::new(port))?;
            }
        }
        Ok(())
    }

    fn remove_path(graph: &mut AudioGraph, handles: ChannelHandles) -> bool {
        let mut removed = false;
        for handle in [handles.player, handles.eq, handles.gain] {
            removed |= graph.remove_node(handle).is_some();
        }
        removed
    }

    /// Run `f` on a node of concrete type `N` under the graph lock
    pub fn with_node_mut<N: 'static, R>(&self, handle: NodeHandle, f: impl FnOnce(&mut N) -> R) -> Option<R> {
        let mut graph = self.graph.lock();
        let node = graph.get_node_mut(handle)?;
        node.as_any_mut().downcast_mut::<N>().map(f)
    }

    pub fn node_count(&self) -> usize {
        self.graph.lock().node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.lock().edge_count()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles.load(Ordering::Relaxed)
    }

    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames.load(Ordering::Relaxed)
    }

    /// Check the routing invariant on the live graph
    pub fn validate(&self) -> Result<(), GraphError> {
        self.graph.lock().validate()
    }
}

impl Renderer for MixGraph {
    fn render(&self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let Some(mut graph) = self.graph.try_lock() else {
            Dsp::clear(out);
            self.skipped_cycles.fetch_add(1, Ordering::Relaxed);
            return;
        };

        for chunk in out.chunks_mut(MAX_FRAMES * channels) {
            let frames = chunk.len() / channels;
            graph.process(frames);

            let Some(bus) = graph.get_node(self.bus) else {
                Dsp::clear(chunk);
                continue;
            };
            let ports = bus.output_port_count();
            for ch in 0..channels {
                let source = if ch < ports {
                    bus.output_buffer(PortId::new(ch as u8))
                } else {
                    None
                };
                match source {
                    Some(buf) => {
                        let samples = buf.samples();
                        for (frame, out) in chunk.chunks_exact_mut(channels).enumerate() {
                            out[ch] = samples.get(frame).copied().unwrap_or(0.0);
                        }
                    }
                    None => {
                        for out in chunk.chunks_exact_mut(channels) {
                            out[ch] = 0.0;
                        }
                    }
                }
            }
            self.rendered_frames.fetch_add(frames as u64, Ordering::Relaxed);
        }
    }
}
