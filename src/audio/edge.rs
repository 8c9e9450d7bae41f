//! Edge - a single port-to-port connection

use super::node::{NodeHandle, PortId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(u32);

impl EdgeId {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Connection from a source node's output port to a target node's input port
///
/// Edges carry no gain; level control belongs to the channel's gain node.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeHandle,
    pub source_port: PortId,
    pub target: NodeHandle,
    pub target_port: PortId,
}

impl Edge {
    pub fn new(
        id: EdgeId,
        source: NodeHandle,
        source_port: PortId,
        target: NodeHandle,
        target_port: PortId,
    ) -> Self {
        Self {
            id,
            source,
            source_port,
            target,
            target_port,
        }
    }

    /// Same endpoints on both sides
    pub fn connects(
        &self,
        source: NodeHandle,
        source_port: PortId,
        target: NodeHandle,
        target_port: PortId,
    ) -> bool {
        self.source == source
            && self.source_port == source_port
            && self.target == target
            && self.target_port == target_port
    }
}
