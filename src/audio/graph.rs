//! Audio Graph - DAG routing with topological sort

use super::edge::{Edge, EdgeId};
use super::node::{AudioNode, NodeHandle, NodeType, PortId};
use crate::error::GraphError;
use std::collections::{HashMap, HashSet, VecDeque};

/// Node/edge store with a cached processing order
///
/// Nodes sit in `Option` slots so a pass can take one out, mix into it and
/// put it back without touching the map's layout.
pub struct AudioGraph {
    nodes: HashMap<NodeHandle, Option<Box<dyn AudioNode>>>,
    edges: Vec<Edge>,
    /// Topologically sorted, rebuilt on the control side only
    processing_order: Vec<NodeHandle>,
    next_handle: u32,
    next_edge_id: u32,
    dirty: bool,
}

impl AudioGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            processing_order: Vec::new(),
            next_handle: 1, // 0 is reserved
            next_edge_id: 1,
            dirty: false,
        }
    }

    pub fn add_node(&mut self, node: Box<dyn AudioNode>) -> NodeHandle {
        let handle = NodeHandle::new(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(handle, Some(node));
        self.dirty = true;
        handle
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, handle: NodeHandle) -> Option<Box<dyn AudioNode>> {
        let node = self.nodes.remove(&handle)?;
        self.edges
            .retain(|e| e.source != handle && e.target != handle);
        self.dirty = true;
        node
    }

    pub fn get_node(&self, handle: NodeHandle) -> Option<&dyn AudioNode> {
        self.nodes.get(&handle)?.as_deref()
    }

    pub fn get_node_mut(&mut self, handle: NodeHandle) -> Option<&mut (dyn AudioNode + 'static)> {
        self.nodes.get_mut(&handle)?.as_deref_mut()
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect two ports. Rejects unknown nodes, out-of-range ports and duplicates.
    pub fn add_edge(
        &mut self,
        source: NodeHandle,
        source_port: PortId,
        target: NodeHandle,
        target_port: PortId,
    ) -> Result<EdgeId, GraphError> {
        let src = self
            .get_node(source)
            .ok_or(GraphError::NodeNotFound(source.raw()))?;
        if source_port.index() >= src.output_port_count() {
            return Err(GraphError::InvalidPort(src.label().to_string(), source_port.index()));
        }
        let dst = self
            .get_node(target)
            .ok_or(GraphError::NodeNotFound(target.raw()))?;
        if target_port.index() >= dst.input_port_count() {
            return Err(GraphError::InvalidPort(dst.label().to_string(), target_port.index()));
        }

        if self
            .edges
            .iter()
            .any(|e| e.connects(source, source_port, target, target_port))
        {
            return Err(GraphError::DuplicateEdge(source.raw(), target.raw()));
        }

        let id = EdgeId::new(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges
            .push(Edge::new(id, source, source_port, target, target_port));
        self.dirty = true;
        Ok(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn processing_order(&self) -> &[NodeHandle] {
        &self.processing_order
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn rebuild_order(&mut self) {
        self.processing_order = self.topological_sort();
        self.dirty = false;
    }

    /// Kahn's algorithm; nodes of equal depth go Source, Effect, Bus
    fn topological_sort(&self) -> Vec<NodeHandle> {
        let mut in_degree: HashMap<NodeHandle, usize> =
            self.nodes.keys().map(|&h| (h, 0)).collect();
        let mut adjacency: HashMap<NodeHandle, Vec<NodeHandle>> = HashMap::new();

        // Multi-port connections count once per source -> target pair
        let pairs: HashSet<(NodeHandle, NodeHandle)> =
            self.edges.iter().map(|e| (e.source, e.target)).collect();
        for &(source, target) in &pairs {
            adjacency.entry(source).or_default().push(target);
            if let Some(deg) = in_degree.get_mut(&target) {
                *deg += 1;
            }
        }

        let rank = |h: &NodeHandle| match self.get_node(*h).map(|n| n.node_type()) {
            Some(NodeType::Source) => 0,
            Some(NodeType::Effect) => 1,
            Some(NodeType::Bus) => 2,
            None => 3,
        };

        let mut ready: Vec<NodeHandle> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&h, _)| h)
            .collect();
        ready.sort_by_key(|h| (rank(h), h.raw()));
        let mut queue: VecDeque<NodeHandle> = ready.into();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(handle) = queue.pop_front() {
            result.push(handle);
            if let Some(neighbors) = adjacency.get(&handle) {
                for neighbor in neighbors {
                    if let Some(deg) = in_degree.get_mut(neighbor) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            queue.push_back(*neighbor);
                        }
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            log::warn!(
                "[AudioGraph] Cycle detected, ordered {} of {} nodes",
                result.len(),
                self.nodes.len()
            );
        }

        result
    }

    /// Check the routing invariant: every non-bus node feeds exactly one
    /// downstream node, and following that chain ends at a bus.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut next: HashMap<NodeHandle, NodeHandle> = HashMap::new();
        for edge in &self.edges {
            match next.get(&edge.source) {
                Some(&existing) if existing != edge.target => {
                    let label = self.label_of(edge.source);
                    return Err(GraphError::Fanout(label));
                }
                _ => {
                    next.insert(edge.source, edge.target);
                }
            }
        }

        for &handle in self.nodes.keys() {
            let mut current = handle;
            let mut hops = 0;
            loop {
                match self.get_node(current).map(|n| n.node_type()) {
                    Some(NodeType::Bus) => break,
                    Some(_) => {}
                    None => return Err(GraphError::NodeNotFound(current.raw())),
                }
                current = match next.get(&current) {
                    Some(&n) => n,
                    None => return Err(GraphError::Unrouted(self.label_of(handle))),
                };
                hops += 1;
                if hops > self.nodes.len() {
                    return Err(GraphError::Cycle);
                }
            }
        }

        Ok(())
    }

    fn label_of(&self, handle: NodeHandle) -> String {
        self.get_node(handle)
            .map(|n| n.label().to_string())
            .unwrap_or_else(|| format!("#{}", handle.raw()))
    }

    /// Run one pass over the cached order
    ///
    /// Render-domain entry: no allocation, no order rebuild. Each node is
    /// lifted out of its slot, its inputs are summed from upstream outputs,
    /// then it is processed and put back.
    pub fn process(&mut self, frames: usize) {
        for i in 0..self.processing_order.len() {
            let handle = self.processing_order[i];
            let Some(mut node) = self.nodes.get_mut(&handle).and_then(Option::take) else {
                continue;
            };

            node.clear_buffers(frames);
            for edge in self.edges.iter().filter(|e| e.target == handle) {
                let Some(source) = self.nodes.get(&edge.source).and_then(|n| n.as_deref()) else {
                    continue;
                };
                let (Some(src_buf), Some(dst_buf)) = (
                    source.output_buffer(edge.source_port),
                    node.input_buffer_mut(edge.target_port),
                ) else {
                    continue;
                };
                dst_buf.mix_from(src_buf, 1.0);
            }
            node.process(frames);

            if let Some(slot) = self.nodes.get_mut(&handle) {
                *slot = Some(node);
            }
        }
    }
}

impl Default for AudioGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::bus::MixBus;
    use crate::audio::eq::{EqNode, EqSettings, EqStage};
    use crate::audio::gain::{GainControl, GainNode};
    use std::sync::Arc;

    fn eq_node() -> Box<EqNode> {
        Box::new(EqNode::new(
            "eq",
            Arc::new(EqStage::new(EqSettings::default(), 1.0)),
            48000.0,
        ))
    }

    fn gain_node() -> Box<GainNode> {
        Box::new(GainNode::new("gain", Arc::new(GainControl::new(1.0))))
    }

    #[test]
    fn test_add_remove_node() {
        let mut graph = AudioGraph::new();

        let handle = graph.add_node(Box::new(MixBus::new_stereo("Main")));
        assert_eq!(graph.node_count(), 1);
        assert!(graph.get_node(handle).is_some());

        assert!(graph.remove_node(handle).is_some());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_topological_sort() {
        let mut graph = AudioGraph::new();

        // bus added first so insertion order does not hide a bad sort
        let bus = graph.add_node(Box::new(MixBus::new_stereo("Main")));
        let gain = graph.add_node(gain_node());
        let eq = graph.add_node(eq_node());

        for port in 0..2u8 {
            graph.add_edge(eq, PortId::new(port), gain, PortId::new(port)).unwrap();
            graph.add_edge(gain, PortId::new(port), bus, PortId::new(port)).unwrap();
        }
        graph.rebuild_order();

        let order = graph.processing_order();
        assert_eq!(order, &[eq, gain, bus]);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let mut graph = AudioGraph::new();
        let bus = graph.add_node(Box::new(MixBus::new_stereo("Main")));
        let gain = graph.add_node(gain_node());

        assert!(graph.add_edge(gain, PortId::new(0), bus, PortId::new(0)).is_ok());
        assert!(matches!(
            graph.add_edge(gain, PortId::new(0), bus, PortId::new(0)),
            Err(GraphError::DuplicateEdge(..))
        ));
        assert!(matches!(
            graph.add_edge(gain, PortId::new(7), bus, PortId::new(0)),
            Err(GraphError::InvalidPort(..))
        ));
    }

    #[test]
    fn test_validate_rejects_unrouted_and_fanout() {
        let mut graph = AudioGraph::new();
        let bus = graph.add_node(Box::new(MixBus::new_stereo("Main")));
        let eq = graph.add_node(eq_node());
        assert!(matches!(graph.validate(), Err(GraphError::Unrouted(_))));

        let gain = graph.add_node(gain_node());
        graph.add_edge(eq, PortId::new(0), gain, PortId::new(0)).unwrap();
        graph.add_edge(gain, PortId::new(0), bus, PortId::new(0)).unwrap();
        assert!(graph.validate().is_ok());

        graph.add_edge(eq, PortId::new(1), bus, PortId::new(1)).unwrap();
        assert!(matches!(graph.validate(), Err(GraphError::Fanout(_))));
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let mut graph = AudioGraph::new();
        let bus = graph.add_node(Box::new(MixBus::new_stereo("Main")));
        let gain = graph.add_node(gain_node());
        graph.add_edge(gain, PortId::new(0), bus, PortId::new(0)).unwrap();
        graph.add_edge(gain, PortId::new(1), bus, PortId::new(1)).unwrap();

        graph.remove_node(gain);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.is_dirty());
    }
}
