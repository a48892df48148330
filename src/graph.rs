//! Static topology of a kernel: nodes in index order, the flow edges between
//! them, and the prefix-sum layout of the State Vector.
//!
//! Built once by the model builder and never mutated afterwards, except for
//! edge coefficients (`k`), which calibration and host code may retune.

use std::collections::HashMap;

use crate::types::{FlowLogic, NodeKind};

/// One state-carrying entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Caller-assigned identifier, stable for the kernel lifetime.
    pub external_id: String,
    /// Position in declaration order.
    pub index: usize,
    /// Base offset of this node's slice in the State Vector.
    pub offset: usize,
    pub kind: NodeKind,
    /// Indices of nodes whose prior state this node's dynamics reads.
    /// Ordered by first appearance, no duplicates.
    pub connections: Vec<usize>,
    /// Indices declared explicitly on the node (subset of `connections`);
    /// these feed the node's own coupling term.
    pub declared_connections: Vec<usize>,
}

impl Node {
    pub fn state_width(&self) -> usize {
        self.kind.state_width()
    }

    /// Range of this node's slice in the State Vector.
    pub fn slice(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.state_width()
    }
}

/// A flow between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Label used in diagnostics: the declared `id` or `#<index>`.
    pub label: String,
    pub origin: usize,
    pub target: usize,
    pub control: Option<usize>,
    pub logic: FlowLogic,
    pub k: f64,
    pub threshold: f64,
}

/// Ordered node collection plus edges and the id lookup table.
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    by_id: HashMap<String, usize>,
    state_size: usize,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node, assigning its index and State Vector offset.
    ///
    /// Returns the index of the previous node with the same id on collision.
    pub fn push_node(&mut self, external_id: &str, kind: NodeKind) -> Result<usize, usize> {
        if let Some(&first) = self.by_id.get(external_id) {
            return Err(first);
        }
        let index = self.nodes.len();
        let offset = self.state_size;
        self.state_size += kind.state_width();
        self.by_id.insert(external_id.to_string(), index);
        self.nodes.push(Node {
            external_id: external_id.to_string(),
            index,
            offset,
            kind,
            connections: Vec::new(),
            declared_connections: Vec::new(),
        });
        Ok(index)
    }

    /// Records that `reader`'s dynamics reads `source`'s prior state.
    pub fn connect(&mut self, reader: usize, source: usize) {
        let conns = &mut self.nodes[reader].connections;
        if !conns.contains(&source) {
            conns.push(source);
        }
    }

    pub fn declare_connection(&mut self, reader: usize, source: usize) {
        let declared = &mut self.nodes[reader].declared_connections;
        if !declared.contains(&source) {
            declared.push(source);
        }
        self.connect(reader, source);
    }

    /// Adds an edge and wires the read dependencies it implies.
    pub fn push_edge(&mut self, edge: Edge) {
        let mut reads = vec![edge.origin];
        reads.extend(edge.control);
        for &endpoint in &[edge.origin, edge.target] {
            for &src in &reads {
                if src != endpoint {
                    self.connect(endpoint, src);
                }
            }
        }
        self.edges.push(edge);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node owning State Vector slot `slot`.
    pub fn node_for_slot(&self, slot: usize) -> Option<&Node> {
        if slot >= self.state_size {
            return None;
        }
        let idx = self.nodes.partition_point(|n| n.offset <= slot);
        self.nodes.get(idx.checked_sub(1)?)
    }

    pub fn find(&self, external_id: &str) -> Option<usize> {
        self.by_id.get(external_id).copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    /// Sum of every node's `state_width`.
    pub fn state_size(&self) -> usize {
        self.state_size
    }
}
