//! Right-hand side of the system: edge flows plus per-node dynamics rules.
//!
//! Everything here is a pure function of the prior state, so every node sees
//! only prior-step values regardless of evaluation order.

use crate::graph::{Edge, NodeGraph};
use crate::types::{FlowLogic, NodeKind};

/// Control values at or below this are treated as empty for `limit` flows.
const LIMIT_FLOOR: f64 = 1e-9;

/// Instantaneous flow carried by `edge` under `state`.
pub fn flow(graph: &NodeGraph, edge: &Edge, state: &[f64]) -> f64 {
    let nodes = graph.nodes();
    let q = state[nodes[edge.origin].offset];
    let control = edge.control.map(|c| state[nodes[c].offset]);
    match (edge.logic, control) {
        (FlowLogic::Constant, _) => edge.k,
        (FlowLogic::Linear, _) => edge.k * q,
        (FlowLogic::Interaction, Some(c)) => edge.k * q * c,
        (FlowLogic::Limit, Some(c)) if c > LIMIT_FLOOR => (edge.k * q) / (1.0 + q / c),
        (FlowLogic::Threshold, _) => {
            if q > edge.threshold {
                edge.k
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Writes `d(state)/dt` into `deriv`.
pub fn derivatives(graph: &NodeGraph, state: &[f64], deriv: &mut [f64]) {
    deriv.fill(0.0);
    let nodes = graph.nodes();

    for edge in graph.edges() {
        let f = flow(graph, edge, state);
        deriv[nodes[edge.origin].offset] -= f;
        deriv[nodes[edge.target].offset] += f;
    }

    for node in nodes {
        let o = node.offset;
        match node.kind {
            NodeKind::Storage | NodeKind::Sink => {}
            NodeKind::Source | NodeKind::Constant => deriv[o] = 0.0,
            NodeKind::Oscillator(p) => {
                let (x, v) = (state[o], state[o + 1]);
                let forcing: f64 = node
                    .declared_connections
                    .iter()
                    .map(|&c| state[nodes[c].offset])
                    .sum();
                deriv[o] += v;
                deriv[o + 1] = -p.omega * p.omega * x - p.damping * v + p.coupling * forcing;
            }
        }
    }
}
