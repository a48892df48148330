#![no_main]

use libfuzzer_sys::fuzz_target;
use gssk_core::kernel::Kernel;
use serde_json::json;

const KINDS: [&str; 5] = ["storage", "source", "sink", "constant", "oscillator"];
const LOGICS: [&str; 5] = ["constant", "linear", "interaction", "limit", "threshold"];

#[derive(Debug, Clone, arbitrary::Arbitrary)]
struct FuzzNode {
    kind: u8,
    value: f64,
}

#[derive(Debug, Clone, arbitrary::Arbitrary)]
struct FuzzEdge {
    origin: u8,
    target: u8,
    control: u8,
    logic: u8,
    k: f64,
    threshold: f64,
}

#[derive(Debug, Clone, arbitrary::Arbitrary)]
struct FuzzModel {
    nodes: Vec<FuzzNode>,
    edges: Vec<FuzzEdge>,
    rk4: bool,
    dts: Vec<f64>,
}

fuzz_target!(|input: FuzzModel| {
    if input.nodes.is_empty() || input.nodes.len() > 16 || input.edges.len() > 32 {
        return;
    }
    // JSON cannot carry non-finite numbers.
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    let n = input.nodes.len();

    let nodes: Vec<_> = input
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let kind = KINDS[node.kind as usize % KINDS.len()];
            let value = finite(node.value);
            if kind == "oscillator" {
                json!({"id": format!("n{}", i), "type": kind, "value": [value, 0.0], "params": {"omega": 1.0}})
            } else {
                json!({"id": format!("n{}", i), "type": kind, "value": value})
            }
        })
        .collect();
    let edges: Vec<_> = input
        .edges
        .iter()
        .map(|e| {
            json!({
                "origin": format!("n{}", e.origin as usize % n),
                "target": format!("n{}", e.target as usize % n),
                "logic": LOGICS[e.logic as usize % LOGICS.len()],
                "params": {
                    "k": finite(e.k),
                    "threshold": finite(e.threshold),
                    "control_node": format!("n{}", e.control as usize % n)
                }
            })
        })
        .collect();
    let doc = json!({
        "nodes": nodes,
        "edges": edges,
        "config": {"t_end": 1.0, "dt": 0.1, "method": if input.rk4 { "rk4" } else { "euler" }}
    });

    let mut kernel = Kernel::from_json(&doc.to_string()).expect("generated models are valid");
    for dt in input.dts.iter().take(64) {
        let before = kernel.state().to_vec();
        let t_before = kernel.t_current();
        match kernel.step(*dt) {
            Ok(outcome) => {
                assert!(kernel.state().iter().all(|v| v.is_finite()));
                assert!(outcome.t_current <= kernel.t_end());
                assert!(outcome.t_current > t_before);
            }
            Err(_) => {
                assert_eq!(kernel.state(), before.as_slice());
                assert_eq!(kernel.t_current(), t_before);
            }
        }
    }
});
