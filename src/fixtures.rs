//! Canned model documents for tests, benchmarks and fuzz targets.

use serde_json::{json, Value};

/// One constant node with state `[1.0]` over `t = 0..1`, `dt = 0.5`.
pub fn identity_model() -> Value {
    json!({
        "nodes": [{"id": "x", "type": "constant", "value": 1.0}],
        "config": {"t_start": 0.0, "t_end": 1.0, "dt": 0.5}
    })
}

/// A fixed source feeding a storage through a linear edge of coefficient `k`.
pub fn source_storage_model(k: f64, t_end: f64, dt: f64) -> Value {
    json!({
        "nodes": [
            {"id": "Source", "type": "source", "value": 10.0},
            {"id": "Stock", "type": "storage", "value": 0.0}
        ],
        "edges": [
            {"id": "feed", "origin": "Source", "target": "Stock", "logic": "linear", "params": {"k": k}}
        ],
        "config": {"t_start": 0.0, "t_end": t_end, "dt": dt}
    })
}

/// Two storages exchanging flow in both directions.
pub fn cyclic_pair_model(a: f64, b: f64, k: f64) -> Value {
    json!({
        "nodes": [
            {"id": "A", "type": "storage", "value": a},
            {"id": "B", "type": "storage", "value": b}
        ],
        "edges": [
            {"origin": "A", "target": "B", "logic": "linear", "params": {"k": k}},
            {"origin": "B", "target": "A", "logic": "linear", "params": {"k": k}}
        ],
        "config": {"t_start": 0.0, "t_end": 10.0, "dt": 0.1}
    })
}

/// Three storages where the first edge overflows to infinity on the first step.
pub fn divergent_model() -> Value {
    json!({
        "nodes": [
            {"id": "hot", "type": "storage", "value": 1e10},
            {"id": "cold", "type": "storage", "value": 5.0},
            {"id": "bystander", "type": "storage", "value": 3.0}
        ],
        "edges": [
            {"origin": "hot", "target": "cold", "logic": "linear", "params": {"k": 1e300}}
        ],
        "config": {"t_start": 0.0, "t_end": 10.0, "dt": 1.0}
    })
}

/// Layered supply chain: one global source feeding `tiers` layers of `width`
/// storages, each layer draining linearly into the next and into a recycler.
pub fn supply_chain_model(tiers: usize, width: usize, method: &str) -> Value {
    let mut nodes = vec![json!({"id": "global_source", "type": "source", "value": 10.0})];
    let mut edges = Vec::new();
    for t in 0..tiers {
        for w in 0..width {
            let id = format!("tier{}_{}", t, w);
            nodes.push(json!({"id": id, "type": "storage", "value": if t == 0 { 50.0 } else { 10.0 }}));
            if t == 0 {
                edges.push(json!({
                    "origin": "global_source", "target": id, "logic": "constant", "params": {"k": 2.0}
                }));
            } else {
                let upstream = format!("tier{}_{}", t - 1, w);
                edges.push(json!({
                    "origin": upstream, "target": id, "logic": "limit",
                    "params": {"k": 0.3, "control_node": format!("tier{}_{}", t - 1, (w + 1) % width)}
                }));
            }
        }
    }
    nodes.push(json!({"id": "recycler", "type": "sink", "value": 0.0}));
    for w in 0..width {
        edges.push(json!({
            "origin": format!("tier{}_{}", tiers - 1, w), "target": "recycler",
            "logic": "threshold", "params": {"k": 1.0, "threshold": 5.0}
        }));
    }
    json!({
        "nodes": nodes,
        "edges": edges,
        "config": {"t_start": 0.0, "t_end": 100.0, "dt": 0.1, "method": method}
    })
}
