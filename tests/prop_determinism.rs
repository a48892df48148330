use gssk_core::error::KernelError;
use gssk_core::kernel::Kernel;
use proptest::prelude::*;
use serde_json::{json, Value};

// Helper to build a random network of storages fed by a single source.
fn network(values: &[f64], edges: &[(usize, usize, f64, u8)], method: &str) -> Value {
    let mut nodes = vec![json!({"id": "src", "type": "source", "value": 5.0})];
    for (i, v) in values.iter().enumerate() {
        nodes.push(json!({"id": format!("s{}", i), "type": "storage", "value": v}));
    }
    let n = nodes.len();
    let edges: Vec<Value> = edges
        .iter()
        .map(|&(o, t, k, logic)| {
            let origin = if o % n == 0 { "src".to_string() } else { format!("s{}", o % n - 1) };
            let target = format!("s{}", t % values.len());
            match logic % 4 {
                0 => json!({"origin": origin, "target": target, "logic": "linear", "params": {"k": k}}),
                1 => json!({"origin": origin, "target": target, "logic": "constant", "params": {"k": k}}),
                2 => json!({"origin": origin, "target": target, "logic": "limit", "params": {"k": k, "control_node": "src"}}),
                _ => json!({"origin": origin, "target": target, "logic": "threshold", "params": {"k": k, "threshold": 1.0}}),
            }
        })
        .collect();
    json!({"nodes": nodes, "edges": edges, "config": {"t_end": 5.0, "dt": 0.1, "method": method}})
}

fn bits(kernel: &Kernel) -> Vec<u64> {
    kernel.state().iter().map(|v| v.to_bits()).collect()
}

proptest! {
    /// Identical documents stepped with identical dt sequences stay bit-identical.
    #[test]
    fn prop_identical_inputs_identical_states(
        values in prop::collection::vec(0.0f64..100.0, 1..6),
        edges in prop::collection::vec((any::<usize>(), any::<usize>(), 0.0f64..2.0, any::<u8>()), 0..10),
        dts in prop::collection::vec(0.01f64..0.5, 1..30),
        rk4 in any::<bool>(),
    ) {
        let doc = network(&values, &edges, if rk4 { "rk4" } else { "euler" }).to_string();
        let mut a = Kernel::from_json(&doc).unwrap();
        let mut b = Kernel::from_json(&doc).unwrap();
        for dt in dts {
            let ra = a.step(dt);
            let rb = b.step(dt);
            prop_assert_eq!(ra.is_ok(), rb.is_ok());
            prop_assert_eq!(bits(&a), bits(&b));
            prop_assert_eq!(a.t_current().to_bits(), b.t_current().to_bits());
        }
    }

    /// Quantity nodes never go negative, whatever the edge coefficients.
    #[test]
    fn prop_quantities_stay_non_negative(
        values in prop::collection::vec(0.0f64..10.0, 1..6),
        edges in prop::collection::vec((any::<usize>(), any::<usize>(), 0.0f64..20.0, any::<u8>()), 1..10),
    ) {
        let doc = network(&values, &edges, "euler").to_string();
        let mut kernel = Kernel::from_json(&doc).unwrap();
        for _ in 0..20 {
            if kernel.step(0.5).is_err() {
                break;
            }
            prop_assert!(kernel.state().iter().all(|v| *v >= 0.0));
        }
    }

    /// A failed step never changes the State Vector or the clock.
    #[test]
    fn prop_failed_step_changes_nothing(scale in 290.0f64..308.0, bystander in 0.0f64..100.0) {
        let doc = json!({
            "nodes": [
                {"id": "hot", "type": "storage", "value": 1e10},
                {"id": "cold", "type": "storage", "value": 1.0},
                {"id": "other", "type": "storage", "value": bystander}
            ],
            "edges": [
                {"origin": "hot", "target": "cold", "logic": "interaction",
                 "params": {"k": 10f64.powf(scale), "control_node": "hot"}}
            ],
            "config": {"t_end": 10.0, "dt": 1.0}
        });
        let mut kernel = Kernel::from_json(&doc.to_string()).unwrap();
        let before = bits(&kernel);
        let err = kernel.step(1.0).unwrap_err();
        let is_divergence = matches!(err, KernelError::Divergence { .. });
        prop_assert!(is_divergence);
        prop_assert_eq!(bits(&kernel), before);
        prop_assert_eq!(kernel.t_current(), 0.0);
    }
}
