use gssk_core::kernel::Kernel;
use gssk_core::types::Phase;
use proptest::prelude::*;
use serde_json::{json, Value};

// Helper to render a node declaration of the given kind.
fn node_decl(i: usize, kind: u8, value: f64) -> (Value, usize) {
    let id = format!("n{}", i);
    match kind % 4 {
        0 => (json!({"id": id, "type": "storage", "value": value}), 1),
        1 => (json!({"id": id, "type": "source", "value": value}), 1),
        2 => (json!({"id": id, "type": "sink", "value": value}), 1),
        _ => (
            json!({"id": id, "type": "oscillator", "value": [value, 0.0], "params": {"omega": 0.5, "damping": 0.2}}),
            2,
        ),
    }
}

proptest! {
    /// State size equals the summed widths and never changes while stepping.
    #[test]
    fn prop_state_size_is_sum_of_widths(
        kinds in prop::collection::vec((any::<u8>(), 0.0f64..50.0), 1..8),
        steps in 1usize..20,
    ) {
        let mut nodes = Vec::new();
        let mut expected = 0;
        for (i, (kind, value)) in kinds.iter().enumerate() {
            let (decl, width) = node_decl(i, *kind, *value);
            nodes.push(decl);
            expected += width;
        }
        let doc = json!({"nodes": nodes, "config": {"t_end": 10.0, "dt": 0.5}});
        let mut kernel = Kernel::from_json(&doc.to_string()).unwrap();
        prop_assert_eq!(kernel.state_size(), expected);

        for _ in 0..steps {
            if kernel.phase() == Phase::Finished {
                break;
            }
            kernel.step_default().unwrap();
            prop_assert_eq!(kernel.state().len(), expected);
        }
    }

    /// Every index maps back to the identifier declared at that position.
    #[test]
    fn prop_node_ids_are_stable(ids in prop::collection::hash_set("[a-z]{1,6}", 1..10)) {
        let ids: Vec<String> = ids.into_iter().collect();
        let nodes: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "type": "storage", "value": 1.0}))
            .collect();
        let doc = json!({"nodes": nodes, "config": {"t_end": 1.0, "dt": 0.25}});
        let mut kernel = Kernel::from_json(&doc.to_string()).unwrap();

        kernel.run_to_end().unwrap();
        prop_assert_eq!(kernel.node_count(), ids.len());
        for (i, id) in ids.iter().enumerate() {
            prop_assert_eq!(kernel.node_id(i).unwrap(), id.as_str());
            prop_assert_eq!(kernel.find_node(id), Some(i));
        }
        prop_assert!(kernel.node_id(ids.len()).is_err());
    }
}
