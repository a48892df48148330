use gssk_core::error::{KernelError, Status};
use gssk_core::fixtures;
use gssk_core::kernel::Kernel;
use gssk_core::model::ModelSpec;
use gssk_core::types::Phase;
use serde_json::{json, Value};
use std::io::Write;

// --- Test Utilities ---

fn build(doc: &Value) -> Result<Kernel, KernelError> {
    Kernel::from_json(&doc.to_string())
}

fn build_ok(doc: &Value) -> Kernel {
    build(doc).expect("model should build")
}

fn mixed_width_model() -> Value {
    json!({
        "nodes": [
            {"id": "src", "type": "source", "value": 4.0},
            {"id": "osc", "type": "oscillator", "value": [1.0, 0.0],
             "params": {"omega": 0.5, "damping": 0.1, "coupling": 0.2}, "connections": ["tank"]},
            {"id": "tank", "type": "storage", "value": 2.0},
            {"id": "drain", "type": "sink", "value": 0.0}
        ],
        "edges": [
            {"origin": "src", "target": "tank", "logic": "linear", "params": {"k": 0.1}},
            {"origin": "tank", "target": "drain", "logic": "limit", "params": {"k": 0.3, "control_node": "src"}},
            {"origin": "tank", "target": "osc", "logic": "threshold", "params": {"k": 0.05, "threshold": 1.0}}
        ],
        "config": {"t_start": 0.0, "t_end": 5.0, "dt": 0.25, "method": "rk4"}
    })
}

// --- State layout ---

#[test]
fn test_state_size_is_sum_of_widths_and_invariant() {
    let mut kernel = build_ok(&mixed_width_model());
    assert_eq!(kernel.state_size(), 5, "1 + 2 + 1 + 1 slots");
    while kernel.phase() == Phase::Ready {
        kernel.step_default().expect("step failed");
        assert_eq!(kernel.state_size(), 5);
        assert_eq!(kernel.state().len(), 5);
    }
}

#[test]
fn test_node_ids_follow_declaration_order() {
    let mut kernel = build_ok(&mixed_width_model());
    let declared = ["src", "osc", "tank", "drain"];
    for (i, id) in declared.iter().enumerate() {
        assert_eq!(kernel.node_id(i).unwrap(), *id);
    }
    kernel.run_to_end().expect("run failed");
    kernel.reset();
    for (i, id) in declared.iter().enumerate() {
        assert_eq!(kernel.node_id(i).unwrap(), *id, "Identifiers must be stable for the kernel lifetime");
        assert_eq!(kernel.find_node(id), Some(i));
    }
}

// --- Determinism ---

#[test]
fn test_identical_documents_give_identical_trajectories() {
    let text = mixed_width_model().to_string();
    let mut a = Kernel::from_json(&text).unwrap();
    let mut b = Kernel::from_json(&text).unwrap();
    for dt in [0.1, 0.25, 0.7, 0.05, 0.0, 1.3] {
        a.step(dt).unwrap();
        b.step(dt).unwrap();
        let bits_a: Vec<u64> = a.state().iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u64> = b.state().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
        assert_eq!(a.t_current().to_bits(), b.t_current().to_bits());
    }
}

// --- Step ordering ---

#[test]
fn test_cyclic_dependency_is_synchronous() {
    let mut kernel = build_ok(&fixtures::cyclic_pair_model(8.0, 0.0, 0.25));
    kernel.step(1.0).unwrap();
    // dA = -0.25*8 + 0.25*0 = -2, dB = +2
    assert_eq!(kernel.state(), &[6.0, 2.0]);
    kernel.step(1.0).unwrap();
    // dA = -0.25*6 + 0.25*2 = -1, dB = +1
    assert_eq!(kernel.state(), &[5.0, 3.0]);
}

// --- Boundary ---

#[test]
fn test_step_past_end_fails_without_mutation() {
    let mut kernel = build_ok(&fixtures::source_storage_model(1.0, 2.0, 1.0));
    kernel.run_to_end().unwrap();
    let state = kernel.state().to_vec();
    let t = kernel.t_current();

    let err = kernel.step(1.0).unwrap_err();
    assert_eq!(err.status(), Status::Finished);
    assert_eq!(kernel.state(), state.as_slice());
    assert_eq!(kernel.t_current(), t);
    assert!(kernel.error_description().unwrap().contains("finished"));
}

// --- No partial mutation ---

#[test]
fn test_divergence_preserves_every_slot() {
    let mut kernel = build_ok(&fixtures::divergent_model());
    let before: Vec<u64> = kernel.state().iter().map(|v| v.to_bits()).collect();
    let err = kernel.step(1.0).unwrap_err();
    assert_eq!(err.status(), Status::Divergence);
    let after: Vec<u64> = kernel.state().iter().map(|v| v.to_bits()).collect();
    assert_eq!(before, after);
    assert_eq!(kernel.phase(), Phase::Ready, "A failed step does not finish the run");
}

// --- Round trip ---

#[test]
fn test_identity_round_trip() {
    let mut kernel = build_ok(&fixtures::identity_model());
    kernel.step(0.5).unwrap();
    assert_eq!(kernel.state(), &[1.0]);
    kernel.step(0.5).unwrap();
    assert_eq!(kernel.t_current(), 1.0);
    assert!(kernel.step(0.5).is_err());
}

// --- Validation ---

#[test]
fn test_dangling_connection_names_missing_identifier() {
    let doc = json!({
        "nodes": [{"id": "a", "type": "storage", "value": 1.0, "connections": ["phantom"]}]
    });
    let err = build(&doc).unwrap_err();
    assert_eq!(err.status(), Status::ValidationFailed);
    assert!(err.to_string().contains("phantom"), "{}", err);
}

#[test]
fn test_dangling_edge_endpoint_is_rejected() {
    let doc = json!({
        "nodes": [{"id": "a", "type": "storage", "value": 1.0}],
        "edges": [{"origin": "a", "target": "nowhere", "logic": "linear", "params": {"k": 1.0}}]
    });
    let err = build(&doc).unwrap_err();
    assert!(matches!(&err, KernelError::UnknownNode { id, .. } if id == "nowhere"));
}

#[test]
fn test_validation_failures() {
    let cases = vec![
        (json!({"nodes": [{"id": "a", "type": "storage", "value": 1.0}, {"id": "a", "type": "sink", "value": 0.0}]}), "Duplicate"),
        (json!({"nodes": [{"id": "a", "type": "storage", "value": 1.0}], "config": {"t_start": 5.0, "t_end": 5.0}}), "t_end"),
        (json!({"nodes": [{"id": "a", "type": "storage", "value": 1.0}], "config": {"dt": 0.0}}), "dt"),
        (json!({"nodes": [{"id": "a", "type": "oscillator", "value": 1.0}]}), "expects 2"),
        (json!({"nodes": [{"id": "a", "type": "storage", "value": [1.0, 2.0]}]}), "expects 1"),
        (json!({"nodes": [{"id": "a", "type": "teleporter", "value": 1.0}]}), "teleporter"),
        (
            json!({
                "nodes": [{"id": "a", "type": "storage", "value": 1.0}, {"id": "b", "type": "storage", "value": 1.0}],
                "edges": [{"id": "e1", "origin": "a", "target": "b", "logic": "interaction", "params": {"k": 1.0}}]
            }),
            "control_node",
        ),
        (
            json!({
                "nodes": [{"id": "a", "type": "storage", "value": 1.0}, {"id": "b", "type": "storage", "value": 1.0}],
                "edges": [{"origin": "a", "target": "b", "logic": "teleport", "params": {"k": 1.0}}]
            }),
            "teleport",
        ),
    ];
    for (doc, needle) in cases {
        let err = build(&doc).expect_err("model should be rejected");
        assert_eq!(err.status(), Status::ValidationFailed, "{}", err);
        assert!(err.to_string().contains(needle), "'{}' should mention '{}'", err, needle);
    }
}

#[test]
fn test_configuration_failures() {
    for text in ["", "{", "[]", r#"{"nodes": 3}"#, r#"{"nodes": [{"id": "a", "type": "storage"}]}"#] {
        let err = Kernel::from_json(text).expect_err("document should be rejected");
        assert_eq!(err.status(), Status::InvalidConfig, "{:?} -> {}", text, err);
    }
}

#[test]
fn test_defaults_apply_when_config_is_missing() {
    let kernel = build_ok(&json!({"nodes": [{"id": "a", "type": "storage", "value": 1.0}]}));
    assert_eq!(kernel.t_start(), 0.0);
    assert_eq!(kernel.t_end(), 100.0);
    assert_eq!(kernel.dt(), 0.1);
    assert_eq!(kernel.steps_to_end(), 1000);
}

#[test]
fn test_unknown_method_falls_back_to_euler() {
    let mut doc = fixtures::source_storage_model(1.0, 1.0, 0.5);
    doc["config"]["method"] = json!("leapfrog");
    assert_eq!(build_ok(&doc).method(), gssk_core::Method::Euler);
}

// --- Flow logic ---

#[test]
fn test_flow_logic_rates() {
    let doc = json!({
        "nodes": [
            {"id": "q", "type": "source", "value": 4.0},
            {"id": "c", "type": "source", "value": 2.0},
            {"id": "const", "type": "storage", "value": 0.0},
            {"id": "lin", "type": "storage", "value": 0.0},
            {"id": "inter", "type": "storage", "value": 0.0},
            {"id": "lim", "type": "storage", "value": 0.0},
            {"id": "thr_on", "type": "storage", "value": 0.0},
            {"id": "thr_off", "type": "storage", "value": 0.0}
        ],
        "edges": [
            {"origin": "q", "target": "const", "logic": "constant", "params": {"k": 1.5}},
            {"origin": "q", "target": "lin", "logic": "linear", "params": {"k": 0.5}},
            {"origin": "q", "target": "inter", "logic": "interaction", "params": {"k": 0.25, "control_node": "c"}},
            {"origin": "q", "target": "lim", "logic": "limit", "params": {"k": 1.0, "control_node": "c"}},
            {"origin": "q", "target": "thr_on", "logic": "threshold", "params": {"k": 3.0, "threshold": 3.0}},
            {"origin": "q", "target": "thr_off", "logic": "threshold", "params": {"k": 3.0, "threshold": 4.0}}
        ],
        "config": {"t_end": 10.0, "dt": 1.0}
    });
    let mut kernel = build_ok(&doc);
    kernel.step(1.0).unwrap();
    let s = kernel.state();
    assert_eq!(&s[..2], &[4.0, 2.0], "Sources hold their value");
    assert_eq!(s[2], 1.5);
    assert_eq!(s[3], 2.0);
    assert_eq!(s[4], 2.0);
    // 1 * 4 / (1 + 4/2)
    assert!((s[5] - 4.0 / 3.0).abs() < 1e-12);
    assert_eq!(s[6], 3.0);
    assert_eq!(s[7], 0.0, "Threshold is strict");
}

#[test]
fn test_limit_with_empty_control_is_zero() {
    let doc = json!({
        "nodes": [
            {"id": "q", "type": "source", "value": 4.0},
            {"id": "c", "type": "storage", "value": 0.0},
            {"id": "t", "type": "storage", "value": 0.0}
        ],
        "edges": [{"origin": "q", "target": "t", "logic": "limit", "params": {"k": 1.0, "control_node": "c"}}],
        "config": {"t_end": 10.0, "dt": 1.0}
    });
    let mut kernel = build_ok(&doc);
    kernel.step(1.0).unwrap();
    assert_eq!(kernel.state()[2], 0.0);
}

// --- Loading ---

#[test]
fn test_model_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, "{}", fixtures::source_storage_model(0.5, 4.0, 1.0)).unwrap();
    let mut kernel = ModelSpec::from_path(file.path()).unwrap().build().unwrap();
    assert_eq!(kernel.run_to_end().unwrap(), 4);
    assert_eq!(kernel.state()[1], 20.0);
}

#[test]
fn test_missing_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = ModelSpec::from_path(dir.path().join("absent.json")).unwrap_err();
    assert_eq!(err.status(), Status::InvalidConfig);
}

// --- Independence ---

#[test]
fn test_error_records_are_per_kernel() {
    let mut failing = build_ok(&fixtures::divergent_model());
    let healthy = build_ok(&fixtures::identity_model());
    let _ = failing.step(1.0);
    assert!(failing.error_description().is_some());
    assert!(healthy.error_description().is_none());
}
