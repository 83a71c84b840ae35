//! Tests for the execution graph

use super::*;
use crate::spec::builder::build;
use serde_json::{json, Value};

fn transform(id: &str) -> Value {
    json!({
        "id": id,
        "impl": format!("apps.demo.transforms.ops:{id}"),
        "parameters": [{"name": "data", "native": "builtins:dict"}],
        "return_native": "builtins:dict"
    })
}

fn make_ir(stages: Value, dag: Value) -> SpecIr {
    build(
        json!({
            "meta": {"name": "demo"},
            "transforms": [transform("a"), transform("b"), transform("c"), transform("d")],
            "dag_stages": stages,
            "dag": dag,
        }),
        None,
    )
    .unwrap()
}

fn stage(id: &str, mode: &str, candidates: &[&str]) -> Value {
    json!({
        "stage_id": id,
        "selection_mode": mode,
        "candidates": candidates,
        "default_transform_id": candidates.first(),
    })
}

#[test]
fn test_stage_candidates_connect() {
    let ir = make_ir(
        json!([stage("s1", "single", &["a"]), stage("s2", "multi", &["b", "c"]), stage("s3", "single", &["d"])]),
        json!([]),
    );
    let graph = ExecutionGraph::derive(&ir);

    assert_eq!(graph.entries(), ["a".to_string()]);
    assert_eq!(graph.successors("a"), ["b".to_string(), "c".to_string()]);
    assert_eq!(graph.successors("c"), ["d".to_string()]);
    assert_eq!(graph.terminals(), ["d".to_string()]);
    assert!(graph.ensure_acyclic().is_ok());
    assert_eq!(graph.topological_order().unwrap(), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_null_endpoints_in_edge_list() {
    let ir = make_ir(json!([stage("s1", "single", &["a"]), stage("s2", "single", &["b"])]), json!([]));
    let graph = ExecutionGraph::derive(&ir);
    let edges = graph.edges();
    assert_eq!(edges.first(), Some(&(None, Some("a"))));
    assert!(edges.contains(&(Some("a"), Some("b"))));
    assert_eq!(edges.last(), Some(&(Some("b"), None)));
}

#[test]
fn test_detect_cycle_from_reused_transform() {
    let ir = make_ir(
        json!([stage("s1", "single", &["a"]), stage("s2", "single", &["b"]), stage("s3", "single", &["a"])]),
        json!([]),
    );
    let graph = ExecutionGraph::derive(&ir);
    let err = graph.ensure_acyclic().unwrap_err();
    assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
    assert!(graph.topological_order().is_err());
}

#[test]
fn test_legacy_edges_cycle() {
    let ir = make_ir(
        json!([]),
        json!([
            {"from": "a", "to": "b"},
            {"from": "b", "to": "c"},
            {"from": "c", "to": "a"}
        ]),
    );
    let graph = ExecutionGraph::derive(&ir);
    let err = graph.ensure_acyclic().unwrap_err();
    assert!(err.to_string().contains("Circular dependency detected"));
}

#[test]
fn test_legacy_edges_branch_without_chaining_stages() {
    let ir = make_ir(
        json!([]),
        json!([
            {"from": "a", "to": "b"},
            {"from": "a", "to": "c"},
            {"from": "b", "to": null},
            {"from": "c", "to": null}
        ]),
    );
    let graph = ExecutionGraph::derive(&ir);
    assert!(graph.successors("b").is_empty());
    assert!(graph.terminals().contains(&"c".to_string()));
    assert!(graph.ensure_acyclic().is_ok());
}

#[test]
fn test_order_stages_by_candidate_position() {
    let mut ir = make_ir(
        json!([]),
        json!([
            {"from": "c", "to": "d"},
            {"from": "a", "to": "c"},
            {"from": "d", "to": null}
        ]),
    );
    let declared: Vec<String> = ir.dag_stages.iter().map(|s| s.stage_id.clone()).collect();
    assert_eq!(declared, vec!["stage_1_a", "stage_2_c", "stage_3_d"]);

    ir.dag_stages.rotate_left(1);
    let graph = ExecutionGraph::derive(&ir);
    let ordered: Vec<&str> = graph
        .order_stages(&ir.dag_stages)
        .unwrap()
        .iter()
        .map(|s| s.stage_id.as_str())
        .collect();
    assert_eq!(ordered, vec!["stage_1_a", "stage_2_c", "stage_3_d"]);
}

#[test]
fn test_from_edges_matches_derived_order() {
    let ir = make_ir(
        json!([]),
        json!([{"from": "b", "to": "c"}, {"from": "a", "to": "b"}, {"from": "c", "to": null}]),
    );
    let graph = ExecutionGraph::from_edges(&ir.dag_edges);
    assert_eq!(graph.nodes(), ["b".to_string(), "c".to_string(), "a".to_string()]);
    assert_eq!(graph.topological_order().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(graph.terminals(), ["c".to_string()]);
}
