// crates/vertexruntime/tests/vertex_state_test.rs

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use vertexcore::{BuiltObject, GraphSpec, Instantiated, Value, VertexSpec};
use vertexruntime::{Graph, VertexState};

fn registry() -> Arc<RecordingRegistry> {
    Arc::new(
        RecordingRegistry::new()
            .on("Source", constant("routed"))
            .on("Branch", passthrough("input"))
            .on("Sink", |params| {
                let input = params.get("input").map(text).unwrap_or_default();
                Ok(Instantiated::new(format!("sink({})", input)))
            })
            .on("Tool", live_object("tool"))
            .on("Agent", passthrough("tools")),
    )
}

/// source -> branch -> sink
fn branch_spec() -> GraphSpec {
    let mut spec = GraphSpec::new("branch");
    spec.add_vertex(VertexSpec::new("source", "Source"));
    spec.add_vertex(VertexSpec::new("branch", "Branch").with_field("input", input_field("Text", true)));
    spec.add_vertex(VertexSpec::new("sink", "Sink").with_field("input", input_field("Text", false)));
    spec.connect("source", "branch", "input");
    spec.connect("branch", "sink", "input");
    spec
}

#[tokio::test]
async fn test_inactive_vertex_builds_empty_without_instantiating() {
    let registry = registry();
    let mut graph = Graph::from_spec(branch_spec(), registry.clone()).unwrap();
    graph.set_state("branch", VertexState::Inactive).unwrap();

    let result = graph.build("branch", false, None).await.unwrap();

    assert_eq!(result, None, "An inactive vertex returns no result");
    assert_eq!(registry.count("Branch"), 0);
    assert_eq!(registry.count("Source"), 0, "Dependencies of an inactive vertex are not built");
    let branch = graph.vertex("branch").unwrap();
    assert!(branch.is_built());
    assert!(!branch.is_active());
    assert_eq!(graph.inactivated_vertices().collect::<Vec<_>>(), vec!["branch"]);
}

#[tokio::test]
async fn test_dependent_of_inactive_vertex_receives_no_value() {
    let registry = registry();
    let mut graph = Graph::from_spec(branch_spec(), registry.clone()).unwrap();
    graph.set_state("branch", VertexState::Inactive).unwrap();

    let result = graph.build("sink", false, None).await.unwrap();

    assert_eq!(result, Some(BuiltObject::from("sink(null)")));
    assert_eq!(
        registry.last_params("Sink").unwrap().get("input"),
        Some(&BuiltObject::Data(Value::Null))
    );
    assert!(graph.get_result_dict("branch").unwrap().is_empty(), "Inactive vertices deliver nothing");
}

#[tokio::test]
async fn test_reactivated_vertex_builds_normally() {
    let registry = registry();
    let mut graph = Graph::from_spec(branch_spec(), registry.clone()).unwrap();
    graph.set_state("branch", VertexState::Inactive).unwrap();
    graph.build("branch", false, None).await.unwrap();

    graph.set_state("branch", VertexState::Active).unwrap();
    assert!(!graph.vertex("branch").unwrap().is_built(), "Reactivation drops the empty result");
    assert_eq!(graph.inactivated_vertices().count(), 0);

    let result = graph.build("branch", false, None).await.unwrap();
    assert_eq!(result, Some(BuiltObject::from("routed")));
    assert_eq!(registry.count("Branch"), 1);
}

#[test]
fn test_merge_points_are_not_tracked_as_inactivated() {
    let mut spec = branch_spec();
    spec.add_vertex(VertexSpec::new("other", "Source"));
    spec.add_vertex(VertexSpec::new("merge", "Sink").with_field("input", list_field("Text")));
    spec.connect("source", "merge", "input");
    spec.connect("other", "merge", "input");
    let mut graph = Graph::from_spec(spec, registry()).unwrap();

    graph.set_state("merge", VertexState::Inactive).unwrap();

    assert!(!graph.vertex("merge").unwrap().is_active());
    assert_eq!(graph.inactivated_vertices().count(), 0);
    assert!(graph.set_state("ghost", VertexState::Inactive).is_err());
}

#[tokio::test]
async fn test_inactive_state_survives_checkpoint() {
    let mut graph = Graph::from_spec(branch_spec(), registry()).unwrap();
    graph.set_state("branch", VertexState::Inactive).unwrap();
    graph.build("branch", false, None).await.unwrap();

    let checkpoint = graph.checkpoint().unwrap();
    let mut restored = Graph::from_spec(branch_spec(), registry()).unwrap();
    restored.restore_checkpoint(&checkpoint).unwrap();

    assert!(!restored.vertex("branch").unwrap().is_active());
    assert_eq!(restored.inactivated_vertices().collect::<Vec<_>>(), vec!["branch"]);
    assert_eq!(restored.build("branch", false, None).await.unwrap(), None);
}

fn dict_spec(value: serde_json::Value) -> GraphSpec {
    let mut spec = GraphSpec::new("dict");
    spec.add_vertex(VertexSpec::new("tool", "Tool"));
    spec.add_vertex(
        VertexSpec::new("agent", "Agent")
            .with_field("tools", json!({"type": "dict", "value": value})),
    );
    spec.connect("tool", "agent", "tools");
    spec
}

#[tokio::test]
async fn test_edge_into_single_key_dict_binds_under_that_key() {
    let registry = registry();
    let mut graph = Graph::from_spec(dict_spec(json!({"search": ""})), registry.clone()).unwrap();
    assert_eq!(graph.edges()[0].dict_key(), Some("search"));

    let result = graph.build("agent", false, None).await.unwrap().unwrap();

    let BuiltObject::Map(entries) = result else {
        panic!("Expected a keyed result, got {:?}", result);
    };
    assert_eq!(entries.keys().collect::<Vec<_>>(), vec!["search"]);
    assert!(entries["search"].as_component().is_some(), "The live tool object is bound as-is");
}

#[tokio::test]
async fn test_edge_into_multi_key_dict_binds_directly() {
    let registry = registry();
    let mut graph =
        Graph::from_spec(dict_spec(json!({"a": 1, "b": 2})), registry.clone()).unwrap();
    assert_eq!(graph.edges()[0].dict_key(), None);

    let result = graph.build("agent", false, None).await.unwrap().unwrap();
    assert!(result.as_component().is_some());
}

#[tokio::test]
async fn test_literal_dict_binding_is_checkpointed_as_data() {
    let registry = Arc::new(
        RecordingRegistry::new()
            .on("Tool", constant("docs"))
            .on("Agent", passthrough("tools")),
    );
    let mut graph = Graph::from_spec(dict_spec(json!({"search": ""})), registry).unwrap();
    graph.build("agent", false, None).await.unwrap();

    let snapshot = vertexruntime::checkpoint::capture(&mut graph, "agent").unwrap();

    assert!(snapshot.built);
    assert_eq!(
        snapshot.built_object,
        Some(Value::from(json!({"search": "docs"})))
    );
}
