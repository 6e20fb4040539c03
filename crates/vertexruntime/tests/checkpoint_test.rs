// crates/vertexruntime/tests/checkpoint_test.rs

mod common;

use common::*;
use std::sync::Arc;
use vertexcore::{BuiltObject, GraphCheckpoint, GraphSpec, ParamSnapshot, Value, VertexSnapshot, VertexSpec};
use vertexruntime::checkpoint::{capture, restore};
use vertexruntime::{Graph, ParamValue};

fn registry() -> Arc<RecordingRegistry> {
    Arc::new(
        RecordingRegistry::new()
            .on("Plain", constant("plain"))
            .on("Live", live_object("connection"))
            .on("Wrap", passthrough("input"))
            .on("Sink", passthrough("input")),
    )
}

fn spec(source_type: &str, middle_type: &str) -> GraphSpec {
    let mut spec = GraphSpec::new("checkpoint");
    spec.add_vertex(VertexSpec::new("source", source_type).with_field("label", str_field("src")));
    spec.add_vertex(VertexSpec::new("middle", middle_type).with_field("input", input_field("Data", true)));
    spec.connect("source", "middle", "input");
    spec
}

#[tokio::test]
async fn test_capture_built_plain_vertex() {
    let mut graph = Graph::from_spec(spec("Plain", "Wrap"), registry()).unwrap();
    graph.build("middle", false, None).await.unwrap();

    let snapshot = capture(&mut graph, "middle").unwrap();

    assert!(snapshot.built);
    assert_eq!(snapshot.built_object, Some(Value::from("plain")));
    assert_eq!(
        snapshot.params.get("input"),
        Some(&ParamSnapshot::Resolved {
            sources: vec!["source".to_string()],
            value: Value::from("plain"),
        })
    );
    assert_eq!(snapshot.edges.len(), 1);

    let json = snapshot.to_json().unwrap();
    let decoded = VertexSnapshot::from_json(&json).unwrap();
    assert_eq!(decoded, snapshot, "Snapshots survive a JSON round trip");
}

#[tokio::test]
async fn test_capture_live_object_resets_upstream() {
    let registry = registry();
    let mut graph = Graph::from_spec(spec("Live", "Wrap"), registry.clone()).unwrap();
    graph.build("middle", false, None).await.unwrap();
    assert!(graph.vertex("source").unwrap().is_built());

    let snapshot = capture(&mut graph, "middle").unwrap();

    assert!(!snapshot.built, "A live object cannot be captured as built");
    assert!(snapshot.built_object.is_none());
    assert_eq!(
        snapshot.params.get("input"),
        Some(&ParamSnapshot::Ref {
            source: "source".to_string()
        }),
        "Non-literal params are captured as references"
    );
    assert!(
        !graph.vertex("source").unwrap().is_built(),
        "The upstream of a non-serializable vertex is reset"
    );

    restore(&mut graph, &snapshot).unwrap();
    let rebuilt = graph.build("middle", false, None).await.unwrap().unwrap();
    assert!(matches!(rebuilt, BuiltObject::Object(_)));
    assert_eq!(registry.count("Live"), 2);
}

#[tokio::test]
async fn test_restore_built_vertex_skips_registry() {
    let mut graph = Graph::from_spec(spec("Plain", "Wrap"), registry()).unwrap();
    graph.build("middle", false, None).await.unwrap();
    let snapshot = capture(&mut graph, "middle").unwrap();

    let fresh_registry = registry();
    let mut fresh = Graph::from_spec(spec("Plain", "Wrap"), fresh_registry.clone()).unwrap();
    restore(&mut fresh, &snapshot).unwrap();

    let result = fresh.build("middle", false, None).await.unwrap();
    assert_eq!(result, Some(BuiltObject::from("plain")));
    assert!(fresh_registry.calls().is_empty(), "A restored built vertex is not rebuilt");
}

#[tokio::test]
async fn test_unbuilt_restore_rewires_missing_edges() {
    let registry = registry();
    let mut graph = Graph::from_spec(spec("Plain", "Sink"), registry.clone()).unwrap();

    let mut snapshot = capture(&mut graph, "middle").unwrap();
    assert!(!snapshot.built);
    snapshot.params.clear();

    restore(&mut graph, &snapshot).unwrap();
    assert_eq!(
        graph.vertex("middle").unwrap().param("input"),
        Some(&ParamValue::Ref("source".to_string()))
    );

    let result = graph.build("middle", false, None).await.unwrap();
    assert_eq!(result, Some(BuiltObject::from("plain")));
}

#[tokio::test]
async fn test_graph_checkpoint_round_trip() {
    let mut graph = Graph::from_spec(spec("Plain", "Wrap"), registry()).unwrap();
    graph.build("middle", false, None).await.unwrap();

    let checkpoint = graph.checkpoint().unwrap();
    let json = serde_json::to_string(&checkpoint).unwrap();
    let decoded: GraphCheckpoint = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.vertices.len(), 2);
    assert_eq!(decoded.name.as_deref(), Some("checkpoint"));

    let fresh_registry = registry();
    let mut fresh = Graph::from_spec(spec("Plain", "Wrap"), fresh_registry.clone()).unwrap();
    fresh.restore_checkpoint(&decoded).unwrap();

    assert!(fresh.vertices().all(|v| v.is_built()));
    let result = fresh.build("middle", false, None).await.unwrap();
    assert_eq!(result, Some(BuiltObject::from("plain")));
    assert!(fresh_registry.calls().is_empty());
}
