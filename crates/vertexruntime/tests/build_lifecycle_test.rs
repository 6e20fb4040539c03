// crates/vertexruntime/tests/build_lifecycle_test.rs

mod common;

use common::*;
use std::sync::Arc;
use vertexcore::{
    BuildError, BuildEvent, BuiltObject, Callable, ComponentError, GraphSpec, Instantiated, Value,
    VertexSpec, CUSTOM_COMPONENTS_BASE_TYPE,
};
use vertexruntime::{BuildStep, Graph, ParamValue};

fn chain_registry() -> RecordingRegistry {
    RecordingRegistry::new()
        .on("Source", constant("a"))
        .on("Relay", passthrough("input"))
        .on("Sink", passthrough("input"))
}

fn chain_spec() -> GraphSpec {
    let mut spec = GraphSpec::new("chain");
    spec.add_vertex(VertexSpec::new("A", "Source"));
    spec.add_vertex(VertexSpec::new("B", "Relay").with_field("input", input_field("Text", true)));
    spec.add_vertex(VertexSpec::new("C", "Sink").with_field("input", input_field("Text", true)));
    spec.connect("A", "B", "input");
    spec.connect("B", "C", "input");
    spec
}

#[tokio::test]
async fn test_repeated_build_is_memoized() {
    init_tracing();
    let registry = Arc::new(RecordingRegistry::new().on("Const", constant("value")));
    let mut spec = GraphSpec::new("single");
    spec.add_vertex(VertexSpec::new("only", "Const").with_field("label", str_field("x")));
    let mut graph = Graph::from_spec(spec, registry.clone()).unwrap();

    let first = graph.build("only", false, None).await.unwrap();
    let second = graph.build("only", false, None).await.unwrap();

    assert_eq!(first, second, "Cached build should return the same object");
    assert_eq!(registry.count("Const"), 1, "Registry should be called once");

    let vertex = graph.vertex("only").unwrap();
    assert!(vertex.is_built());
    assert_eq!(vertex.steps_ran(), BuildStep::PIPELINE.as_slice());
    assert_eq!(vertex.build_times().len(), 1);
}

#[tokio::test]
async fn test_dependencies_build_before_dependents() {
    let registry = Arc::new(chain_registry());
    let mut graph = Graph::from_spec(chain_spec(), registry.clone()).unwrap();

    let result = graph.build("C", false, None).await.unwrap();

    assert_eq!(result, Some(BuiltObject::from("a")));
    assert_eq!(registry.call_order(), vec!["Source", "Relay", "Sink"]);
    assert!(graph.vertices().all(|v| v.is_built()), "Every vertex should be built");

    match graph.vertex("B").unwrap().param("input") {
        Some(ParamValue::Resolved { sources, object }) => {
            assert_eq!(sources, &vec!["A".to_string()]);
            assert_eq!(object, &BuiltObject::from("a"));
        }
        other => panic!("Expected resolved input, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_parameters_accumulate_in_edge_order() {
    let registry = Arc::new(
        RecordingRegistry::new()
            .on("First", constant("one"))
            .on("Second", constant("two"))
            .on("Join", |params| {
                let items = match params.get("items") {
                    Some(BuiltObject::List(items)) => items.iter().map(text).collect::<Vec<_>>(),
                    other => return Err(ComponentError::Failed(format!("items: {:?}", other))),
                };
                Ok(Instantiated::new(items.join(",")))
            }),
    );
    let mut spec = GraphSpec::new("join");
    spec.add_vertex(VertexSpec::new("s1", "First"));
    spec.add_vertex(VertexSpec::new("s2", "Second"));
    spec.add_vertex(VertexSpec::new("join", "Join").with_field("items", list_field("Text")));
    spec.connect("s2", "join", "items");
    spec.connect("s1", "join", "items");
    let mut graph = Graph::from_spec(spec, registry).unwrap();

    let result = graph.build("join", false, None).await.unwrap().unwrap();

    assert_eq!(text(&result), "two,one", "List edges should accumulate in declaration order");
}

#[tokio::test]
async fn test_list_order_ignores_which_source_built_first() {
    let registry = Arc::new(
        RecordingRegistry::new()
            .on("First", constant("one"))
            .on("Second", constant("two"))
            .on("Join", |params| match params.get("items") {
                Some(BuiltObject::List(items)) => {
                    Ok(Instantiated::new(items.iter().map(text).collect::<Vec<_>>().join(",")))
                }
                other => Err(ComponentError::Failed(format!("items: {:?}", other))),
            }),
    );
    let mut spec = GraphSpec::new("join");
    spec.add_vertex(VertexSpec::new("s1", "First"));
    spec.add_vertex(VertexSpec::new("s2", "Second"));
    spec.add_vertex(VertexSpec::new("join", "Join").with_field("items", list_field("Text")));
    spec.connect("s1", "join", "items");
    spec.connect("s2", "join", "items");
    let mut graph = Graph::from_spec(spec, registry.clone()).unwrap();

    graph.build("s2", false, None).await.unwrap();
    let result = graph.build("join", false, None).await.unwrap().unwrap();

    assert_eq!(registry.call_order(), vec!["Second", "First", "Join"]);
    assert_eq!(text(&result), "one,two", "Edge order wins over build order");
}

#[tokio::test]
async fn test_chat_input_prompt_output_scenario() {
    let registry = Arc::new(
        RecordingRegistry::new()
            .on("ChatInput", passthrough("input_value"))
            .on("Prompt", |params| {
                let template = params.get("template").and_then(|t| t.as_str()).unwrap_or_default();
                let text = params.get("text").map(text).unwrap_or_default();
                Ok(Instantiated::new(template.replace("{text}", &text)))
            })
            .on("ChatOutput", passthrough("input_value")),
    );

    let mut spec = GraphSpec::new("chat");
    spec.add_vertex(
        VertexSpec::new("chat_input", "ChatInput").with_field("input_value", str_field("hi")),
    );
    spec.add_vertex(
        VertexSpec::new("prompt", "Prompt")
            .with_field("template", str_field("Say: {text}"))
            .with_field("text", input_field("Message", true)),
    );
    spec.add_vertex(
        VertexSpec::new("chat_output", "ChatOutput")
            .with_field("input_value", input_field("Message", true)),
    );
    spec.connect("chat_input", "prompt", "text");
    spec.connect("prompt", "chat_output", "input_value");
    let mut graph = Graph::from_spec(spec, registry.clone()).unwrap();

    let result = graph.build("chat_output", false, None).await.unwrap().unwrap();
    assert_eq!(text(&result), "Say: hi");
    assert_eq!(registry.call_order(), vec!["ChatInput", "Prompt", "ChatOutput"]);

    let again = graph.build("chat_output", false, None).await.unwrap().unwrap();
    assert_eq!(text(&again), "Say: hi");
    assert_eq!(registry.calls().len(), 3, "A second build should not instantiate anything");
}

#[tokio::test]
async fn test_cycle_is_reported_with_path() {
    let registry = Arc::new(RecordingRegistry::new().on("Relay", passthrough("input")));
    let mut spec = GraphSpec::new("cycle");
    spec.add_vertex(VertexSpec::new("A", "Relay").with_field("input", input_field("Text", true)));
    spec.add_vertex(VertexSpec::new("B", "Relay").with_field("input", input_field("Text", true)));
    spec.connect("A", "B", "input");
    spec.connect("B", "A", "input");
    let mut graph = Graph::from_spec(spec, registry.clone()).unwrap();

    let err = graph.build("A", false, None).await.unwrap_err();

    match err {
        BuildError::Cycle { path } => assert_eq!(path, vec!["A", "B", "A"]),
        other => panic!("Expected cycle error, got {:?}", other),
    }
    assert!(graph.vertex("A").unwrap().is_failed());
    assert!(graph.vertex("B").unwrap().is_failed());
    assert_eq!(registry.calls().len(), 0, "Nothing in a cycle should be instantiated");
}

#[tokio::test]
async fn test_absent_object_fails_validation() {
    let registry = Arc::new(
        RecordingRegistry::new().on("Empty", |_| Ok(Instantiated::new(Value::Null))),
    );
    let mut spec = GraphSpec::new("empty");
    spec.add_vertex(
        VertexSpec::new("custom", "Empty")
            .with_base_type(CUSTOM_COMPONENTS_BASE_TYPE)
            .with_name("My Component"),
    );
    let mut graph = Graph::from_spec(spec, registry).unwrap();

    let err = graph.build("custom", false, None).await.unwrap_err();

    match &err {
        BuildError::Validation { vertex_id, message } => {
            assert_eq!(vertex_id, "custom");
            assert!(message.contains("My Component"));
            assert!(message.contains("Make sure your build method returns a component"));
        }
        other => panic!("Expected validation error, got {:?}", other),
    }
    let vertex = graph.vertex("custom").unwrap();
    assert!(vertex.is_failed());
    assert!(vertex.built_object().is_none(), "A failed vertex holds no object");
}

#[tokio::test]
async fn test_instantiation_error_is_cached_and_propagates() {
    let registry = Arc::new(
        RecordingRegistry::new()
            .on("Broken", |_| Err(ComponentError::Failed("boom".to_string())))
            .on("Sink", passthrough("input")),
    );
    let mut spec = GraphSpec::new("broken");
    spec.add_vertex(VertexSpec::new("bad", "Broken"));
    spec.add_vertex(VertexSpec::new("sink", "Sink").with_field("input", input_field("Text", true)));
    spec.connect("bad", "sink", "input");
    let mut graph = Graph::from_spec(spec, registry.clone()).unwrap();

    let err = graph.build("sink", false, None).await.unwrap_err();
    match &err {
        BuildError::Instantiation {
            vertex_id,
            vertex_type,
            source,
        } => {
            assert_eq!(vertex_id, "bad");
            assert_eq!(vertex_type, "Broken");
            assert_eq!(source, &ComponentError::Failed("boom".to_string()));
        }
        other => panic!("Expected instantiation error, got {:?}", other),
    }
    assert!(graph.vertex("bad").unwrap().is_failed());
    assert!(graph.vertex("sink").unwrap().is_failed(), "Dependents fail with their source");

    let again = graph.build("bad", false, None).await.unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
    assert_eq!(registry.count("Broken"), 1, "Failed builds are not retried without force");
}

#[tokio::test]
async fn test_missing_base_type_is_a_configuration_error() {
    let registry = Arc::new(RecordingRegistry::new());
    let mut spec = GraphSpec::new("unknown");
    spec.add_vertex(VertexSpec::new("mystery", "Unregistered"));
    let mut graph = Graph::from_spec(spec, registry).unwrap();

    let err = graph.build("mystery", false, None).await.unwrap_err();

    assert!(matches!(err, BuildError::Configuration { .. }), "got {:?}", err);
    assert!(err.to_string().contains("Base type"));
}

#[tokio::test]
async fn test_self_referencing_edge_is_dropped() {
    let registry = Arc::new(RecordingRegistry::new().on("Loop", constant("done")));
    let mut spec = GraphSpec::new("loop");
    spec.add_vertex(VertexSpec::new("L", "Loop").with_field("input", input_field("Text", false)));
    spec.connect("L", "L", "input");
    let mut graph = Graph::from_spec(spec, registry.clone()).unwrap();

    let result = graph.build("L", false, None).await.unwrap().unwrap();

    assert_eq!(text(&result), "done");
    let params = registry.last_params("Loop").unwrap();
    assert!(!params.contains_key("input"), "Self reference should not reach the registry");
}

#[tokio::test]
async fn test_func_parameter_gets_async_companion() {
    let registry = Arc::new(
        RecordingRegistry::new()
            .on("Tool", |_| {
                Ok(Instantiated::new(BuiltObject::Callable(Callable::sync(|input| {
                    Ok(Value::String(format!("called with {}", input)))
                }))))
            })
            .on("Agent", |params| {
                let coroutine = params
                    .get("coroutine")
                    .and_then(BuiltObject::as_callable)
                    .ok_or_else(|| ComponentError::MissingParam("coroutine".to_string()))?;
                assert!(coroutine.is_async());
                Ok(Instantiated::new("agent"))
            }),
    );
    let mut spec = GraphSpec::new("tools");
    spec.add_vertex(VertexSpec::new("tool", "Tool"));
    spec.add_vertex(VertexSpec::new("agent", "Agent").with_field("func", input_field("Callable", true)));
    spec.connect("tool", "agent", "func");
    let mut graph = Graph::from_spec(spec, registry.clone()).unwrap();

    graph.build("agent", false, None).await.unwrap();

    let params = registry.last_params("Agent").unwrap();
    let func = params.get("func").and_then(BuiltObject::as_callable).unwrap();
    assert!(!func.is_async());
    let coroutine = params.get("coroutine").and_then(BuiltObject::as_callable).unwrap();
    let output = coroutine.call(Value::from("x")).await.unwrap();
    assert_eq!(output, Value::String("called with x".to_string()));
}

#[tokio::test]
async fn test_requester_sees_edge_result_only() {
    let registry = Arc::new(chain_registry());
    let mut graph = Graph::from_spec(chain_spec(), registry).unwrap();

    let for_b = graph.build("A", false, Some("B")).await.unwrap();
    let for_c = graph.get_result("A", Some("C")).await.unwrap();

    assert_eq!(for_b, Some(BuiltObject::from("a")));
    assert_eq!(for_c, None, "There is no edge A -> C");
}

#[tokio::test]
async fn test_result_dict_covers_fulfilled_edges() {
    let registry = Arc::new(chain_registry());
    let mut graph = Graph::from_spec(chain_spec(), registry).unwrap();

    assert!(graph.get_result_dict("A").unwrap().is_empty(), "Nothing is fulfilled before a build");

    graph.build("B", false, None).await.unwrap();
    let results = graph.get_result_dict("A").unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results["B"]["input"], BuiltObject::from("a"));
}

#[tokio::test]
async fn test_unknown_vertex_is_reported() {
    let registry = Arc::new(chain_registry());
    let mut graph = Graph::from_spec(chain_spec(), registry).unwrap();

    let err = graph.build("nope", false, None).await.unwrap_err();

    assert!(matches!(err, BuildError::VertexNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn test_build_emits_events() {
    let registry = Arc::new(chain_registry());
    let mut graph = Graph::from_spec(chain_spec(), registry).unwrap();
    let mut events = graph.subscribe_events();

    graph.build("C", false, None).await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(matches!(received.first(), Some(BuildEvent::BuildStarted { vertex_id, .. }) if vertex_id == "C"));
    assert!(matches!(
        received.last(),
        Some(BuildEvent::BuildCompleted { success: true, .. })
    ));
    let built: Vec<&str> = received
        .iter()
        .filter(|e| matches!(e, BuildEvent::VertexBuilt { .. }))
        .map(|e| e.vertex_id())
        .collect();
    assert_eq!(built, vec!["A", "B", "C"]);
    assert!(received.iter().all(|e| match e {
        BuildEvent::VertexBuilt { build_id, .. } => *build_id == graph.build_id(),
        _ => true,
    }));
}
