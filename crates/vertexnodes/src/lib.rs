//! Standard component library
//!
//! Built-in components for chat flows and simple text processing

mod io;
mod prompt;
mod transform;

pub use io::{ChatInputFactory, ChatOutputFactory, CHAT_INPUT, CHAT_OUTPUT};
pub use prompt::{PromptFactory, PROMPT};
pub use transform::{JoinTextFactory, JsonParseFactory, JOIN_TEXT, JSON_PARSE};

use serde_json::json;
use std::sync::Arc;
use vertexcore::{BuiltObject, ComponentError, EdgeSpec, GraphSpec, Params, VertexSpec};
use vertexruntime::FactoryRegistry;

/// Register all standard components with a registry
pub fn register_all(registry: &mut FactoryRegistry) {
    registry.register(Arc::new(ChatInputFactory));
    registry.register(Arc::new(ChatOutputFactory));
    registry.register(Arc::new(PromptFactory));
    registry.register(Arc::new(JsonParseFactory));
    registry.register(Arc::new(JoinTextFactory));
}

/// A three-vertex chat flow: input feeds a prompt whose text is shown as output
pub fn example_graph() -> GraphSpec {
    let mut spec = GraphSpec::new("example");
    spec.add_vertex(
        VertexSpec::new("ChatInput-a1b2c", CHAT_INPUT)
            .with_field("input_value", json!({"type": "str", "value": "Hello"}))
            .with_field("sender_name", json!({"type": "str", "value": "User"})),
    );
    spec.add_vertex(
        VertexSpec::new("Prompt-d3e4f", PROMPT)
            .with_field(
                "template",
                json!({"type": "prompt", "required": true, "value": "Answer politely: {question}"}),
            )
            .with_field(
                "question",
                json!({"type": "str", "input_types": ["Message", "Text"], "value": ""}),
            ),
    );
    spec.add_vertex(
        VertexSpec::new("ChatOutput-g5h6i", CHAT_OUTPUT).with_field(
            "input_value",
            json!({"type": "str", "required": true, "input_types": ["Message", "Text"]}),
        ),
    );
    spec.edges.push(
        EdgeSpec::new("ChatInput-a1b2c", "Prompt-d3e4f", "question").with_source_types(&["Message"]),
    );
    spec.edges.push(
        EdgeSpec::new("Prompt-d3e4f", "ChatOutput-g5h6i", "input_value").with_source_types(&["Text"]),
    );
    spec
}

/// Text form of a built object: strings as-is, anything else displayed
pub fn object_text(object: &BuiltObject) -> String {
    match object.as_str() {
        Some(text) => text.to_string(),
        None => object.to_string(),
    }
}

pub(crate) fn optional_text(params: &Params, name: &str) -> Option<String> {
    params
        .get(name)
        .filter(|object| !object.is_absent())
        .map(object_text)
}

pub(crate) fn require_text(params: &Params, name: &str) -> Result<String, ComponentError> {
    optional_text(params, name).ok_or_else(|| ComponentError::MissingParam(name.to_string()))
}
