// crates/vertexruntime/tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vertexcore::{
    BuiltObject, Component, ComponentError, ComponentRegistry, Instantiated, Params, Value,
};

type Handler = Arc<dyn Fn(&Params) -> Result<Instantiated, ComponentError> + Send + Sync>;

/// One registry call, as seen by the registry
#[derive(Debug, Clone)]
pub struct Call {
    pub vertex_type: String,
    pub base_type: String,
    pub params: Params,
}

/// Registry that records every instantiation and answers through closures
#[derive(Default)]
pub struct RecordingRegistry {
    handlers: HashMap<String, Handler>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, vertex_type: &str, handler: F) -> Self
    where
        F: Fn(&Params) -> Result<Instantiated, ComponentError> + Send + Sync + 'static,
    {
        self.handlers.insert(vertex_type.to_string(), Arc::new(handler));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_order(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.vertex_type).collect()
    }

    pub fn count(&self, vertex_type: &str) -> usize {
        self.calls().iter().filter(|c| c.vertex_type == vertex_type).count()
    }

    pub fn last_params(&self, vertex_type: &str) -> Option<Params> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| c.vertex_type == vertex_type)
            .map(|c| c.params)
    }
}

#[async_trait]
impl ComponentRegistry for RecordingRegistry {
    async fn instantiate(
        &self,
        vertex_type: &str,
        base_type: &str,
        params: &Params,
    ) -> Result<Instantiated, ComponentError> {
        self.calls.lock().unwrap().push(Call {
            vertex_type: vertex_type.to_string(),
            base_type: base_type.to_string(),
            params: params.clone(),
        });
        let handler = self
            .handlers
            .get(vertex_type)
            .ok_or_else(|| ComponentError::UnknownType(vertex_type.to_string()))?;
        handler(params)
    }

    fn base_type_for(&self, vertex_type: &str) -> Option<String> {
        self.handlers.get(vertex_type).map(|_| "components".to_string())
    }
}

/// A live object that cannot be checkpointed
#[derive(Debug)]
pub struct Handle(pub String);

impl Component for Handle {
    fn component_type(&self) -> &str {
        "handle"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Returns the named parameter as the built object
pub fn passthrough(param: &'static str) -> impl Fn(&Params) -> Result<Instantiated, ComponentError> {
    move |params| {
        params
            .get(param)
            .cloned()
            .map(Instantiated::from)
            .ok_or_else(|| ComponentError::MissingParam(param.to_string()))
    }
}

/// Always builds the same plain value
pub fn constant(value: &'static str) -> impl Fn(&Params) -> Result<Instantiated, ComponentError> {
    move |_| Ok(Instantiated::new(value))
}

/// Builds a non-serializable object
pub fn live_object(name: &'static str) -> impl Fn(&Params) -> Result<Instantiated, ComponentError> {
    move |_| Ok(Instantiated::new(BuiltObject::object(Handle(name.to_string()))))
}

pub fn str_field(value: &str) -> serde_json::Value {
    json!({ "type": "str", "required": false, "value": value })
}

pub fn input_field(field_type: &str, required: bool) -> serde_json::Value {
    json!({ "type": field_type, "required": required })
}

pub fn list_field(field_type: &str) -> serde_json::Value {
    json!({ "type": field_type, "required": false, "list": true })
}

pub fn text(object: &BuiltObject) -> String {
    match object {
        BuiltObject::Data(Value::String(s)) => s.clone(),
        other => other.to_string(),
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
