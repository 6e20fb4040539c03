use crate::GraphError;
use serde::{Deserialize, Serialize};

pub type VertexId = String;

/// Parsed graph description produced by an external loader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub nodes: Vec<VertexSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl GraphSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Accepts both `{nodes, edges}` and the wrapped `{"data": {nodes, edges}}` form
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, GraphError> {
        let payload = match payload {
            serde_json::Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or_default()
            }
            other => other,
        };
        let keys: Vec<String> = payload
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        if !keys.iter().any(|k| k == "nodes") {
            return Err(GraphError::Payload(format!(
                "expected keys 'nodes' and 'edges', found {:?}",
                keys
            )));
        }
        Ok(serde_json::from_value(payload)?)
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Self::from_payload(serde_json::from_str(json)?)
    }

    pub fn add_vertex(&mut self, vertex: VertexSpec) -> VertexId {
        let id = vertex.id.clone();
        self.nodes.push(vertex);
        id
    }

    pub fn connect(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        target_param: impl Into<String>,
    ) {
        self.edges.push(EdgeSpec::new(source, target, target_param));
    }

    pub fn find_vertex(&self, id: &str) -> Option<&VertexSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// One vertex as described by the loader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexSpec {
    pub id: VertexId,

    #[serde(rename = "type")]
    pub vertex_type: String,

    #[serde(default)]
    pub base_type: Option<String>,

    #[serde(default)]
    pub base_classes: Vec<String>,

    #[serde(default = "empty_template")]
    pub template: serde_json::Value,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub frozen: bool,

    /// Build may be delegated to a task backend
    #[serde(default)]
    pub deferred: bool,
}

fn empty_template() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl VertexSpec {
    pub fn new(id: impl Into<String>, vertex_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vertex_type: vertex_type.into(),
            base_type: None,
            base_classes: Vec::new(),
            template: empty_template(),
            display_name: None,
            frozen: false,
            deferred: false,
        }
    }

    pub fn with_base_type(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    pub fn with_base_class(mut self, class: impl Into<String>) -> Self {
        self.base_classes.push(class.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Add a template field given as raw JSON
    pub fn with_field(mut self, name: impl Into<String>, field: serde_json::Value) -> Self {
        if let Some(map) = self.template.as_object_mut() {
            map.insert(name.into(), field);
        }
        self
    }

    pub fn with_type_override(self, type_name: impl Into<String>) -> Self {
        self.with_field(crate::TYPE_OVERRIDE_KEY, serde_json::Value::String(type_name.into()))
    }

    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }
}

/// Directed binding from a source vertex to a named parameter of the target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeSpec {
    pub source: VertexId,
    pub target: VertexId,

    #[serde(alias = "field_name")]
    pub target_param: String,

    /// Defaults to the target field's `list` flag
    #[serde(default)]
    pub is_list: Option<bool>,

    /// Output types declared by the source handle
    #[serde(default)]
    pub source_types: Vec<String>,
}

impl EdgeSpec {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        target_param: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            target_param: target_param.into(),
            is_list: None,
            source_types: Vec::new(),
        }
    }

    pub fn with_source_types(mut self, types: &[&str]) -> Self {
        self.source_types = types.iter().map(|t| t.to_string()).collect();
        self
    }
}
