use crate::Vertex;
use vertexcore::{BuiltObject, EdgeSpec, VertexId};

/// A wired connection from a source vertex into one parameter of its target
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub(crate) source: VertexId,
    pub(crate) target: VertexId,
    pub(crate) target_param: String,
    pub(crate) is_list: bool,
    pub(crate) source_types: Vec<String>,
    /// Key the source result is bound under when the target field holds a one-entry dict
    pub(crate) dict_key: Option<String>,
}

impl Edge {
    pub(crate) fn from_spec(spec: &EdgeSpec, is_list: bool) -> Self {
        Self {
            source: spec.source.clone(),
            target: spec.target.clone(),
            target_param: spec.target_param.clone(),
            is_list,
            source_types: spec.source_types.clone(),
            dict_key: None,
        }
    }

    /// Bind the delivered result under `key` of the target's dict field
    pub(crate) fn with_dict_key(mut self, key: Option<String>) -> Self {
        self.dict_key = key;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn target_param(&self) -> &str {
        &self.target_param
    }

    pub fn is_list(&self) -> bool {
        self.is_list
    }

    pub fn source_types(&self) -> &[String] {
        &self.source_types
    }

    pub fn dict_key(&self) -> Option<&str> {
        self.dict_key.as_deref()
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// Whether `source` is this edge's source and has finished building
    pub fn is_fulfilled(&self, source: &Vertex) -> bool {
        source.id() == self.source && source.is_built()
    }

    /// What this edge delivers once its source is built; inactive sources deliver nothing
    pub fn result(&self, source: &Vertex) -> Option<BuiltObject> {
        if !self.is_fulfilled(source) || !source.is_active() {
            return None;
        }
        source.built_object().cloned()
    }

    pub fn to_spec(&self) -> EdgeSpec {
        EdgeSpec {
            source: self.source.clone(),
            target: self.target.clone(),
            target_param: self.target_param.clone(),
            is_list: Some(self.is_list),
            source_types: self.source_types.clone(),
        }
    }
}
