use crate::{Artifacts, EdgeSpec, TaskHandle, Value, VertexId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable form of a vertex parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSnapshot {
    Literal { value: Value },
    Ref { source: VertexId },
    RefList { sources: Vec<VertexId> },
    Resolved { sources: Vec<VertexId>, value: Value },
}

/// Captured state of one vertex
///
/// `built` is only set when the built object itself could be captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexSnapshot {
    pub id: VertexId,
    pub vertex_type: String,
    pub declared_type: String,
    pub base_type: Option<String>,
    #[serde(default)]
    pub base_classes: Vec<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub template: serde_json::Value,
    #[serde(default)]
    pub params: BTreeMap<String, ParamSnapshot>,
    #[serde(default)]
    pub overrides: BTreeMap<String, Value>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub built: bool,
    #[serde(default)]
    pub built_object: Option<Value>,
    #[serde(default)]
    pub artifacts: Artifacts,
    #[serde(default)]
    pub task: Option<TaskHandle>,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub deferred: bool,
    #[serde(default)]
    pub inactive: bool,
}

impl VertexSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Snapshot of every vertex of a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphCheckpoint {
    #[serde(default)]
    pub name: Option<String>,
    pub vertices: Vec<VertexSnapshot>,
}
