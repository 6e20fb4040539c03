use crate::deferred::TaskHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Structural problems found while loading or validating a graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate vertex id: {0}")]
    DuplicateVertex(String),

    #[error("Vertex not found: {0}")]
    VertexNotFound(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Invalid template for vertex {vertex_id}: {source}")]
    Template {
        vertex_id: String,
        #[source]
        source: TemplateError,
    },

    #[error("Cyclic dependency detected involving: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("{0} is not connected to any other components")]
    Disconnected(String),

    #[error("Invalid graph payload: {0}")]
    Payload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("template must be a JSON object")]
    NotAnObject,

    #[error("field '{0}' is a dict without a \"type\" entry")]
    MissingFieldType(String),

    #[error("field '{field}' is malformed: {message}")]
    InvalidField { field: String, message: String },
}

/// Errors raised by a component registry or a component factory
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    #[error("Unknown component type: {0}")]
    UnknownType(String),

    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid parameter type for '{param}': expected {expected}, got {actual}")]
    InvalidParam {
        param: String,
        expected: String,
        actual: String,
    },

    #[error("Component failed: {0}")]
    Failed(String),
}

/// Errors from a [`TaskBackend`](crate::deferred::TaskBackend)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeferredError {
    #[error("task backend unavailable: {0}")]
    Unavailable(String),

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("task backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid literal at offset {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Errors produced while building a vertex
///
/// Cloneable because a failed vertex keeps its error and hands it back on
/// every later non-forced build.
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    #[error("Configuration error in {vertex_id}: {message}")]
    Configuration { vertex_id: String, message: String },

    #[error("Unresolved parameter '{param}' on {vertex_id}: {message}")]
    Resolution {
        vertex_id: String,
        param: String,
        message: String,
    },

    #[error("Error building component {vertex_type} ({vertex_id}): {source}")]
    Instantiation {
        vertex_id: String,
        vertex_type: String,
        #[source]
        source: ComponentError,
    },

    #[error("Validation failed for {vertex_id}: {message}")]
    Validation { vertex_id: String, message: String },

    #[error("Task {task} for {vertex_id} not ready after {}ms", .timeout.as_millis())]
    Timeout {
        vertex_id: String,
        task: TaskHandle,
        timeout: Duration,
    },

    #[error("Cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Vertex not found: {0}")]
    VertexNotFound(String),
}

impl BuildError {
    /// Recoverable errors leave the vertex untouched so the same call can be retried
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BuildError::Timeout { .. })
    }

    pub fn vertex_id(&self) -> Option<&str> {
        match self {
            BuildError::Configuration { vertex_id, .. }
            | BuildError::Resolution { vertex_id, .. }
            | BuildError::Instantiation { vertex_id, .. }
            | BuildError::Validation { vertex_id, .. }
            | BuildError::Timeout { vertex_id, .. } => Some(vertex_id),
            BuildError::Cycle { path } => path.first().map(String::as_str),
            BuildError::VertexNotFound(id) => Some(id),
        }
    }
}
