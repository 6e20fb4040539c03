use crate::{Artifacts, DeferredError, Value, VertexSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a build delegated to a task backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload of a finished out-of-process build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub object: Value,
    #[serde(default)]
    pub artifacts: Artifacts,
}

impl TaskOutput {
    pub fn new(object: impl Into<Value>) -> Self {
        Self {
            object: object.into(),
            artifacts: Artifacts::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskPoll {
    Ready(TaskOutput),
    Pending,
    Failed(String),
}

/// Distributed task system a vertex may delegate its build to
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Hand a vertex snapshot to a worker
    async fn submit(&self, snapshot: VertexSnapshot) -> Result<TaskHandle, DeferredError>;

    /// Wait at most `timeout` for the task to settle
    async fn poll(&self, handle: &TaskHandle, timeout: Duration) -> Result<TaskPoll, DeferredError>;
}
