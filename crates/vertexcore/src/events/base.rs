use crate::{TaskHandle, VertexId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// One top-level build request
pub type BuildId = Uuid;

/// Events emitted while a graph builds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    BuildStarted {
        build_id: BuildId,
        vertex_id: VertexId,
        force: bool,
        timestamp: DateTime<Utc>,
    },
    BuildCompleted {
        build_id: BuildId,
        vertex_id: VertexId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    VertexBuilding {
        build_id: BuildId,
        vertex_id: VertexId,
        vertex_type: String,
        timestamp: DateTime<Utc>,
    },
    VertexBuilt {
        build_id: BuildId,
        vertex_id: VertexId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    VertexFailed {
        build_id: BuildId,
        vertex_id: VertexId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    VertexInvalidated {
        vertex_id: VertexId,
        invalidated_by: VertexId,
        timestamp: DateTime<Utc>,
    },
    DeferredSubmitted {
        vertex_id: VertexId,
        task: TaskHandle,
        timestamp: DateTime<Utc>,
    },
    DeferredPending {
        vertex_id: VertexId,
        task: TaskHandle,
        timestamp: DateTime<Utc>,
    },
}

impl BuildEvent {
    pub fn vertex_id(&self) -> &str {
        match self {
            BuildEvent::BuildStarted { vertex_id, .. }
            | BuildEvent::BuildCompleted { vertex_id, .. }
            | BuildEvent::VertexBuilding { vertex_id, .. }
            | BuildEvent::VertexBuilt { vertex_id, .. }
            | BuildEvent::VertexFailed { vertex_id, .. }
            | BuildEvent::VertexInvalidated { vertex_id, .. }
            | BuildEvent::DeferredSubmitted { vertex_id, .. }
            | BuildEvent::DeferredPending { vertex_id, .. } => vertex_id,
        }
    }
}

/// Broadcast bus for build events
pub struct EventBus {
    sender: broadcast::Sender<BuildEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.sender.subscribe()
    }

    /// Dropped silently when nobody listens
    pub fn emit(&self, event: BuildEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
