use crate::{Graph, GraphContext};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use vertexcore::{BuildEvent, ComponentRegistry, EventBus, GraphError, GraphSpec, TaskBackend};

/// Main entry point: loads graphs wired to a registry, a backend and an event bus
pub struct BuildRuntime {
    registry: Arc<dyn ComponentRegistry>,
    backend: Option<Arc<dyn TaskBackend>>,
    event_bus: Arc<EventBus>,
    config: Arc<RuntimeConfig>,
}

impl BuildRuntime {
    /// Create a new runtime with default settings
    pub fn new(registry: Arc<dyn ComponentRegistry>) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(registry: Arc<dyn ComponentRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            backend: None,
            event_bus,
            config: Arc::new(config),
        }
    }

    /// Delegate deferred vertices to `backend`
    pub fn with_backend(mut self, backend: Arc<dyn TaskBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn registry(&self) -> &Arc<dyn ComponentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Load a graph; every graph of this runtime shares its event bus
    pub fn load(&self, spec: GraphSpec) -> Result<Graph, GraphError> {
        Graph::with_context(
            spec,
            GraphContext {
                registry: Arc::clone(&self.registry),
                backend: self.backend.clone(),
                events: Arc::clone(&self.event_bus),
                config: Arc::clone(&self.config),
            },
        )
    }

    /// Load a graph from JSON, bare or wrapped in a `data` payload
    pub fn load_json(&self, json: &str) -> Result<Graph, GraphError> {
        self.load(GraphSpec::from_json(json)?)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> vertexcore::Result<Graph> {
        let json = std::fs::read_to_string(path)?;
        Ok(self.load_json(&json)?)
    }

    /// Subscribe to build events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<BuildEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Default bound on a deferred-result poll
    pub deferred_poll_timeout_ms: u64,
    /// Directory `flow_id/file_name` file fields are resolved under
    pub storage_root: Option<PathBuf>,
    /// Parameters dropped rather than re-fetched when a vertex is reset
    pub bulk_content_params: Vec<String>,
    /// Base class that lets a template's `_type` override the vertex type
    pub capability_tag: String,
    pub event_buffer_size: usize,
}

impl RuntimeConfig {
    pub fn deferred_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.deferred_poll_timeout_ms)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: impl AsRef<Path>) -> vertexcore::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            deferred_poll_timeout_ms: 5_000,
            storage_root: None,
            bulk_content_params: vec!["documents".to_string(), "texts".to_string()],
            capability_tag: "Tool".to_string(),
            event_buffer_size: 1000,
        }
    }
}
