use crate::{Edge, ParamMap, ParamValue, RuntimeConfig, Vertex, VertexState};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;
use vertexcore::{
    BuildError, BuildEvent, BuildId, ComponentRegistry, EventBus, GraphError, GraphSpec,
    TaskBackend, Value, VertexId,
};

/// Services a graph builds against
#[derive(Clone)]
pub struct GraphContext {
    pub registry: Arc<dyn ComponentRegistry>,
    pub backend: Option<Arc<dyn TaskBackend>>,
    pub events: Arc<EventBus>,
    pub config: Arc<RuntimeConfig>,
}

impl GraphContext {
    pub fn new(registry: Arc<dyn ComponentRegistry>) -> Self {
        let config = RuntimeConfig::default();
        Self {
            registry,
            backend: None,
            events: Arc::new(EventBus::new(config.event_buffer_size)),
            config: Arc::new(config),
        }
    }
}

/// Arena of vertices and the edges wiring them together
///
/// Every build operation takes `&mut self`; a single graph is built by one
/// task at a time.
pub struct Graph {
    pub(crate) name: Option<String>,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) index: HashMap<VertexId, usize>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) registry: Arc<dyn ComponentRegistry>,
    pub(crate) backend: Option<Arc<dyn TaskBackend>>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) config: Arc<RuntimeConfig>,
    pub(crate) build_id: BuildId,
    pub(crate) build_stack: Vec<VertexId>,
    pub(crate) inactivated: BTreeSet<VertexId>,
}

impl Graph {
    /// Load a graph with the default configuration and no task backend
    pub fn from_spec(spec: GraphSpec, registry: Arc<dyn ComponentRegistry>) -> Result<Self, GraphError> {
        Self::with_context(spec, GraphContext::new(registry))
    }

    pub fn with_context(spec: GraphSpec, ctx: GraphContext) -> Result<Self, GraphError> {
        let mut vertices: Vec<Vertex> = Vec::with_capacity(spec.nodes.len());
        let mut index = HashMap::new();

        for vertex_spec in &spec.nodes {
            if index.contains_key(&vertex_spec.id) {
                return Err(GraphError::DuplicateVertex(vertex_spec.id.clone()));
            }
            let vertex = Vertex::from_spec(vertex_spec, &ctx.config.capability_tag, |t| {
                ctx.registry.base_type_for(t)
            })
            .map_err(|source| GraphError::Template {
                vertex_id: vertex_spec.id.clone(),
                source,
            })?;
            index.insert(vertex_spec.id.clone(), vertices.len());
            vertices.push(vertex);
        }

        let mut edges = Vec::with_capacity(spec.edges.len());
        for edge_spec in &spec.edges {
            if !index.contains_key(&edge_spec.source) {
                return Err(GraphError::VertexNotFound(edge_spec.source.clone()));
            }
            let target = index
                .get(&edge_spec.target)
                .map(|&i| &vertices[i])
                .ok_or_else(|| GraphError::VertexNotFound(edge_spec.target.clone()))?;

            let field = target.template().field(&edge_spec.target_param).ok_or_else(|| {
                GraphError::InvalidConnection(format!(
                    "{} has no parameter '{}' (from {})",
                    edge_spec.target, edge_spec.target_param, edge_spec.source
                ))
            })?;

            if field.field_type != "Any"
                && !edge_spec.source_types.is_empty()
                && !edge_spec.source_types.iter().any(|t| field.accepts(t))
            {
                return Err(GraphError::InvalidConnection(format!(
                    "{} -> {}.{}: source types [{}] do not match field type {}",
                    edge_spec.source,
                    edge_spec.target,
                    edge_spec.target_param,
                    edge_spec.source_types.join(", "),
                    field.field_type
                )));
            }

            let is_list = edge_spec.is_list.unwrap_or(field.list);
            let dict_key = match &field.value {
                serde_json::Value::Object(entries) if !is_list && entries.len() == 1 => {
                    entries.keys().next().cloned()
                }
                _ => None,
            };
            edges.push(Edge::from_spec(edge_spec, is_list).with_dict_key(dict_key));
        }

        let mut graph = Self {
            name: spec.name,
            vertices,
            index,
            edges,
            registry: ctx.registry,
            backend: ctx.backend,
            events: ctx.events,
            config: ctx.config,
            build_id: Uuid::new_v4(),
            build_stack: Vec::new(),
            inactivated: BTreeSet::new(),
        };
        for idx in 0..graph.vertices.len() {
            graph.wire_params(idx);
        }

        tracing::debug!(
            vertices = graph.vertices.len(),
            edges = graph.edges.len(),
            "graph loaded"
        );
        Ok(graph)
    }

    /// Attach a task backend for deferred vertices
    pub fn with_backend(mut self, backend: Arc<dyn TaskBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn vertex(&self, id: &str) -> Option<&Vertex> {
        self.index.get(id).map(|&i| &self.vertices[i])
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.vertices.iter().map(|v| v.id.clone()).collect()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Id of the most recent top-level build request
    pub fn build_id(&self) -> BuildId {
        self.build_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.target == id) {
            if !ids.contains(&edge.source()) {
                ids.push(edge.source());
            }
        }
        ids
    }

    pub fn successors(&self, id: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for edge in self.edges.iter().filter(|e| e.source == id) {
            if !ids.contains(&edge.target()) {
                ids.push(edge.target());
            }
        }
        ids
    }

    /// The single vertex nothing else consumes, if there is exactly one
    pub fn root_vertex(&self) -> Option<&Vertex> {
        let mut sinks = self
            .vertices
            .iter()
            .filter(|v| !self.edges.iter().any(|e| e.source == v.id && !e.is_self_loop()));
        match (sinks.next(), sinks.next()) {
            (Some(root), None) => Some(root),
            _ => None,
        }
    }

    /// Dependency graph; node indices match arena positions
    fn dependency_graph(&self) -> DiGraph<usize, ()> {
        let mut graph = DiGraph::new();
        for idx in 0..self.vertices.len() {
            graph.add_node(idx);
        }
        for edge in &self.edges {
            if edge.is_self_loop() {
                continue;
            }
            if let (Some(&from), Some(&to)) = (self.index.get(&edge.source), self.index.get(&edge.target)) {
                graph.update_edge(NodeIndex::new(from), NodeIndex::new(to), ());
            }
        }
        graph
    }

    /// Vertex ids ordered so that every source precedes its targets
    pub fn topological_sort(&self) -> Result<Vec<VertexId>, GraphError> {
        let graph = self.dependency_graph();
        toposort(&graph, None)
            .map(|order| order.into_iter().map(|n| self.vertices[graph[n]].id.clone()).collect())
            .map_err(|cycle| {
                GraphError::CyclicDependency(vec![self.vertices[graph[cycle.node_id()]].id.clone()])
            })
    }

    /// Vertices grouped into layers; a layer only depends on earlier layers
    pub fn layered_sort(&self) -> Result<Vec<Vec<VertexId>>, GraphError> {
        let graph = self.dependency_graph();
        let order = toposort(&graph, None).map_err(|cycle| {
            GraphError::CyclicDependency(vec![self.vertices[graph[cycle.node_id()]].id.clone()])
        })?;

        let mut depth = vec![0usize; self.vertices.len()];
        let mut layers: Vec<Vec<VertexId>> = Vec::new();
        for node in order {
            let layer = graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| depth[e.source().index()] + 1)
                .max()
                .unwrap_or(0);
            depth[node.index()] = layer;
            if layers.len() <= layer {
                layers.resize_with(layer + 1, Vec::new);
            }
            layers[layer].push(self.vertices[graph[node]].id.clone());
        }
        Ok(layers)
    }

    /// Structural checks: no cycles, and no isolated vertex in a multi-vertex graph
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_sort()?;
        if self.vertices.len() > 1 {
            for vertex in &self.vertices {
                let connected = self
                    .edges
                    .iter()
                    .any(|e| !e.is_self_loop() && (e.source == vertex.id || e.target == vertex.id));
                if !connected {
                    return Err(GraphError::Disconnected(vertex.display_name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Inject caller values into a vertex's parameters
    ///
    /// Keys wired to an edge are ignored. Without `overwrite` only keys the
    /// template declares are accepted. The vertex is reset so its next build
    /// picks the values up.
    pub fn update_params(
        &mut self,
        id: &str,
        values: BTreeMap<String, Value>,
        overwrite: bool,
    ) -> Result<(), BuildError> {
        let idx = self.index_of(id)?;
        let vertex = &mut self.vertices[idx];
        for (key, value) in values {
            if vertex.params.get(&key).is_some_and(ParamValue::is_edge_supplied) {
                tracing::debug!(vertex_id = %id, param = %key, "ignoring update for edge-wired parameter");
                continue;
            }
            if !overwrite && vertex.template.field(&key).is_none() {
                tracing::debug!(vertex_id = %id, param = %key, "ignoring update for unknown parameter");
                continue;
            }
            vertex.overrides.insert(key, value);
        }
        self.reset_vertex(idx);
        Ok(())
    }

    /// Switch a vertex between active and inactive
    ///
    /// Inactive vertices with at most one incoming edge are tracked as
    /// inactivated: nothing else merges into them. Reactivating a vertex
    /// discards the empty result it built while inactive.
    pub fn set_state(&mut self, id: &str, state: VertexState) -> Result<(), BuildError> {
        let idx = self.index_of(id)?;
        let previous = self.vertices[idx].activity;
        self.vertices[idx].activity = state;

        match state {
            VertexState::Inactive => {
                if self.incoming_edges(id).count() <= 1 {
                    self.inactivated.insert(id.to_string());
                }
            }
            VertexState::Active => {
                self.inactivated.remove(id);
                if previous == VertexState::Inactive {
                    self.reset_vertex(idx);
                }
            }
        }
        tracing::debug!(vertex_id = %id, ?state, "vertex state changed");
        Ok(())
    }

    /// Inactive vertices that are not merge points
    pub fn inactivated_vertices(&self) -> impl Iterator<Item = &str> {
        self.inactivated.iter().map(String::as_str)
    }

    pub(crate) fn index_of(&self, id: &str) -> Result<usize, BuildError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| BuildError::VertexNotFound(id.to_string()))
    }

    /// Reference parameters implied by the incoming edges of a vertex
    pub(crate) fn wired_params(&self, idx: usize) -> ParamMap {
        let id = &self.vertices[idx].id;
        let mut params = ParamMap::new();
        for edge in self.incoming_edges(id) {
            if edge.is_self_loop() {
                tracing::debug!(vertex_id = %id, param = %edge.target_param, "dropping self-referencing edge");
                continue;
            }
            let source = edge.source.clone();
            if edge.is_list {
                match params.remove(&edge.target_param) {
                    Some(ParamValue::RefList(mut sources)) => {
                        sources.push(source);
                        params.insert(edge.target_param.clone(), ParamValue::RefList(sources));
                    }
                    Some(ParamValue::Ref(first)) => {
                        params.insert(edge.target_param.clone(), ParamValue::RefList(vec![first, source]));
                    }
                    _ => {
                        params.insert(edge.target_param.clone(), ParamValue::RefList(vec![source]));
                    }
                }
            } else {
                params.insert(edge.target_param.clone(), ParamValue::Ref(source));
            }
        }
        params
    }

    pub(crate) fn wire_params(&mut self, idx: usize) {
        self.vertices[idx].params = self.wired_params(idx);
    }

    /// Reset a vertex to Unbuilt and re-wire its edge parameters
    pub(crate) fn reset_vertex(&mut self, idx: usize) {
        self.vertices[idx].reset();
        self.wire_params(idx);
    }
}
