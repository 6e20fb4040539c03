//! Vertex build lifecycle
//!
//! A build walks the dependencies of the requested vertex depth-first,
//! resolving each `Ref` by building its source on demand. Results are
//! memoized on the vertex: a second non-forced build hands back the cached
//! object (or the cached error) without touching the registry again.

use crate::resolver::{self, ResolveContext};
use crate::{BuildState, BuildStep, Graph, ParamValue};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use vertexcore::{
    Artifacts, BuildError, BuildEvent, BuiltObject, Instantiated, Value, VertexId,
    CUSTOM_COMPONENTS_BASE_TYPE,
};

/// Parameter receiving a function from upstream
pub const FUNC_PARAM: &str = "func";
/// Companion parameter holding the async form of `func`
pub const COROUTINE_PARAM: &str = "coroutine";

/// Options for a top-level build
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Discard the cached result (and non-literal upstream results) first
    pub force: bool,
}

impl BuildOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Results a vertex delivers, keyed by target vertex then target parameter
pub type ResultDict = BTreeMap<VertexId, BTreeMap<String, BuiltObject>>;

impl Graph {
    /// Build a vertex and everything it depends on
    ///
    /// With a `requester`, returns what the edge `id -> requester` delivers
    /// (`None` when there is no such edge); otherwise the vertex's own object.
    pub async fn build(
        &mut self,
        id: &str,
        force: bool,
        requester: Option<&str>,
    ) -> Result<Option<BuiltObject>, BuildError> {
        self.build_with(id, BuildOptions { force }, requester).await
    }

    pub async fn build_with(
        &mut self,
        id: &str,
        options: BuildOptions,
        requester: Option<&str>,
    ) -> Result<Option<BuiltObject>, BuildError> {
        self.build_id = Uuid::new_v4();
        let started = Instant::now();
        self.events.emit(BuildEvent::BuildStarted {
            build_id: self.build_id,
            vertex_id: id.to_string(),
            force: options.force,
            timestamp: Utc::now(),
        });
        tracing::info!(build_id = %self.build_id, vertex_id = %id, force = options.force, "starting build");

        let result = match self.build_vertex(id, options.force).await {
            Ok(()) => self.index_of(id).map(|idx| self.requester_result(idx, requester)),
            Err(err) => Err(err),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.events.emit(BuildEvent::BuildCompleted {
            build_id: self.build_id,
            vertex_id: id.to_string(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });
        match &result {
            Ok(_) => tracing::info!(vertex_id = %id, duration_ms, "build completed"),
            Err(err) => tracing::error!(vertex_id = %id, error = %err, "build failed"),
        }
        result
    }

    /// Result of a vertex, building it (or polling its deferred task) first
    pub async fn get_result(
        &mut self,
        id: &str,
        requester: Option<&str>,
    ) -> Result<Option<BuiltObject>, BuildError> {
        let timeout = self.config.deferred_poll_timeout();
        self.get_result_timeout(id, requester, timeout).await
    }

    /// Like [`get_result`](Self::get_result) with an explicit bound on the deferred poll
    pub async fn get_result_timeout(
        &mut self,
        id: &str,
        requester: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<BuiltObject>, BuildError> {
        self.build_id = Uuid::new_v4();
        self.fetch_result(id, requester, timeout).await
    }

    /// Everything a built vertex delivers through its fulfilled outgoing edges
    pub fn get_result_dict(&self, id: &str) -> Result<ResultDict, BuildError> {
        let idx = self.index_of(id)?;
        let vertex = &self.vertices[idx];
        let mut results = ResultDict::new();
        for edge in self.outgoing_edges(id) {
            if let Some(object) = edge.result(vertex) {
                results
                    .entry(edge.target.clone())
                    .or_default()
                    .insert(edge.target_param.clone(), object);
            }
        }
        Ok(results)
    }

    fn fetch_result<'a>(
        &'a mut self,
        id: &'a str,
        requester: Option<&'a str>,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Option<BuiltObject>, BuildError>> {
        async move {
            let idx = self.index_of(id)?;
            if self.vertices[idx].task.is_some() {
                self.poll_deferred(idx, timeout).await?;
            }
            if !self.vertices[idx].is_built() {
                self.build_vertex(id, false).await?;
            }
            Ok(self.requester_result(idx, requester))
        }
        .boxed()
    }

    fn requester_result(&self, idx: usize, requester: Option<&str>) -> Option<BuiltObject> {
        let vertex = &self.vertices[idx];
        match requester {
            None if !vertex.is_active() => None,
            None => vertex.built_object().cloned(),
            Some(target) => self
                .outgoing_edges(&vertex.id)
                .find(|e| e.target == target)
                .and_then(|e| e.result(vertex)),
        }
    }

    fn build_vertex<'a>(&'a mut self, id: &'a str, force: bool) -> BoxFuture<'a, Result<(), BuildError>> {
        async move {
            let idx = self.index_of(id)?;

            if force {
                if self.vertices[idx].frozen && self.vertices[idx].is_built() {
                    tracing::debug!(vertex_id = %id, "vertex is frozen, keeping cached result");
                    return Ok(());
                }
                self.invalidate_upstream(idx);
                self.reset_vertex(idx);
            }

            if !self.vertices[idx].is_active() {
                tracing::debug!(vertex_id = %id, "vertex is inactive, skipping instantiation");
                self.vertices[idx].state = BuildState::Built {
                    object: BuiltObject::Data(Value::Null),
                    artifacts: Artifacts::new(),
                };
                return Ok(());
            }

            if self.vertices[idx].task.is_some() {
                let timeout = self.config.deferred_poll_timeout();
                self.poll_deferred(idx, timeout).await?;
            }

            match &self.vertices[idx].state {
                BuildState::Built { .. } => return Ok(()),
                BuildState::Failed(err) => return Err(err.clone()),
                BuildState::Building(_) => {
                    let start = self.build_stack.iter().position(|v| v == id).unwrap_or(0);
                    let mut path = self.build_stack[start..].to_vec();
                    path.push(id.to_string());
                    return Err(BuildError::Cycle { path });
                }
                BuildState::Unbuilt => {}
            }

            let started = Instant::now();
            self.events.emit(BuildEvent::VertexBuilding {
                build_id: self.build_id,
                vertex_id: id.to_string(),
                vertex_type: self.vertices[idx].vertex_type.clone(),
                timestamp: Utc::now(),
            });

            self.build_stack.push(id.to_string());
            let result = self.run_pipeline(idx).await;
            self.build_stack.pop();

            match result {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    self.vertices[idx].build_times.push(elapsed);
                    self.events.emit(BuildEvent::VertexBuilt {
                        build_id: self.build_id,
                        vertex_id: id.to_string(),
                        duration_ms: elapsed.as_millis() as u64,
                        timestamp: Utc::now(),
                    });
                    tracing::info!(vertex_id = %id, duration_ms = elapsed.as_millis() as u64, "vertex built");
                    Ok(())
                }
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(vertex_id = %id, error = %err, "build interrupted, vertex left unbuilt");
                    self.reset_vertex(idx);
                    Err(err)
                }
                Err(err) => {
                    tracing::error!(vertex_id = %id, error = %err, "vertex build failed");
                    self.vertices[idx].state = BuildState::Failed(err.clone());
                    self.events.emit(BuildEvent::VertexFailed {
                        build_id: self.build_id,
                        vertex_id: id.to_string(),
                        error: err.to_string(),
                        timestamp: Utc::now(),
                    });
                    Err(err)
                }
            }
        }
        .boxed()
    }

    async fn run_pipeline(&mut self, idx: usize) -> Result<(), BuildError> {
        let mut instantiated = None;
        for step in BuildStep::PIPELINE {
            if self.vertices[idx].steps_ran.contains(&step) {
                continue;
            }
            self.vertices[idx].state = BuildState::Building(step);
            tracing::debug!(vertex_id = %self.vertices[idx].id, ?step, "running build step");
            match step {
                BuildStep::ResolveDependencies => self.resolve_dependencies(idx).await?,
                BuildStep::ResolveParameters => self.resolve_parameters(idx)?,
                BuildStep::Instantiate => instantiated = Some(self.instantiate(idx).await?),
            }
            self.vertices[idx].steps_ran.push(step);
        }

        let instantiated = instantiated.unwrap_or_else(|| Instantiated::new(Value::Null));
        self.finalize(idx, instantiated)
    }

    fn resolve_dependencies(&mut self, idx: usize) -> BoxFuture<'_, Result<(), BuildError>> {
        async move {
            let id = self.vertices[idx].id.clone();
            let timeout = self.config.deferred_poll_timeout();
            let references: Vec<(String, ParamValue)> = self.vertices[idx]
                .params
                .iter()
                .filter(|(_, value)| value.is_reference())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            for (key, value) in references {
                match value {
                    ParamValue::Ref(source) if source == id => {
                        tracing::debug!(vertex_id = %id, param = %key, "dropping self reference");
                        self.vertices[idx].params.remove(&key);
                    }
                    ParamValue::Ref(source) => {
                        let object = self.dependency_result(&source, &id, &key, timeout).await?;
                        let object = match self.dict_key(&source, &id, &key) {
                            Some(dict_key) => BuiltObject::Map(BTreeMap::from([(dict_key, object)])),
                            None => object,
                        };
                        self.bind_dependency(idx, key, vec![source], object);
                    }
                    ParamValue::RefList(sources) => {
                        let mut items = Vec::new();
                        let mut resolved = Vec::new();
                        for source in sources {
                            if source == id {
                                continue;
                            }
                            match self.dependency_result(&source, &id, &key, timeout).await? {
                                BuiltObject::List(list) => items.extend(list),
                                BuiltObject::Data(Value::Array(values)) => {
                                    items.extend(values.into_iter().map(BuiltObject::Data))
                                }
                                other => items.push(other),
                            }
                            resolved.push(source);
                        }
                        self.vertices[idx].params.insert(
                            key,
                            ParamValue::Resolved {
                                sources: resolved,
                                object: BuiltObject::List(items),
                            },
                        );
                    }
                    ParamValue::Literal(_) | ParamValue::Resolved { .. } => {}
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn dependency_result(
        &mut self,
        source: &str,
        requester: &str,
        param: &str,
        timeout: Duration,
    ) -> Result<BuiltObject, BuildError> {
        match self.fetch_result(source, Some(requester), timeout).await? {
            Some(object) => Ok(object),
            None if self.vertex(source).is_some_and(|v| !v.is_active()) => {
                tracing::debug!(vertex_id = %requester, %param, %source, "source is inactive, binding no value");
                Ok(BuiltObject::Data(Value::Null))
            }
            None => Err(BuildError::Resolution {
                vertex_id: requester.to_string(),
                param: param.to_string(),
                message: format!("{} delivered no result", source),
            }),
        }
    }

    fn dict_key(&self, source: &str, target: &str, param: &str) -> Option<String> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target && e.target_param == param)
            .and_then(|e| e.dict_key.clone())
    }

    fn bind_dependency(&mut self, idx: usize, key: String, sources: Vec<VertexId>, object: BuiltObject) {
        let params = &mut self.vertices[idx].params;
        if key == FUNC_PARAM {
            if let Some(callable) = object.as_callable() {
                params.insert(
                    COROUTINE_PARAM.to_string(),
                    ParamValue::Resolved {
                        sources: sources.clone(),
                        object: BuiltObject::Callable(callable.to_async()),
                    },
                );
            }
        }
        params.insert(key, ParamValue::Resolved { sources, object });
    }

    fn resolve_parameters(&mut self, idx: usize) -> Result<(), BuildError> {
        let storage_root = self.config.storage_root.clone();
        let vertex = &mut self.vertices[idx];
        let ctx = ResolveContext {
            vertex_id: &vertex.id,
            storage_root: storage_root.as_deref(),
        };
        resolver::resolve_parameters(&vertex.template, &mut vertex.params, &vertex.overrides, &ctx)
    }

    async fn instantiate(&mut self, idx: usize) -> Result<Instantiated, BuildError> {
        let vertex = &self.vertices[idx];
        let base_type = vertex.base_type.clone().ok_or_else(|| BuildError::Configuration {
            vertex_id: vertex.id.clone(),
            message: format!("Base type for vertex {} not found", vertex.display_name),
        })?;
        let params = resolver::to_params(&vertex.id, &vertex.params)?;
        let vertex_id = vertex.id.clone();
        let vertex_type = vertex.vertex_type.clone();

        let registry = Arc::clone(&self.registry);
        registry
            .instantiate(&vertex_type, &base_type, &params)
            .await
            .map_err(|source| BuildError::Instantiation {
                vertex_id,
                vertex_type,
                source,
            })
    }

    /// Validate the instantiated object and store it on the vertex
    pub(crate) fn finalize(&mut self, idx: usize, instantiated: Instantiated) -> Result<(), BuildError> {
        let vertex = &mut self.vertices[idx];
        if instantiated.object.is_absent() {
            let mut message = format!("{} returned no object.", vertex.display_name);
            if vertex.base_type.as_deref() == Some(CUSTOM_COMPONENTS_BASE_TYPE) {
                message.push_str(" Make sure your build method returns a component.");
            }
            return Err(BuildError::Validation {
                vertex_id: vertex.id.clone(),
                message,
            });
        }
        vertex.state = BuildState::Built {
            object: instantiated.object,
            artifacts: instantiated.artifacts,
        };
        Ok(())
    }

    /// Reset the sources of every non-literal resolved parameter
    ///
    /// Bulk-content parameters are dropped instead of re-fetched. Returns the
    /// ids of the vertices that were reset.
    pub(crate) fn invalidate_upstream(&mut self, idx: usize) -> Vec<VertexId> {
        let id = self.vertices[idx].id.clone();
        let mut dropped = Vec::new();
        let mut to_reset: Vec<VertexId> = Vec::new();

        for (key, value) in &self.vertices[idx].params {
            let ParamValue::Resolved { sources, object } = value else {
                continue;
            };
            if object.is_literal() {
                continue;
            }
            if self.config.bulk_content_params.iter().any(|p| p == key) {
                dropped.push(key.clone());
                continue;
            }
            for source in sources {
                if *source != id && !to_reset.contains(source) {
                    to_reset.push(source.clone());
                }
            }
        }

        for key in dropped {
            tracing::debug!(vertex_id = %id, param = %key, "dropping bulk content parameter");
            self.vertices[idx].params.remove(&key);
        }

        let mut reset = Vec::new();
        for source in to_reset {
            let Some(&source_idx) = self.index.get(&source) else {
                continue;
            };
            if self.vertices[source_idx].frozen && self.vertices[source_idx].is_built() {
                continue;
            }
            self.reset_vertex(source_idx);
            self.events.emit(BuildEvent::VertexInvalidated {
                vertex_id: source.clone(),
                invalidated_by: id.clone(),
                timestamp: Utc::now(),
            });
            tracing::debug!(vertex_id = %source, invalidated_by = %id, "upstream vertex reset");
            reset.push(source);
        }
        reset
    }
}
