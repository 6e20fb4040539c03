//! Vertex checkpoints
//!
//! Only plain data crosses this boundary. A vertex whose built object is a
//! live component or a function is captured as unbuilt, and the upstream
//! vertices that fed it non-literal parameters are reset so that a rebuild
//! starts from a consistent state.

use crate::{BuildState, BuildStep, Graph, ParamMap, ParamValue, Vertex, VertexState};
use vertexcore::{
    Artifacts, BuildError, BuiltObject, GraphCheckpoint, GraphError, ParamSnapshot, Template,
    VertexSnapshot,
};

/// Capture one vertex of `graph`
///
/// Takes the graph mutably: a non-serializable built object triggers the
/// upstream reset cascade.
pub fn capture(graph: &mut Graph, id: &str) -> Result<VertexSnapshot, BuildError> {
    let idx = graph.index_of(id)?;

    let built_value = graph.vertices[idx].built_object().map(BuiltObject::to_value);
    let built_object = match built_value {
        Some(Some(value)) => Some(value),
        Some(None) => {
            let reset = graph.invalidate_upstream(idx);
            tracing::debug!(
                vertex_id = %id,
                reset = reset.len(),
                "built object is not serializable, capturing vertex as unbuilt"
            );
            None
        }
        None => None,
    };

    let vertex = &graph.vertices[idx];
    let built = built_object.is_some();
    let artifacts = if built {
        vertex.artifacts().cloned().unwrap_or_default()
    } else {
        Artifacts::new()
    };

    Ok(VertexSnapshot {
        id: vertex.id.clone(),
        vertex_type: vertex.vertex_type.clone(),
        declared_type: vertex.declared_type.clone(),
        base_type: vertex.base_type.clone(),
        base_classes: vertex.base_classes.clone(),
        display_name: Some(vertex.display_name.clone()),
        template: vertex.raw_template.clone(),
        params: vertex
            .params
            .iter()
            .map(|(key, value)| (key.clone(), snapshot_param(value)))
            .collect(),
        overrides: vertex.overrides.clone(),
        edges: graph
            .edges
            .iter()
            .filter(|e| e.source == vertex.id || e.target == vertex.id)
            .map(|e| e.to_spec())
            .collect(),
        built,
        built_object,
        artifacts,
        task: vertex.task.clone(),
        frozen: vertex.frozen,
        deferred: vertex.deferred,
        inactive: !vertex.is_active(),
    })
}

fn snapshot_param(value: &ParamValue) -> ParamSnapshot {
    match value {
        ParamValue::Literal(value) => ParamSnapshot::Literal { value: value.clone() },
        ParamValue::Ref(source) => ParamSnapshot::Ref { source: source.clone() },
        ParamValue::RefList(sources) => ParamSnapshot::RefList { sources: sources.clone() },
        ParamValue::Resolved { sources, object } => match object.to_value() {
            Some(value) => ParamSnapshot::Resolved {
                sources: sources.clone(),
                value,
            },
            None => match (object, sources.as_slice()) {
                (BuiltObject::List(_), _) => ParamSnapshot::RefList { sources: sources.clone() },
                (_, [source]) => ParamSnapshot::Ref { source: source.clone() },
                _ => ParamSnapshot::RefList { sources: sources.clone() },
            },
        },
    }
}

fn restore_param(snapshot: &ParamSnapshot) -> ParamValue {
    match snapshot {
        ParamSnapshot::Literal { value } => ParamValue::Literal(value.clone()),
        ParamSnapshot::Ref { source } => ParamValue::Ref(source.clone()),
        ParamSnapshot::RefList { sources } => ParamValue::RefList(sources.clone()),
        ParamSnapshot::Resolved { sources, value } => ParamValue::Resolved {
            sources: sources.clone(),
            object: BuiltObject::Data(value.clone()),
        },
    }
}

/// Rebuild a vertex from its snapshot
pub fn restore_vertex(snapshot: &VertexSnapshot) -> Result<Vertex, GraphError> {
    let template = Template::parse(&snapshot.template).map_err(|source| GraphError::Template {
        vertex_id: snapshot.id.clone(),
        source,
    })?;

    let params: ParamMap = snapshot
        .params
        .iter()
        .map(|(key, value)| (key.clone(), restore_param(value)))
        .collect();

    let (state, steps_ran) = match (&snapshot.built_object, snapshot.built) {
        (Some(object), true) => (
            BuildState::Built {
                object: BuiltObject::Data(object.clone()),
                artifacts: snapshot.artifacts.clone(),
            },
            BuildStep::PIPELINE.to_vec(),
        ),
        _ => (BuildState::Unbuilt, Vec::new()),
    };

    Ok(Vertex {
        id: snapshot.id.clone(),
        display_name: snapshot.display_name.clone().unwrap_or_else(|| snapshot.id.clone()),
        declared_type: snapshot.declared_type.clone(),
        vertex_type: snapshot.vertex_type.clone(),
        base_type: snapshot.base_type.clone(),
        base_classes: snapshot.base_classes.clone(),
        template,
        raw_template: snapshot.template.clone(),
        params,
        overrides: snapshot.overrides.clone(),
        state,
        steps_ran,
        task: snapshot.task.clone(),
        frozen: snapshot.frozen,
        deferred: snapshot.deferred,
        activity: if snapshot.inactive {
            VertexState::Inactive
        } else {
            VertexState::Active
        },
        build_times: Vec::new(),
    })
}

/// Put a captured vertex back into `graph`
///
/// An unbuilt restore re-wires edge parameters the snapshot lacks, so the
/// next build resolves them again.
pub fn restore(graph: &mut Graph, snapshot: &VertexSnapshot) -> Result<(), GraphError> {
    let idx = *graph
        .index
        .get(&snapshot.id)
        .ok_or_else(|| GraphError::VertexNotFound(snapshot.id.clone()))?;

    graph.vertices[idx] = restore_vertex(snapshot)?;
    if snapshot.inactive && graph.incoming_edges(&snapshot.id).count() <= 1 {
        graph.inactivated.insert(snapshot.id.clone());
    } else {
        graph.inactivated.remove(&snapshot.id);
    }

    if !graph.vertices[idx].is_built() {
        let wired = graph.wired_params(idx);
        let params = &mut graph.vertices[idx].params;
        for (key, value) in wired {
            params.entry(key).or_insert(value);
        }
    }
    tracing::debug!(vertex_id = %snapshot.id, built = snapshot.built, "vertex restored");
    Ok(())
}

impl Graph {
    /// Capture every vertex
    ///
    /// Consumers are captured before their sources so that a reset cascade
    /// never invalidates a vertex already written as built.
    pub fn checkpoint(&mut self) -> Result<GraphCheckpoint, BuildError> {
        let mut order = self.topological_sort().unwrap_or_else(|_| self.vertex_ids());
        order.reverse();
        let mut vertices = Vec::with_capacity(order.len());
        for id in order {
            vertices.push(capture(self, &id)?);
        }
        Ok(GraphCheckpoint {
            name: self.name.clone(),
            vertices,
        })
    }

    pub fn restore_checkpoint(&mut self, checkpoint: &GraphCheckpoint) -> Result<(), GraphError> {
        for snapshot in &checkpoint.vertices {
            restore(self, snapshot)?;
        }
        Ok(())
    }
}
