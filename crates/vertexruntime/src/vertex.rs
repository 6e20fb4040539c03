use std::collections::BTreeMap;
use std::time::Duration;
use vertexcore::{
    derive_vertex_type, Artifacts, BuildError, BuiltObject, TaskHandle, Template, TemplateError,
    Value, VertexId, VertexSpec,
};

/// Parameter map of a vertex
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Steps of the build pipeline, run at most once per build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    ResolveDependencies,
    ResolveParameters,
    Instantiate,
}

impl BuildStep {
    pub const PIPELINE: [BuildStep; 3] = [
        BuildStep::ResolveDependencies,
        BuildStep::ResolveParameters,
        BuildStep::Instantiate,
    ];
}

/// Value held for one parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Value),
    /// Wired to another vertex, not yet resolved
    Ref(VertexId),
    /// Wired to several vertices through a list parameter
    RefList(Vec<VertexId>),
    /// Result delivered by upstream vertices
    Resolved {
        sources: Vec<VertexId>,
        object: BuiltObject,
    },
}

impl ParamValue {
    pub fn is_reference(&self) -> bool {
        matches!(self, ParamValue::Ref(_) | ParamValue::RefList(_))
    }

    /// Supplied through an edge rather than the template
    pub fn is_edge_supplied(&self) -> bool {
        !matches!(self, ParamValue::Literal(_))
    }

    pub fn object(&self) -> Option<BuiltObject> {
        match self {
            ParamValue::Literal(value) => Some(BuiltObject::Data(value.clone())),
            ParamValue::Resolved { object, .. } => Some(object.clone()),
            ParamValue::Ref(_) | ParamValue::RefList(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ParamValue::Literal(value) => Some(value),
            _ => None,
        }
    }
}

/// Whether a vertex takes part in builds
///
/// An inactive vertex builds to an empty result without instantiating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VertexState {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone)]
pub enum BuildState {
    Unbuilt,
    Building(BuildStep),
    Built {
        object: BuiltObject,
        artifacts: Artifacts,
    },
    Failed(BuildError),
}

/// A single component instance of the graph
///
/// Vertices live in the [`Graph`](crate::Graph) arena; other vertices are
/// referred to by id only.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub(crate) id: VertexId,
    pub(crate) display_name: String,
    pub(crate) declared_type: String,
    pub(crate) vertex_type: String,
    pub(crate) base_type: Option<String>,
    pub(crate) base_classes: Vec<String>,
    pub(crate) template: Template,
    pub(crate) raw_template: serde_json::Value,
    pub(crate) params: ParamMap,
    pub(crate) overrides: BTreeMap<String, Value>,
    pub(crate) state: BuildState,
    pub(crate) steps_ran: Vec<BuildStep>,
    pub(crate) task: Option<TaskHandle>,
    pub(crate) frozen: bool,
    pub(crate) deferred: bool,
    pub(crate) activity: VertexState,
    pub(crate) build_times: Vec<Duration>,
}

impl Vertex {
    pub fn from_spec<F>(spec: &VertexSpec, capability_tag: &str, base_type_for: F) -> Result<Self, TemplateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let template = Template::parse(&spec.template)?;
        let vertex_type = derive_vertex_type(&spec.vertex_type, &spec.base_classes, &template, capability_tag);
        let base_type = spec.base_type.clone().or_else(|| base_type_for(&vertex_type));

        Ok(Self {
            id: spec.id.clone(),
            display_name: spec
                .display_name
                .clone()
                .unwrap_or_else(|| default_display_name(&spec.id)),
            declared_type: spec.vertex_type.clone(),
            vertex_type,
            base_type,
            base_classes: spec.base_classes.clone(),
            template,
            raw_template: spec.template.clone(),
            params: ParamMap::new(),
            overrides: BTreeMap::new(),
            state: BuildState::Unbuilt,
            steps_ran: Vec::new(),
            task: None,
            frozen: spec.frozen,
            deferred: spec.deferred,
            activity: VertexState::Active,
            build_times: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Runtime type tag used to look up the component
    pub fn vertex_type(&self) -> &str {
        &self.vertex_type
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn base_type(&self) -> Option<&str> {
        self.base_type.as_deref()
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn overrides(&self) -> &BTreeMap<String, Value> {
        &self.overrides
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, BuildState::Built { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, BuildState::Failed(_))
    }

    pub fn built_object(&self) -> Option<&BuiltObject> {
        match &self.state {
            BuildState::Built { object, .. } => Some(object),
            _ => None,
        }
    }

    pub fn artifacts(&self) -> Option<&Artifacts> {
        match &self.state {
            BuildState::Built { artifacts, .. } => Some(artifacts),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        match &self.state {
            BuildState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn steps_ran(&self) -> &[BuildStep] {
        &self.steps_ran
    }

    pub fn task(&self) -> Option<&TaskHandle> {
        self.task.as_ref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub fn activity(&self) -> VertexState {
        self.activity
    }

    pub fn is_active(&self) -> bool {
        self.activity == VertexState::Active
    }

    pub fn build_times(&self) -> &[Duration] {
        &self.build_times
    }

    pub fn avg_build_time(&self) -> Duration {
        if self.build_times.is_empty() {
            return Duration::ZERO;
        }
        self.build_times.iter().sum::<Duration>() / self.build_times.len() as u32
    }

    /// Back to Unbuilt; the graph re-wires params from its edges afterwards
    pub(crate) fn reset(&mut self) {
        self.state = BuildState::Unbuilt;
        self.steps_ran.clear();
        self.params.clear();
        self.task = None;
    }
}

fn default_display_name(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}
