use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use vertexcore::{ComponentError, ComponentRegistry, Instantiated, Params};

/// Factory trait for instantiating one component type
pub trait ComponentFactory: Send + Sync {
    /// Build the component from its resolved parameters
    fn create(&self, params: &Params) -> Result<Instantiated, ComponentError>;

    /// Vertex type this factory answers to
    fn component_type(&self) -> &str;

    /// Coarse category (e.g. "inputs", "prompts", "custom_components")
    fn base_type(&self) -> &str;

    /// Optional: description and input schema
    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata::default()
    }
}

/// Metadata about a component type
#[derive(Debug, Clone)]
pub struct ComponentMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

impl Default for ComponentMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl PortDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

/// Component registry backed by in-process factories
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn ComponentFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a component factory
    pub fn register(&mut self, factory: Arc<dyn ComponentFactory>) {
        let component_type = factory.component_type().to_string();
        tracing::info!("Registering component type: {}", component_type);
        self.factories.insert(component_type, factory);
    }

    /// All registered component types, sorted
    pub fn list_component_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a component type
    pub fn get_metadata(&self, component_type: &str) -> Option<ComponentMetadata> {
        self.factories.get(component_type).map(|f| f.metadata())
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComponentRegistry for FactoryRegistry {
    async fn instantiate(
        &self,
        vertex_type: &str,
        base_type: &str,
        params: &Params,
    ) -> Result<Instantiated, ComponentError> {
        let factory = self
            .factories
            .get(vertex_type)
            .ok_or_else(|| ComponentError::UnknownType(vertex_type.to_string()))?;

        if factory.base_type() != base_type {
            return Err(ComponentError::UnknownType(format!(
                "{} (base type {}, registered as {})",
                vertex_type,
                base_type,
                factory.base_type()
            )));
        }

        tracing::debug!(vertex_type, base_type, params = params.len(), "instantiating component");
        factory.create(params)
    }

    fn base_type_for(&self, vertex_type: &str) -> Option<String> {
        self.factories.get(vertex_type).map(|f| f.base_type().to_string())
    }

    fn component_types(&self) -> Vec<String> {
        self.list_component_types()
    }
}
