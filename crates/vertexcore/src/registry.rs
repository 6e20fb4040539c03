use crate::{ComponentError, Instantiated, Params};
use async_trait::async_trait;

/// Base type of user-authored components, the most common source of build failures
pub const CUSTOM_COMPONENTS_BASE_TYPE: &str = "custom_components";

/// Instantiates the object behind a vertex
///
/// Injected into a graph when it is loaded. The engine never decides which
/// components exist; it only asks the registry to build them.
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    /// Instantiate a component from its resolved parameters
    async fn instantiate(
        &self,
        vertex_type: &str,
        base_type: &str,
        params: &Params,
    ) -> Result<Instantiated, ComponentError>;

    /// Optional: coarse category of a vertex type, used when the loader gives none
    fn base_type_for(&self, _vertex_type: &str) -> Option<String> {
        None
    }

    /// Optional: every vertex type this registry can build
    fn component_types(&self) -> Vec<String> {
        Vec::new()
    }
}
