//! Vertex build runtime
//!
//! This crate provides the graph arena and the engine that builds it:
//! parameter resolution, the memoized per-vertex build pipeline, deferred
//! execution through a task backend, and vertex checkpoints.

mod backend;
mod build;
pub mod checkpoint;
mod deferred;
mod edge;
mod graph;
mod registry;
pub mod resolver;
mod runtime;
mod vertex;

pub use backend::InMemoryTaskBackend;
pub use build::{BuildOptions, ResultDict, COROUTINE_PARAM, FUNC_PARAM};
pub use edge::Edge;
pub use graph::{Graph, GraphContext};
pub use registry::{ComponentFactory, ComponentMetadata, FactoryRegistry, PortDefinition};
pub use runtime::{BuildRuntime, RuntimeConfig};
pub use vertex::{BuildState, BuildStep, ParamMap, ParamValue, Vertex, VertexState};
