//! Core abstractions for the vertex build engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: values and built objects, the template model,
//! the graph description, errors, events, and the seams the runtime is
//! wired through (component registry, task backend).

mod checkpoint;
mod deferred;
mod error;
pub mod events;
mod graph;
pub mod literal;
mod object;
mod registry;
pub mod template;
mod value;

pub use checkpoint::{GraphCheckpoint, ParamSnapshot, VertexSnapshot};
pub use deferred::{TaskBackend, TaskHandle, TaskOutput, TaskPoll};
pub use error::{
    BuildError, ComponentError, DeferredError, Error, GraphError, LiteralError, TemplateError,
};
pub use events::*;
pub use graph::{EdgeSpec, GraphSpec, VertexId, VertexSpec};
pub use object::{
    Artifacts, AsyncFn, BuiltObject, Callable, Component, Instantiated, Params, SyncFn,
};
pub use registry::{ComponentRegistry, CUSTOM_COMPONENTS_BASE_TYPE};
pub use template::{derive_vertex_type, FieldSpec, InputTypes, Template, TYPE_OVERRIDE_KEY};
pub use value::Value;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
