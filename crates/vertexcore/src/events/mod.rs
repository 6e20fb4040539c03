// crates/vertexcore/src/events/mod.rs

mod base;

pub use base::{BuildEvent, BuildId, EventBus};
