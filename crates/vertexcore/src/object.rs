use crate::{ComponentError, Value};
use futures_util::future::BoxFuture;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Auxiliary data produced alongside a built object
pub type Artifacts = BTreeMap<String, Value>;

/// Fully resolved parameters handed to a component registry
pub type Params = BTreeMap<String, BuiltObject>;

/// A live runtime object produced by a component
pub trait Component: Send + Sync + fmt::Debug {
    /// Component type identifier (e.g. "chat.model", "vectorstore.memory")
    fn component_type(&self) -> &str;

    /// Optional: the function this object exposes when wired into a `func` parameter
    fn callable(&self) -> Option<Callable> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

pub type SyncFn = dyn Fn(Value) -> Result<Value, ComponentError> + Send + Sync;
pub type AsyncFn = dyn Fn(Value) -> BoxFuture<'static, Result<Value, ComponentError>> + Send + Sync;

/// Function handle that knows whether it is synchronous or asynchronous
#[derive(Clone)]
pub enum Callable {
    Sync(Arc<SyncFn>),
    Async(Arc<AsyncFn>),
}

impl Callable {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ComponentError> + Send + Sync + 'static,
    {
        Callable::Sync(Arc::new(f))
    }

    pub fn asynchronous<F>(f: F) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value, ComponentError>> + Send + Sync + 'static,
    {
        Callable::Async(Arc::new(f))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Callable::Async(_))
    }

    pub async fn call(&self, input: Value) -> Result<Value, ComponentError> {
        match self {
            Callable::Sync(f) => f(input),
            Callable::Async(f) => f(input).await,
        }
    }

    /// Async form of this callable; a sync function runs inside a ready future
    pub fn to_async(&self) -> Callable {
        match self {
            Callable::Async(_) => self.clone(),
            Callable::Sync(f) => {
                let f = Arc::clone(f);
                Callable::asynchronous(move |input| -> BoxFuture<'static, Result<Value, ComponentError>> {
                    let f = Arc::clone(&f);
                    Box::pin(async move { f(input) })
                })
            }
        }
    }

    fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Sync(a), Callable::Sync(b)) => Arc::ptr_eq(a, b),
            (Callable::Async(a), Callable::Async(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Sync(_) => f.write_str("Callable::Sync"),
            Callable::Async(_) => f.write_str("Callable::Async"),
        }
    }
}

/// The object a vertex produces once built
///
/// Only `Data` is serializable; every other variant is dropped from
/// checkpoints and forces a rebuild instead.
#[derive(Debug, Clone)]
pub enum BuiltObject {
    Data(Value),
    Object(Arc<dyn Component>),
    Callable(Callable),
    List(Vec<BuiltObject>),
    /// Results bound under named keys of a dict-valued field
    Map(BTreeMap<String, BuiltObject>),
}

impl BuiltObject {
    pub fn object<C: Component + 'static>(component: C) -> Self {
        BuiltObject::Object(Arc::new(component))
    }

    /// Plain values (and lists made only of plain values) are literals
    pub fn is_literal(&self) -> bool {
        match self {
            BuiltObject::Data(_) => true,
            BuiltObject::List(items) => items.iter().all(BuiltObject::is_literal),
            BuiltObject::Map(entries) => entries.values().all(BuiltObject::is_literal),
            BuiltObject::Object(_) | BuiltObject::Callable(_) => false,
        }
    }

    /// Absent objects fail validation
    pub fn is_absent(&self) -> bool {
        matches!(self, BuiltObject::Data(Value::Null))
    }

    /// Serializable form, `None` for anything holding a live object or function
    pub fn to_value(&self) -> Option<Value> {
        match self {
            BuiltObject::Data(value) => Some(value.clone()),
            BuiltObject::List(items) => items
                .iter()
                .map(BuiltObject::to_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            BuiltObject::Map(entries) => entries
                .iter()
                .map(|(key, item)| item.to_value().map(|value| (key.clone(), value)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Value::Object),
            BuiltObject::Object(_) | BuiltObject::Callable(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            BuiltObject::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_component(&self) -> Option<&Arc<dyn Component>> {
        match self {
            BuiltObject::Object(component) => Some(component),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<Callable> {
        match self {
            BuiltObject::Callable(callable) => Some(callable.clone()),
            BuiltObject::Object(component) => component.callable(),
            _ => None,
        }
    }
}

impl PartialEq for BuiltObject {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BuiltObject::Data(a), BuiltObject::Data(b)) => a == b,
            (BuiltObject::Object(a), BuiltObject::Object(b)) => Arc::ptr_eq(a, b),
            (BuiltObject::Callable(a), BuiltObject::Callable(b)) => a.ptr_eq(b),
            (BuiltObject::List(a), BuiltObject::List(b)) => a == b,
            (BuiltObject::Map(a), BuiltObject::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for BuiltObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuiltObject::Data(value) => write!(f, "{}", value),
            BuiltObject::Object(component) => write!(f, "<{}>", component.component_type()),
            BuiltObject::Callable(callable) if callable.is_async() => f.write_str("<async callable>"),
            BuiltObject::Callable(_) => f.write_str("<callable>"),
            BuiltObject::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            BuiltObject::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, item)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<Value> for BuiltObject {
    fn from(value: Value) -> Self {
        BuiltObject::Data(value)
    }
}

impl From<&str> for BuiltObject {
    fn from(s: &str) -> Self {
        BuiltObject::Data(Value::from(s))
    }
}

impl From<String> for BuiltObject {
    fn from(s: String) -> Self {
        BuiltObject::Data(Value::String(s))
    }
}

/// What a registry hands back: the object plus optional artifacts
#[derive(Debug, Clone)]
pub struct Instantiated {
    pub object: BuiltObject,
    pub artifacts: Artifacts,
}

impl Instantiated {
    pub fn new(object: impl Into<BuiltObject>) -> Self {
        Self {
            object: object.into(),
            artifacts: Artifacts::new(),
        }
    }

    pub fn with_artifact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.artifacts.insert(key.into(), value.into());
        self
    }
}

impl From<BuiltObject> for Instantiated {
    fn from(object: BuiltObject) -> Self {
        Self::new(object)
    }
}

impl From<(BuiltObject, Artifacts)> for Instantiated {
    fn from((object, artifacts): (BuiltObject, Artifacts)) -> Self {
        Self { object, artifacts }
    }
}
