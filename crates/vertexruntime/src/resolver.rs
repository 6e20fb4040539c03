//! Parameter resolution
//!
//! Turns a vertex template plus whatever its edges delivered into the
//! parameter map handed to the component registry.

use crate::{ParamMap, ParamValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use vertexcore::literal::parse_literal;
use vertexcore::{BuildError, FieldSpec, Params, Template, Value};

/// Field name that always keeps its raw text
const CODE_FIELD: &str = "code";

pub struct ResolveContext<'a> {
    pub vertex_id: &'a str,
    pub storage_root: Option<&'a Path>,
}

/// Fill `params` from the template, leaving edge-supplied values alone
pub fn resolve_parameters(
    template: &Template,
    params: &mut ParamMap,
    overrides: &BTreeMap<String, Value>,
    ctx: &ResolveContext<'_>,
) -> Result<(), BuildError> {
    for (name, field) in &template.fields {
        if params.get(name).is_some_and(ParamValue::is_edge_supplied) {
            continue;
        }
        params.remove(name);

        if !field.show && name != CODE_FIELD {
            continue;
        }

        let literal = if let Some(value) = overrides.get(name) {
            Some(value.clone())
        } else if field.field_type == "file" {
            resolve_file(name, field, ctx)?
        } else if field.is_basic() {
            coerce_literal(name, field, ctx)?
        } else {
            None
        };

        match literal.filter(|v| !v.is_null()) {
            Some(value) => {
                params.insert(name.clone(), ParamValue::Literal(value));
            }
            None if !field.required => {
                if let Some(default) = field.default.as_ref().filter(|d| !d.is_null()) {
                    params.insert(name.clone(), ParamValue::Literal(Value::from(default)));
                }
            }
            None if !field.is_basic() => {
                return Err(BuildError::Resolution {
                    vertex_id: ctx.vertex_id.to_string(),
                    param: name.clone(),
                    message: format!(
                        "required {} input '{}' is not connected",
                        field.field_type,
                        field.display_name.as_deref().unwrap_or(name)
                    ),
                });
            }
            None => {}
        }
    }

    // Overrides outside the template were accepted with `overwrite`
    for (name, value) in overrides {
        if template.field(name).is_some() || params.get(name).is_some_and(ParamValue::is_edge_supplied) {
            continue;
        }
        params.insert(name.clone(), ParamValue::Literal(value.clone()));
    }

    Ok(())
}

/// Coerce a template literal according to its field type
///
/// `Ok(None)` means the field has no usable value.
pub fn coerce_literal(
    name: &str,
    field: &FieldSpec,
    ctx: &ResolveContext<'_>,
) -> Result<Option<Value>, BuildError> {
    let raw = Value::from(&field.value);
    if raw.is_null() {
        return Ok(None);
    }

    let value = match field.field_type.as_str() {
        "code" if name == CODE_FIELD => Some(raw),
        "code" => match raw {
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(parse_literal(&text).unwrap_or(Value::String(text))),
            other => Some(other),
        },
        "dict" | "NestedDict" => match raw {
            Value::Array(items) => Some(flatten_entries(items, name, ctx)?),
            Value::Object(map) => Some(Value::Object(map)),
            _ => None,
        },
        "int" => Some(match raw {
            Value::String(text) => match text.trim().parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => Value::String(text),
            },
            Value::Float(f) if f.fract() == 0.0 => Value::Int(f as i64),
            other => other,
        }),
        "float" | "slider" => Some(match raw {
            Value::String(text) => match text.trim().parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(text),
            },
            Value::Int(n) => Value::Float(n as f64),
            other => other,
        }),
        "str" => Some(match raw {
            Value::String(text) => Value::String(unescape(&text)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(text) => Value::String(unescape(&text)),
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        }),
        "bool" => Some(match raw {
            Value::String(text) => match text.to_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Bool(!text.is_empty()),
            },
            Value::Int(n) => Value::Bool(n != 0),
            other => other,
        }),
        "table" => match raw {
            Value::Array(rows) if rows.iter().all(|row| row.as_object().is_some()) => {
                Some(Value::Array(rows))
            }
            _ => {
                return Err(BuildError::Configuration {
                    vertex_id: ctx.vertex_id.to_string(),
                    message: format!("table field '{}' must be a list of rows", name),
                })
            }
        },
        _ => Some(raw),
    };

    Ok(value)
}

fn flatten_entries(items: Vec<Value>, name: &str, ctx: &ResolveContext<'_>) -> Result<Value, BuildError> {
    let mut merged = BTreeMap::new();
    for item in items {
        match item {
            Value::Object(entry) => merged.extend(entry),
            other => {
                return Err(BuildError::Configuration {
                    vertex_id: ctx.vertex_id.to_string(),
                    message: format!("dict field '{}' holds a non-mapping entry: {}", name, other),
                })
            }
        }
    }
    Ok(Value::Object(merged))
}

fn resolve_file(name: &str, field: &FieldSpec, ctx: &ResolveContext<'_>) -> Result<Option<Value>, BuildError> {
    match field.file_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => Ok(Some(Value::String(storage_path(path, ctx.storage_root).display().to_string()))),
        None if field.required => Err(BuildError::Configuration {
            vertex_id: ctx.vertex_id.to_string(),
            message: format!(
                "file path not found for {}",
                field.display_name.as_deref().unwrap_or(name)
            ),
        }),
        None if field.list => Ok(Some(Value::Array(Vec::new()))),
        None => Ok(None),
    }
}

/// `flow_id/file_name` paths live under the storage root
fn storage_path(path: &str, storage_root: Option<&Path>) -> PathBuf {
    let relative = Path::new(path);
    match storage_root {
        Some(root) if relative.is_relative() && relative.components().count() == 2 => root.join(relative),
        _ => relative.to_path_buf(),
    }
}

/// Turn literal `\n`, `\t` and `\r` escape sequences into the real characters
pub fn unescape(text: &str) -> String {
    text.replace("\\n", "\n").replace("\\t", "\t").replace("\\r", "\r")
}

/// Parameters as handed to the registry; every reference must be resolved by now
pub fn to_params(vertex_id: &str, params: &ParamMap) -> Result<Params, BuildError> {
    params
        .iter()
        .map(|(name, value)| {
            value
                .object()
                .map(|object| (name.clone(), object))
                .ok_or_else(|| BuildError::Resolution {
                    vertex_id: vertex_id.to_string(),
                    param: name.clone(),
                    message: "dependency has not been resolved".to_string(),
                })
        })
        .collect()
}
