//! Template model: the declared inputs of a vertex
//!
//! A raw template is a JSON object mapping field names to field specs, plus
//! an optional `_type` string that may override the vertex type.

use crate::TemplateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field types whose values can be coerced from the template literal
pub const LITERAL_TYPES: &[&str] = &[
    "str", "bool", "dict", "NestedDict", "int", "float", "slider", "Any", "prompt", "code", "table",
    "file",
];

pub const TYPE_OVERRIDE_KEY: &str = "_type";

/// One declared input of a vertex
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub list: bool,

    #[serde(default = "default_show")]
    pub show: bool,

    #[serde(default)]
    pub value: serde_json::Value,

    #[serde(default)]
    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub input_types: Vec<String>,

    #[serde(default)]
    pub file_path: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_show() -> bool {
    true
}

impl FieldSpec {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            required: false,
            list: false,
            show: true,
            value: serde_json::Value::Null,
            default: None,
            input_types: Vec::new(),
            file_path: None,
            display_name: None,
        }
    }

    /// Literal-coercible types; everything else has to come from another vertex
    pub fn is_basic(&self) -> bool {
        LITERAL_TYPES.contains(&self.field_type.as_str())
    }

    /// Types an incoming edge may deliver into this field
    pub fn accepts(&self, source_type: &str) -> bool {
        self.field_type == source_type || self.input_types.iter().any(|t| t == source_type)
    }
}

/// Type tags of a template, split by required-ness
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTypes {
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub type_override: Option<String>,
    /// Keyed by field name, iterated in name order
    pub fields: BTreeMap<String, FieldSpec>,
}

impl Template {
    pub fn parse(raw: &serde_json::Value) -> Result<Self, TemplateError> {
        let entries = raw.as_object().ok_or(TemplateError::NotAnObject)?;
        let mut fields = BTreeMap::new();
        let mut type_override = None;

        for (name, entry) in entries {
            match entry {
                serde_json::Value::Object(spec) => {
                    match spec.get("type") {
                        Some(serde_json::Value::String(_)) => {}
                        _ => return Err(TemplateError::MissingFieldType(name.clone())),
                    }
                    let field: FieldSpec = serde_json::from_value(entry.clone()).map_err(|e| {
                        TemplateError::InvalidField {
                            field: name.clone(),
                            message: e.to_string(),
                        }
                    })?;
                    fields.insert(name.clone(), field);
                }
                serde_json::Value::String(s) if name == TYPE_OVERRIDE_KEY => {
                    type_override = Some(s.clone());
                }
                _ => tracing::trace!(entry = %name, "skipping non-field template entry"),
            }
        }

        Ok(Self {
            type_override,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Required type tags, then optional type tags followed by every accepted input type
    ///
    /// Tags come out in field-name order. Templates are JSON objects, which do not
    /// keep key order once parsed, so declaration order is not recoverable here.
    pub fn input_types(&self) -> InputTypes {
        let mut types = InputTypes::default();
        for field in self.fields.values() {
            if field.required {
                types.required.push(field.field_type.clone());
            } else {
                types.optional.push(field.field_type.clone());
            }
        }
        for field in self.fields.values() {
            types.optional.extend(field.input_types.iter().cloned());
        }
        types
    }
}

/// Runtime type tag of a vertex
///
/// The declared type wins unless the vertex carries the capability tag in its
/// base classes and the template overrides the type with a lower-cased string.
pub fn derive_vertex_type(
    declared: &str,
    base_classes: &[String],
    template: &Template,
    capability_tag: &str,
) -> String {
    let has_capability = base_classes.iter().any(|c| c == capability_tag);
    match &template.type_override {
        Some(over) if has_capability && !over.is_empty() && *over == over.to_lowercase() => {
            over.clone()
        }
        _ => declared.to_string(),
    }
}
