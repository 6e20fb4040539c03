use crate::{object_text, optional_text, require_text};
use vertexcore::{BuiltObject, ComponentError, Instantiated, Params, Value};
use vertexruntime::{ComponentFactory, ComponentMetadata, PortDefinition};

pub const JSON_PARSE: &str = "JsonParse";
pub const JOIN_TEXT: &str = "JoinText";

/// Parse a JSON string into structured data
pub struct JsonParseFactory;

impl ComponentFactory for JsonParseFactory {
    fn create(&self, params: &Params) -> Result<Instantiated, ComponentError> {
        let input = require_text(params, "json")?;

        let parsed: serde_json::Value = serde_json::from_str(&input)
            .map_err(|e| ComponentError::Failed(format!("JSON parse error: {}", e)))?;

        Ok(Instantiated::new(Value::from(parsed)))
    }

    fn component_type(&self) -> &str {
        JSON_PARSE
    }

    fn base_type(&self) -> &str {
        "processing"
    }

    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            description: "Parse JSON string".to_string(),
            category: "processing".to_string(),
            inputs: vec![PortDefinition::new("json", "JSON text", true)],
            outputs: vec![PortDefinition::new("data", "Parsed value", true)],
        }
    }
}

/// Join a list of texts with a separator
pub struct JoinTextFactory;

impl ComponentFactory for JoinTextFactory {
    fn create(&self, params: &Params) -> Result<Instantiated, ComponentError> {
        let items = params
            .get("items")
            .ok_or_else(|| ComponentError::MissingParam("items".to_string()))?;
        let separator = optional_text(params, "separator").unwrap_or_else(|| "\n".to_string());

        let parts: Vec<String> = match items {
            BuiltObject::List(objects) => objects.iter().map(object_text).collect(),
            BuiltObject::Data(Value::Array(values)) => values.iter().map(Value::to_string).collect(),
            other => vec![object_text(other)],
        };

        Ok(Instantiated::new(parts.join(&separator)).with_artifact("count", parts.len() as i64))
    }

    fn component_type(&self) -> &str {
        JOIN_TEXT
    }

    fn base_type(&self) -> &str {
        "processing"
    }

    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            description: "Join texts with a separator".to_string(),
            category: "processing".to_string(),
            inputs: vec![
                PortDefinition::new("items", "Texts to join", true),
                PortDefinition::new("separator", "Defaults to a newline", false),
            ],
            outputs: vec![PortDefinition::new("text", "The joined text", true)],
        }
    }
}
