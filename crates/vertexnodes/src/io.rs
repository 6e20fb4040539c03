use crate::{optional_text, require_text};
use vertexcore::{ComponentError, Instantiated, Params, Value};
use vertexruntime::{ComponentFactory, ComponentMetadata, PortDefinition};

pub const CHAT_INPUT: &str = "ChatInput";
pub const CHAT_OUTPUT: &str = "ChatOutput";

/// Entry point of a chat flow: hands its `input_value` downstream
pub struct ChatInputFactory;

impl ComponentFactory for ChatInputFactory {
    fn create(&self, params: &Params) -> Result<Instantiated, ComponentError> {
        let message = optional_text(params, "input_value").unwrap_or_default();
        let sender = optional_text(params, "sender_name").unwrap_or_else(|| "User".to_string());
        tracing::debug!(%sender, "chat input received");

        Ok(Instantiated::new(message).with_artifact("sender", sender))
    }

    fn component_type(&self) -> &str {
        CHAT_INPUT
    }

    fn base_type(&self) -> &str {
        "inputs"
    }

    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            description: "Get chat input from the user".to_string(),
            category: "inputs".to_string(),
            inputs: vec![
                PortDefinition::new("input_value", "Message text", false),
                PortDefinition::new("sender_name", "Name of the sender", false),
            ],
            outputs: vec![PortDefinition::new("message", "The message text", true)],
        }
    }
}

/// Terminal vertex of a chat flow: records the message it receives
pub struct ChatOutputFactory;

impl ComponentFactory for ChatOutputFactory {
    fn create(&self, params: &Params) -> Result<Instantiated, ComponentError> {
        let message = require_text(params, "input_value")?;
        let sender = optional_text(params, "sender_name").unwrap_or_else(|| "Machine".to_string());

        Ok(Instantiated::new(message.clone())
            .with_artifact("message", Value::String(message))
            .with_artifact("sender", sender))
    }

    fn component_type(&self) -> &str {
        CHAT_OUTPUT
    }

    fn base_type(&self) -> &str {
        "outputs"
    }

    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            description: "Display a chat message".to_string(),
            category: "outputs".to_string(),
            inputs: vec![
                PortDefinition::new("input_value", "Message to display", true),
                PortDefinition::new("sender_name", "Name of the sender", false),
            ],
            outputs: vec![PortDefinition::new("message", "The displayed text", true)],
        }
    }
}
