use crate::{object_text, require_text};
use vertexcore::{ComponentError, Instantiated, Params};
use vertexruntime::{ComponentFactory, ComponentMetadata, PortDefinition};

pub const PROMPT: &str = "Prompt";

/// Fills `{variable}` placeholders of its `template` from the other parameters
pub struct PromptFactory;

impl PromptFactory {
    /// Placeholder names in order of appearance, without duplicates
    pub fn variables(template: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let _ = render(template, |name| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            Ok(String::new())
        });
        names
    }

    pub fn format(template: &str, params: &Params) -> Result<String, ComponentError> {
        render(template, |name| {
            params
                .get(name)
                .map(object_text)
                .ok_or_else(|| ComponentError::MissingParam(name.to_string()))
        })
    }
}

/// Substitute every `{name}`; `{{` and `}}` are literal braces
fn render<F>(template: &str, mut lookup: F) -> Result<String, ComponentError>
where
    F: FnMut(&str) -> Result<String, ComponentError>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{{").or_else(|| tail.strip_prefix("}}")) {
            out.push_str(&tail[..1]);
            rest = after;
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }
        match tail[1..].find('}') {
            Some(close) if !tail[1..=close].trim().is_empty() => {
                out.push_str(&lookup(tail[1..=close].trim())?);
                rest = &tail[close + 2..];
            }
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

impl ComponentFactory for PromptFactory {
    fn create(&self, params: &Params) -> Result<Instantiated, ComponentError> {
        let template = require_text(params, "template")?;
        let text = Self::format(&template, params)?;
        Ok(Instantiated::new(text).with_artifact("template", template))
    }

    fn component_type(&self) -> &str {
        PROMPT
    }

    fn base_type(&self) -> &str {
        "prompts"
    }

    fn metadata(&self) -> ComponentMetadata {
        ComponentMetadata {
            description: "Format a prompt template with variables".to_string(),
            category: "prompts".to_string(),
            inputs: vec![PortDefinition::new("template", "Text with {variable} placeholders", true)],
            outputs: vec![PortDefinition::new("prompt", "The formatted text", true)],
        }
    }
}
