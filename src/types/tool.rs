//! User-defined tool (function calling) definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tool identifiers implemented by the system itself. User-defined tools may
/// not register these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTool {
    /// Continues a dialogue by recursively invoking another profile.
    DialogueRecursion,
    /// Generates an image from the conversation.
    ImageGeneration,
}

impl SystemTool {
    pub const ALL: [SystemTool; 2] = [SystemTool::DialogueRecursion, SystemTool::ImageGeneration];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DialogueRecursion => "recurse_ai_dialogue",
            Self::ImageGeneration => "image_gen",
        }
    }
}

/// A user-defined tool: a callable function definition plus the webhook the
/// system invokes when the model selects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_base64_key: Option<String>,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolFunction {
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: ToolParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolParameters {
    /// JSON-schema container type; always "object" for function parameters.
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    pub properties: HashMap<String, Property>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            required: None,
            properties: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Property {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Tool {
    /// The tool's function name, blank-normalized for lookups.
    pub fn name(&self) -> Option<&str> {
        self.function
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        let names: Vec<&str> = SystemTool::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["recurse_ai_dialogue", "image_gen"]);
    }

    #[test]
    fn test_parameters_default_to_object_schema() {
        let tool: Tool = serde_json::from_str(
            r#"{"function": {"name": "lookup", "parameters": {"properties": {"city": {"type": "string"}}}}}"#,
        )
        .unwrap();
        assert_eq!(tool.function.parameters.schema_type, "object");
        assert_eq!(tool.name(), Some("lookup"));
        assert!(tool.function.parameters.properties.contains_key("city"));
    }

    #[test]
    fn test_blank_name_is_absent() {
        let tool = Tool {
            function: ToolFunction {
                name: Some("   ".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(tool.name(), None);
    }
}
