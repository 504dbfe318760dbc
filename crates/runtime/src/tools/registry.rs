//! Translation of discovered tools into the model's function-tool format.

use crate::model::{FunctionSchema, ToolKind, ToolSchema};
use mcp::Tool;

/// Describe one tool to the model. The input schema is passed through as-is.
pub fn tool_schema(tool: &Tool) -> ToolSchema {
    ToolSchema {
        kind: ToolKind::Function,
        function: FunctionSchema {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        },
    }
}

/// Describe every tool, in discovery order.
///
/// Returns `None` for an empty list so the request carries no tools field.
pub fn tool_schemas(tools: &[Tool]) -> Option<Vec<ToolSchema>> {
    if tools.is_empty() {
        return None;
    }
    Some(tools.iter().map(tool_schema).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, description: Option<&str>) -> Tool {
        Tool {
            name: name.into(),
            description: description.map(Into::into),
            input_schema: json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        }
    }

    #[test]
    fn empty_tool_list_means_no_tools() {
        assert_eq!(tool_schemas(&[]), None);
    }

    #[test]
    fn schemas_keep_order_and_content() {
        let tools = vec![
            tool("get_weather", Some("Current weather")),
            tool("get_forecast", None),
            tool("add", Some("Add numbers")),
        ];
        let schemas = tool_schemas(&tools).unwrap();

        assert_eq!(schemas.len(), tools.len());
        for (schema, tool) in schemas.iter().zip(&tools) {
            assert_eq!(schema.kind, ToolKind::Function);
            assert_eq!(schema.function.name, tool.name);
            assert_eq!(schema.function.description, tool.description);
            assert_eq!(schema.function.parameters, tool.input_schema);
        }
    }

    #[test]
    fn missing_description_is_not_serialized() {
        let schema = tool_schema(&tool("get_forecast", None));
        let wire = serde_json::to_value(&schema).unwrap();
        assert!(wire["function"].get("description").is_none());
        assert_eq!(wire["function"]["parameters"]["required"], json!(["city"]));
    }
}
