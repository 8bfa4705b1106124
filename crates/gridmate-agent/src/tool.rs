//! Tool trait and result types

use async_trait::async_trait;
use gridmate_ai::Content;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of a tool execution.
///
/// The text content carries the normalized envelope the model sees:
/// `{"success":true,"data":…}` or `{"success":false,"error":…}`. Nothing a
/// tool does raises past this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content returned to the model
    pub content: Vec<Content>,
    /// Whether the execution resulted in an error
    pub is_error: bool,
    /// Structured payload (for UI rendering), present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolResult {
    /// Create a successful result carrying a tool-specific payload
    pub fn success(data: serde_json::Value) -> Self {
        let envelope = serde_json::json!({ "success": true, "data": data.clone() });
        Self {
            content: vec![Content::text(envelope.to_string())],
            is_error: false,
            details: Some(data),
        }
    }

    /// Create a failed result with a human-readable message
    pub fn failure(message: impl Into<String>) -> Self {
        let envelope = serde_json::json!({ "success": false, "error": message.into() });
        Self {
            content: vec![Content::text(envelope.to_string())],
            is_error: true,
            details: None,
        }
    }

    /// Get the text content as a single string
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Trait for executable tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in API calls)
    fn name(&self) -> &str;

    /// Human-readable label for UI
    fn label(&self) -> &str {
        self.name()
    }

    /// Tool description for the model
    fn description(&self) -> &str;

    /// JSON Schema for parameters
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments
    async fn execute(
        &self,
        tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult;
}

/// Type alias for a shared tool
pub type BoxedTool = Arc<dyn Tool>;

/// Convert a Tool to a gridmate_ai::Tool for API calls
pub fn to_api_tool(tool: &dyn Tool) -> gridmate_ai::Tool {
    gridmate_ai::Tool {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                }
            })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            arguments: serde_json::Value,
            _cancel: CancellationToken,
        ) -> ToolResult {
            ToolResult::success(serde_json::json!({ "echo": arguments["text"] }))
        }
    }

    #[test]
    fn test_success_envelope_shape() {
        let r = ToolResult::success(serde_json::json!({ "rowsWritten": 3 }));
        assert!(!r.is_error);
        let envelope: serde_json::Value = serde_json::from_str(&r.text_content()).unwrap();
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["data"]["rowsWritten"], 3);
    }

    #[test]
    fn test_failure_envelope_shape() {
        let r = ToolResult::failure("No numeric values found in range");
        assert!(r.is_error);
        let envelope: serde_json::Value = serde_json::from_str(&r.text_content()).unwrap();
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"], "No numeric values found in range");
        assert!(r.details.is_none());
    }

    #[tokio::test]
    async fn test_execute_returns_envelope() {
        let tool = EchoTool;
        let result = tool
            .execute(
                "call_1",
                serde_json::json!({ "text": "hello" }),
                CancellationToken::new(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(result.details.unwrap()["echo"], "hello");
    }

    #[test]
    fn test_to_api_tool() {
        let api_tool = to_api_tool(&EchoTool);
        assert_eq!(api_tool.name, "echo");
        assert_eq!(api_tool.description, "Echoes input");
        assert_eq!(api_tool.parameters["type"], "object");
    }
}
