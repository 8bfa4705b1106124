//! Tool registry and dispatch

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::tool::{BoxedTool, ToolResult, to_api_tool};

/// A tool invocation requested by the model
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Service-assigned call id
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A finished invocation, keyed back to its request
#[derive(Debug, Clone)]
pub struct CompletedToolCall {
    pub id: String,
    pub name: String,
    pub result: ToolResult,
}

/// Dispatches named tool calls to their handlers.
///
/// Dispatch is a registry lookup; arguments are validated against the tool's
/// JSON schema before the handler runs. Every failure (unknown tool, invalid
/// arguments, backend error inside the handler) comes back as a
/// `success:false` result, never as an error the caller must handle.
pub struct ToolExecutor {
    tools: HashMap<String, BoxedTool>,
    validators: HashMap<String, Arc<jsonschema::Validator>>,
    /// Registration order, for a stable catalogue in outgoing requests
    order: Vec<String>,
}

impl ToolExecutor {
    pub fn new(tools: Vec<BoxedTool>) -> Self {
        let mut executor = Self {
            tools: HashMap::new(),
            validators: HashMap::new(),
            order: Vec::new(),
        };
        for tool in tools {
            executor.register(tool);
        }
        executor
    }

    /// Register a tool, compiling its schema validator.
    ///
    /// A schema that fails to compile is a startup-time defect; the tool is
    /// still registered but its arguments pass through unvalidated.
    pub fn register(&mut self, tool: BoxedTool) {
        let name = tool.name().to_string();
        match jsonschema::validator_for(&tool.parameters_schema()) {
            Ok(validator) => {
                self.validators.insert(name.clone(), Arc::new(validator));
            }
            Err(e) => {
                tracing::warn!(
                    "Invalid parameter schema for tool '{}', skipping validation: {}",
                    name,
                    e
                );
            }
        }
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// The tool catalogue as API definitions, in registration order.
    pub fn api_tools(&self) -> Vec<gridmate_ai::Tool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| to_api_tool(tool.as_ref()))
            .collect()
    }

    /// Registered tool names, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one tool call.
    pub async fn execute(&self, call: &ToolCallRequest, cancel: CancellationToken) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::failure(format!("Unknown tool: {}", call.name));
        };

        if let Some(validator) = self.validators.get(&call.name) {
            if let Some(error) = validation_error(&call.arguments, validator) {
                return ToolResult::failure(format!(
                    "Invalid arguments for {}: {}",
                    call.name, error
                ));
            }
        }

        tool.execute(&call.id, call.arguments.clone(), cancel).await
    }

    /// Execute a whole batch concurrently (fan-out/fan-in).
    ///
    /// Results are collected keyed by call id and recombined in request
    /// order, so completion order has no observable effect.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCallRequest],
        cancel: CancellationToken,
    ) -> Vec<CompletedToolCall> {
        let futures = calls.iter().map(|call| {
            let cancel = cancel.clone();
            async move { (call.id.clone(), self.execute(call, cancel).await) }
        });

        let mut by_id: HashMap<String, ToolResult> =
            futures::future::join_all(futures).await.into_iter().collect();

        calls
            .iter()
            .map(|call| CompletedToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                result: by_id.remove(&call.id).unwrap_or_else(|| {
                    ToolResult::failure(format!("No result produced for call {}", call.id))
                }),
            })
            .collect()
    }
}

/// Validate arguments against a compiled schema.
/// Returns `Some(error_message)` if validation fails, `None` if valid.
fn validation_error(args: &serde_json::Value, validator: &jsonschema::Validator) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubTool {
        tool_name: String,
        reply: serde_json::Value,
        delay: Option<Duration>,
        required: Vec<&'static str>,
    }

    impl StubTool {
        fn new(name: &str, reply: serde_json::Value) -> Self {
            Self {
                tool_name: name.to_string(),
                reply,
                delay: None,
                required: vec![],
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn with_required(mut self, fields: Vec<&'static str>) -> Self {
            self.required = fields;
            self
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.tool_name
        }
        fn description(&self) -> &str {
            "A stub tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "range": { "type": "string" }
                },
                "required": self.required.clone(),
            })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            _arguments: serde_json::Value,
            _cancel: CancellationToken,
        ) -> ToolResult {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            ToolResult::success(self.reply.clone())
        }
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_error_shape() {
        let executor = ToolExecutor::new(vec![]);
        let result = executor
            .execute(
                &call("c1", "not_a_real_tool", serde_json::json!({})),
                CancellationToken::new(),
            )
            .await;
        assert!(result.is_error);
        let envelope: serde_json::Value = serde_json::from_str(&result.text_content()).unwrap();
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"], "Unknown tool: not_a_real_tool");
    }

    #[tokio::test]
    async fn test_schema_validation_rejects_before_execution() {
        let tool = StubTool::new("read_range", serde_json::json!({}))
            .with_required(vec!["range"]);
        let executor = ToolExecutor::new(vec![Arc::new(tool)]);

        let result = executor
            .execute(
                &call("c1", "read_range", serde_json::json!({ "other": 1 })),
                CancellationToken::new(),
            )
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Invalid arguments for read_range"));
    }

    #[tokio::test]
    async fn test_batch_results_keyed_by_id_regardless_of_completion_order() {
        let slow = StubTool::new("slow", serde_json::json!({ "who": "slow" }))
            .with_delay(Duration::from_millis(40));
        let fast = StubTool::new("fast", serde_json::json!({ "who": "fast" }));
        let executor = ToolExecutor::new(vec![Arc::new(slow), Arc::new(fast)]);

        let calls = vec![
            call("call_slow", "slow", serde_json::json!({})),
            call("call_fast", "fast", serde_json::json!({})),
        ];
        let completed = executor
            .execute_batch(&calls, CancellationToken::new())
            .await;

        // Recombined in request order even though "fast" finished first.
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].id, "call_slow");
        assert_eq!(completed[0].result.details.as_ref().unwrap()["who"], "slow");
        assert_eq!(completed[1].id, "call_fast");
        assert_eq!(completed[1].result.details.as_ref().unwrap()["who"], "fast");
    }

    #[tokio::test]
    async fn test_api_tools_keep_registration_order() {
        let executor = ToolExecutor::new(vec![
            Arc::new(StubTool::new("b_tool", serde_json::json!({}))),
            Arc::new(StubTool::new("a_tool", serde_json::json!({}))),
        ]);
        let names: Vec<String> = executor.api_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b_tool", "a_tool"]);
    }
}
