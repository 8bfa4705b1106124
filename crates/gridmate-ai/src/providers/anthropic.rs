//! Anthropic Messages API provider

use crate::{
    error::{Error, Result},
    stream::{MessageEvent, MessageEventStream},
    types::{Content, Context, Message, Model, StopReason, StreamOptions, Tool, Usage},
};
use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

/// Anthropic API client
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Stream a response from the Messages API
    pub async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<MessageEventStream> {
        let request = build_request(model, context, options);
        let url = format!("{}/v1/messages", model.base_url);

        tracing::debug!("Anthropic API URL: {}", url);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            self.api_key
                .parse()
                .map_err(|_| Error::Auth("API key contains invalid characters".into()))?,
        );
        headers.insert("accept", "application/json".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("anthropic-version", "2023-06-01".parse().unwrap());

        // Model-specific extra headers
        for (key, value) in &model.headers {
            if let (Ok(name), Ok(val)) = (
                key.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                headers.insert(name, val);
            }
        }

        let request_builder = self.client.post(&url).headers(headers).json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(translate_sse(event_source, model.clone())))
    }
}

fn build_request(model: &Model, context: &Context, options: &StreamOptions) -> WireRequest {
    let system = context.system_prompt.as_ref().map(|prompt| {
        vec![SystemBlock {
            block_type: "text".to_string(),
            text: prompt.clone(),
            cache_control: Some(CacheControl {
                control_type: "ephemeral".to_string(),
            }),
        }]
    });

    let tools = if context.tools.is_empty() {
        None
    } else {
        Some(convert_tools(&context.tools))
    };

    // Thinking requires a model that supports it
    let thinking = options
        .thinking_budget
        .filter(|_| model.reasoning)
        .map(|budget_tokens| ThinkingConfig {
            thinking_type: "enabled".to_string(),
            budget_tokens,
        });

    WireRequest {
        model: model.id.clone(),
        messages: convert_messages(&context.messages),
        max_tokens: options.max_tokens.unwrap_or(model.max_tokens / 3),
        stream: true,
        system,
        temperature: options.temperature,
        tools,
        thinking,
    }
}

/// Translate the SSE event stream into message events
fn translate_sse(
    mut event_source: EventSource,
    model: Model,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        let mut usage = Usage::default();
        let mut stop_reason = StopReason::Stop;
        let mut blocks: Vec<BlockBuffer> = vec![];
        let mut error_message: Option<String> = None;

        yield MessageEvent::Start {
            message: Message::assistant_empty(),
        };

        while let Some(event_result) = event_source.next().await {
            let message = match event_result {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(e) => {
                    error_message = Some(e.to_string());
                    stop_reason = StopReason::Error;
                    break;
                }
            };

            match message.event.as_str() {
                "message_start" => {
                    if let Ok(data) = serde_json::from_str::<MessageStartEvent>(&message.data) {
                        usage = data.message.usage.into();
                    }
                }
                "content_block_start" => {
                    let Ok(data) = serde_json::from_str::<BlockStartEvent>(&message.data) else {
                        continue;
                    };
                    let index = data.index as usize;
                    while blocks.len() <= index {
                        blocks.push(BlockBuffer::Empty);
                    }
                    match data.content_block.block_type.as_str() {
                        "text" => {
                            blocks[index] = BlockBuffer::Text(String::new());
                            yield MessageEvent::TextStart { content_index: index };
                        }
                        "thinking" => {
                            blocks[index] = BlockBuffer::Thinking(String::new());
                            yield MessageEvent::ThinkingStart { content_index: index };
                        }
                        "tool_use" => {
                            let id = data.content_block.id.unwrap_or_default();
                            let name = data.content_block.name.unwrap_or_default();
                            blocks[index] = BlockBuffer::ToolCall {
                                id: id.clone(),
                                name: name.clone(),
                                arguments_json: String::new(),
                            };
                            yield MessageEvent::ToolCallStart {
                                content_index: index,
                                id,
                                name,
                            };
                        }
                        _ => {}
                    }
                }
                "content_block_delta" => {
                    let Ok(data) = serde_json::from_str::<BlockDeltaEvent>(&message.data) else {
                        continue;
                    };
                    let index = data.index as usize;
                    let Some(block) = blocks.get_mut(index) else {
                        continue;
                    };
                    match (data.delta.delta_type.as_str(), block) {
                        ("text_delta", BlockBuffer::Text(text)) => {
                            let delta = data.delta.text.unwrap_or_default();
                            text.push_str(&delta);
                            yield MessageEvent::TextDelta { content_index: index, delta };
                        }
                        ("thinking_delta", BlockBuffer::Thinking(thinking)) => {
                            let delta = data.delta.thinking.unwrap_or_default();
                            thinking.push_str(&delta);
                            yield MessageEvent::ThinkingDelta { content_index: index, delta };
                        }
                        ("input_json_delta", BlockBuffer::ToolCall { arguments_json, .. }) => {
                            let delta = data.delta.partial_json.unwrap_or_default();
                            arguments_json.push_str(&delta);
                            yield MessageEvent::ToolCallDelta { content_index: index, delta };
                        }
                        _ => {}
                    }
                }
                "content_block_stop" => {
                    let Ok(data) = serde_json::from_str::<BlockStopEvent>(&message.data) else {
                        continue;
                    };
                    let index = data.index as usize;
                    match blocks.get(index) {
                        Some(BlockBuffer::Text(text)) => {
                            yield MessageEvent::TextEnd {
                                content_index: index,
                                text: text.clone(),
                            };
                        }
                        Some(BlockBuffer::Thinking(thinking)) => {
                            yield MessageEvent::ThinkingEnd {
                                content_index: index,
                                thinking: thinking.clone(),
                            };
                        }
                        Some(BlockBuffer::ToolCall { id, name, arguments_json }) => {
                            let arguments = serde_json::from_str(arguments_json)
                                .unwrap_or(serde_json::Value::Null);
                            yield MessageEvent::ToolCallEnd {
                                content_index: index,
                                id: id.clone(),
                                name: name.clone(),
                                arguments,
                            };
                        }
                        _ => {}
                    }
                }
                "message_delta" => {
                    if let Ok(data) = serde_json::from_str::<MessageDeltaEvent>(&message.data) {
                        if let Some(reason) = data.delta.stop_reason {
                            stop_reason = map_stop_reason(&reason);
                        }
                        usage = data.usage.into();
                    }
                }
                "message_stop" => break,
                "error" => {
                    if let Ok(data) = serde_json::from_str::<ErrorEvent>(&message.data) {
                        error_message = Some(data.error.message);
                        stop_reason = StopReason::Error;
                    }
                    break;
                }
                _ => {}
            }
        }

        if let Some(error_msg) = error_message {
            yield MessageEvent::Error { message: error_msg };
            return;
        }

        let content: Vec<Content> = blocks
            .into_iter()
            .filter_map(|block| match block {
                BlockBuffer::Text(text) => Some(Content::Text { text }),
                BlockBuffer::Thinking(thinking) => Some(Content::Thinking { thinking }),
                BlockBuffer::ToolCall { id, name, arguments_json } => {
                    let arguments =
                        serde_json::from_str(&arguments_json).unwrap_or(serde_json::Value::Null);
                    Some(Content::ToolCall { id, name, arguments })
                }
                BlockBuffer::Empty => None,
            })
            .collect();

        let final_message = Message::Assistant {
            content,
            metadata: crate::types::AssistantMetadata {
                model: Some(model.id.clone()),
                usage: usage.clone(),
                stop_reason: Some(stop_reason),
                error_message: None,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        };

        yield MessageEvent::Done {
            message: final_message,
            stop_reason,
            usage,
        };
    }
}

// ============================================================================
// Internal block tracking
// ============================================================================

#[derive(Debug)]
enum BlockBuffer {
    Empty,
    Text(String),
    Thinking(String),
    ToolCall {
        id: String,
        name: String,
        arguments_json: String,
    },
}

// ============================================================================
// Request wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<SystemBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: String,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    thinking_type: String,
    budget_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Response wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessageStartEvent {
    message: MessageInfo,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
    cache_read_input_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
    #[serde(default)]
    thinking_output_tokens: Option<u32>,
}

impl From<WireUsage> for Usage {
    fn from(w: WireUsage) -> Self {
        Usage {
            input: w.input_tokens,
            output: w.output_tokens,
            cache_read: w.cache_read_input_tokens.unwrap_or(0),
            cache_write: w.cache_creation_input_tokens.unwrap_or(0),
            thinking: w.thinking_output_tokens.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlockStartEvent {
    index: u32,
    content_block: BlockInfo,
}

#[derive(Debug, Deserialize)]
struct BlockInfo {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockDeltaEvent {
    index: u32,
    delta: DeltaInfo,
}

#[derive(Debug, Deserialize)]
struct DeltaInfo {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
    thinking: Option<String>,
    partial_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockStopEvent {
    index: u32,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaEvent {
    delta: MessageDelta,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    error: ApiErrorInfo,
}

#[derive(Debug, Deserialize)]
struct ApiErrorInfo {
    message: String,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn user_block(content: &Content) -> serde_json::Value {
    match content {
        Content::Text { text } => serde_json::json!({ "type": "text", "text": text }),
        Content::Image { data, mime_type } => serde_json::json!({
            "type": "image",
            "source": { "type": "base64", "media_type": mime_type, "data": data }
        }),
        Content::Document { data, mime_type } => serde_json::json!({
            "type": "document",
            "source": { "type": "base64", "media_type": mime_type, "data": data }
        }),
        _ => serde_json::json!({ "type": "text", "text": "" }),
    }
}

/// Convert internal messages to the wire format.
///
/// Consecutive tool results collapse into a single user message so the whole
/// batch for one model turn travels as one turn, keyed by tool_use_id.
fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
    let mut result: Vec<WireMessage> = vec![];
    let mut pending_tool_results: Vec<serde_json::Value> = vec![];

    let flush_tool_results =
        |pending: &mut Vec<serde_json::Value>, result: &mut Vec<WireMessage>| {
            if !pending.is_empty() {
                result.push(WireMessage {
                    role: "user".to_string(),
                    content: serde_json::Value::Array(std::mem::take(pending)),
                });
            }
        };

    for message in messages {
        match message {
            Message::User { content, .. } => {
                flush_tool_results(&mut pending_tool_results, &mut result);
                let blocks: Vec<serde_json::Value> = content.iter().map(user_block).collect();
                result.push(WireMessage {
                    role: "user".to_string(),
                    content: serde_json::Value::Array(blocks),
                });
            }
            Message::Assistant { content, .. } => {
                flush_tool_results(&mut pending_tool_results, &mut result);
                let blocks: Vec<serde_json::Value> = content
                    .iter()
                    .filter_map(|c| match c {
                        Content::Text { text } => {
                            Some(serde_json::json!({ "type": "text", "text": text }))
                        }
                        Content::ToolCall {
                            id,
                            name,
                            arguments,
                        } => Some(serde_json::json!({
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": arguments
                        })),
                        // Thinking is not replayed; images/documents never
                        // appear on assistant turns.
                        _ => None,
                    })
                    .collect();

                if !blocks.is_empty() {
                    result.push(WireMessage {
                        role: "assistant".to_string(),
                        content: serde_json::Value::Array(blocks),
                    });
                }
            }
            Message::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                let text_content: String = content
                    .iter()
                    .filter_map(|c| c.as_text())
                    .collect::<Vec<_>>()
                    .join("\n");

                pending_tool_results.push(serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": text_content,
                    "is_error": is_error
                }));
            }
        }
    }

    flush_tool_results(&mut pending_tool_results, &mut result);
    result
}

fn convert_tools(tools: &[Tool]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| {
            let input_schema = if tool.parameters.is_object() {
                let mut schema = tool.parameters.clone();
                if let Some(obj) = schema.as_object_mut() {
                    obj.entry("type").or_insert(serde_json::json!("object"));
                }
                schema
            } else {
                serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                })
            };

            WireTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema,
            }
        })
        .collect()
}

fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "end_turn" => StopReason::Stop,
        "max_tokens" => StopReason::Length,
        "tool_use" => StopReason::ToolUse,
        "stop_sequence" => StopReason::Stop,
        _ => StopReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_stop_reasons() {
        assert_eq!(map_stop_reason("end_turn"), StopReason::Stop);
        assert_eq!(map_stop_reason("tool_use"), StopReason::ToolUse);
        assert_eq!(map_stop_reason("max_tokens"), StopReason::Length);
        assert_eq!(map_stop_reason("something_else"), StopReason::Stop);
    }

    #[test]
    fn test_consecutive_tool_results_merge_into_one_user_turn() {
        let messages = vec![
            Message::user("sum these"),
            Message::Assistant {
                content: vec![
                    Content::tool_call("call_1", "read_range", serde_json::json!({})),
                    Content::tool_call("call_2", "get_selection", serde_json::json!({})),
                ],
                metadata: Default::default(),
            },
            Message::tool_result("call_1", "read_range", vec![Content::text("{}")], false),
            Message::tool_result("call_2", "get_selection", vec![Content::text("{}")], false),
        ];

        let wire = convert_messages(&messages);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[2].role, "user");
        let blocks = wire[2].content.as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["type"], "tool_result");
        assert_eq!(blocks[0]["tool_use_id"], "call_1");
        assert_eq!(blocks[1]["tool_use_id"], "call_2");
    }

    #[test]
    fn test_user_attachment_blocks_serialize_as_sources() {
        let messages = vec![Message::user_with_content(vec![
            Content::text("what is in this file?"),
            Content::image("aW1n", "image/png"),
            Content::document("cGRm", "application/pdf"),
        ])];

        let wire = convert_messages(&messages);
        let blocks = wire[0].content.as_array().unwrap();
        assert_eq!(blocks[1]["type"], "image");
        assert_eq!(blocks[1]["source"]["media_type"], "image/png");
        assert_eq!(blocks[2]["type"], "document");
        assert_eq!(blocks[2]["source"]["data"], "cGRm");
    }

    #[test]
    fn test_assistant_tool_use_blocks_round_trip() {
        let messages = vec![Message::Assistant {
            content: vec![
                Content::text("checking"),
                Content::tool_call("c1", "write_range", serde_json::json!({"range": "A1"})),
            ],
            metadata: Default::default(),
        }];

        let wire = convert_messages(&messages);
        let blocks = wire[0].content.as_array().unwrap();
        assert_eq!(blocks[1]["type"], "tool_use");
        assert_eq!(blocks[1]["name"], "write_range");
        assert_eq!(blocks[1]["input"]["range"], "A1");
    }

    #[test]
    fn test_convert_tools_defaults_missing_type() {
        let tools = vec![Tool::new(
            "read_range",
            "Read cells",
            serde_json::json!({"properties": {"range": {"type": "string"}}}),
        )];
        let wire = convert_tools(&tools);
        assert_eq!(wire[0].input_schema["type"], "object");
    }

    #[test]
    fn test_thinking_requires_model_support() {
        let mut model = crate::models::default_model();
        model.reasoning = false;
        let context = Context::default();
        let options = StreamOptions {
            thinking_budget: Some(2000),
            ..Default::default()
        };
        let request = build_request(&model, &context, &options);
        assert!(request.thinking.is_none());

        model.reasoning = true;
        let request = build_request(&model, &context, &options);
        assert_eq!(request.thinking.unwrap().budget_tokens, 2000);
    }
}
