//! Completion-service abstraction

use async_trait::async_trait;
use gridmate_ai::{
    Context, Message, Model, Result, StreamOptions,
    providers::anthropic::AnthropicProvider, stream::MessageEventStream,
};
use tokio_util::sync::CancellationToken;

/// Configuration for one streaming completion request
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// System prompt describing assistant behavior
    pub system_prompt: Option<String>,
    /// Tool catalogue, passed unmodified on every request
    pub tools: Vec<gridmate_ai::Tool>,
    /// Model to use
    pub model: Model,
    /// Maximum tokens per response
    pub max_tokens: Option<u32>,
    /// Extended-thinking token budget
    pub thinking_budget: Option<u32>,
    /// Temperature
    pub temperature: Option<f32>,
}

/// The completion service consumed by the session.
///
/// One call covers one model turn: the full message history goes up, a
/// stream of incremental events comes back, terminated by a stop reason.
/// Failures surface as a single error; there is no retry layer.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn stream(
        &self,
        messages: Vec<Message>,
        config: &RequestConfig,
        cancel: CancellationToken,
    ) -> Result<MessageEventStream>;
}

/// Completion service backed by the Anthropic Messages API
pub struct AnthropicService {
    provider: AnthropicProvider,
}

impl AnthropicService {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            provider: AnthropicProvider::new(api_key),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            provider: AnthropicProvider::from_env()?,
        })
    }
}

#[async_trait]
impl CompletionService for AnthropicService {
    async fn stream(
        &self,
        messages: Vec<Message>,
        config: &RequestConfig,
        cancel: CancellationToken,
    ) -> Result<MessageEventStream> {
        if cancel.is_cancelled() {
            return Err(gridmate_ai::Error::Aborted);
        }

        let context = Context {
            system_prompt: config.system_prompt.clone(),
            messages,
            tools: config.tools.clone(),
        };
        let options = StreamOptions {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            thinking_budget: config.thinking_budget,
        };

        self.provider.stream(&config.model, &context, &options).await
    }
}
