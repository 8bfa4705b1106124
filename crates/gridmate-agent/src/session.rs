//! Session state machine: one chat pane's conversation engine.

use futures::StreamExt;
use gridmate_ai::{
    Content, Message, Model, StopReason, Usage, stream::MessageEvent,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    attachment::FileAttachment,
    events::{SessionEvent, ToolCall, ToolCallStatus},
    executor::{ToolCallRequest, ToolExecutor},
    handle::SessionHandle,
    tool::BoxedTool,
    transcript::{ChatMessage, Transcript},
    transport::{CompletionService, RequestConfig},
};

/// Fixed assistant message appended when the user stops a response.
pub const STOPPED_MESSAGE: &str = "Response stopped by user.";

/// Default system prompt describing assistant behavior and the
/// selection-context precedence rules.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful spreadsheet assistant. Provide professional, concise, and friendly responses. Keep answers brief and practical, broken into short paragraphs with bullet points where that helps.\n\nSPREADSHEET CONTEXT HANDLING:\n- When spreadsheet context is provided (cells are selected), ALWAYS prioritize making changes to those selected cells unless the user explicitly specifies a different range.\n- If the user says \"edit these cells\" or \"change these\", they are referring to the currently selected cells shown in the context.\n- If no cells are selected, do NOT assume which cells to modify - ask for clarification or use get_selection to determine the target range.\n- Use the find_replace tool for formatting changes like converting commas to periods in numbers.";

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// System prompt sent on every request
    pub system_prompt: String,
    /// Model to use
    pub model: Model,
    /// Maximum tokens per response
    pub max_tokens: Option<u32>,
    /// Extended-thinking token budget
    pub thinking_budget: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: gridmate_ai::models::default_model(),
            max_tokens: Some(4096),
            thinking_budget: Some(2000),
        }
    }
}

/// Summary of the user's current selection, merged into the outgoing
/// message so the model knows which cells the user is looking at.
#[derive(Debug, Clone)]
pub struct SelectionContext {
    pub address: String,
    pub sheet_name: String,
    pub row_count: u32,
    pub column_count: u32,
}

impl SelectionContext {
    pub fn summary(&self) -> String {
        format!(
            "[Spreadsheet context: currently viewing {} on sheet \"{}\" ({}x{} cells)]",
            self.address, self.sheet_name, self.row_count, self.column_count
        )
    }
}

/// How a turn ended, from the engine's point of view
enum TurnOutcome {
    Completed,
    Aborted,
    Failed(String),
}

/// The conversation engine for one open chat pane.
///
/// Owned by the UI layer and constructed per pane instance; the whole
/// conversation is memory-only for the lifetime of the session. Only one
/// top-level turn runs at a time; `send_message` while a turn is in flight
/// is dropped silently. The engine always returns to idle: completion
/// errors and aborts surface as ordinary assistant messages, never as
/// panics or errors the caller must handle.
pub struct ChatSession {
    config: SessionConfig,
    service: Arc<dyn CompletionService>,
    executor: ToolExecutor,
    transcript: Transcript,
    active_tool_calls: Vec<ToolCall>,
    total_usage: Usage,
    last_error: Option<String>,
    event_tx: broadcast::Sender<SessionEvent>,
    handle: SessionHandle,
}

impl ChatSession {
    /// Create a new session with the given tool set
    pub fn new(
        config: SessionConfig,
        service: Arc<dyn CompletionService>,
        tools: Vec<BoxedTool>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            service,
            executor: ToolExecutor::new(tools),
            transcript: Transcript::new(),
            active_tool_calls: Vec::new(),
            total_usage: Usage::default(),
            last_error: None,
            event_tx,
            handle: SessionHandle::new(),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// The visible transcript
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// All transcript messages
    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    /// Tool calls currently executing (empty outside dispatch windows)
    pub fn active_tool_calls(&self) -> &[ToolCall] {
        &self.active_tool_calls
    }

    /// Cumulative usage across all turns
    pub fn total_usage(&self) -> &Usage {
        &self.total_usage
    }

    /// The error that ended the last turn, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Get a cloneable handle for stopping generation from another task
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Whether a turn is currently in flight
    pub fn is_busy(&self) -> bool {
        self.handle.is_running()
    }

    /// Stop the in-flight response. No-op when idle.
    pub fn stop_generation(&self) {
        self.handle.abort();
    }

    /// Discard the conversation ("new chat")
    pub fn clear_messages(&mut self) {
        self.transcript.clear();
        self.active_tool_calls.clear();
        self.total_usage = Usage::default();
        self.last_error = None;
    }

    /// Submit a user message and run the turn to completion.
    ///
    /// Dropped silently when empty or while another turn is in flight.
    pub async fn send_message(
        &mut self,
        text: &str,
        selection: Option<&SelectionContext>,
        attachments: Vec<FileAttachment>,
    ) {
        let trimmed = text.trim();
        if trimmed.is_empty() && attachments.is_empty() {
            return;
        }
        if self.handle.is_running() {
            tracing::debug!("send_message dropped: a turn is already in flight");
            return;
        }

        let mut body = trimmed.to_string();
        if let Some(selection) = selection {
            if body.is_empty() {
                body = selection.summary();
            } else {
                body.push_str("\n\n");
                body.push_str(&selection.summary());
            }
        }

        let mut content = Vec::new();
        if !body.is_empty() {
            content.push(Content::text(body));
        }
        for attachment in &attachments {
            content.push(attachment.to_content());
        }

        let user_id = self.transcript.push(ChatMessage::user(content, attachments));
        self.run_turn(user_id).await;
    }

    /// Regenerate the response at `message_id`: truncate the transcript to
    /// just before it and resubmit the nearest preceding user message. The
    /// discarded suffix never reappears.
    pub async fn regenerate(&mut self, message_id: Uuid) {
        if self.handle.is_running() {
            return;
        }
        let Some(index) = self.transcript.position(message_id) else {
            return;
        };
        if index == 0 {
            return;
        }
        self.transcript.truncate(index);
        let Some(user_id) = self.transcript.last_user().map(|m| m.id) else {
            return;
        };
        self.run_turn(user_id).await;
    }

    fn request_config(&self) -> RequestConfig {
        RequestConfig {
            system_prompt: Some(self.config.system_prompt.clone()),
            tools: self.executor.api_tools(),
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            thinking_budget: self.config.thinking_budget,
            temperature: None,
        }
    }

    /// Drive one full turn: request, stream, dispatch tool batches, repeat
    /// until the service stops without requesting tools.
    async fn run_turn(&mut self, user_message_id: Uuid) {
        let cancel = self.handle.begin();
        self.last_error = None;
        let _ = self.event_tx.send(SessionEvent::TurnStart);

        let request = self.request_config();

        // The durable cross-turn history is the transcript; the tool
        // sub-turn messages below only live for this turn.
        let mut history = self.transcript.service_history();
        let assistant_id = Uuid::new_v4();
        let mut created = false;
        let mut sub_turns: u32 = 0;
        let mut turn_usage = Usage::default();

        let outcome = loop {
            if cancel.is_cancelled() {
                break TurnOutcome::Aborted;
            }
            sub_turns += 1;

            let mut stream = match self
                .service
                .stream(history.clone(), &request, cancel.clone())
                .await
            {
                Ok(stream) => stream,
                Err(gridmate_ai::Error::Aborted) => break TurnOutcome::Aborted,
                Err(e) => break TurnOutcome::Failed(e.to_string()),
            };

            let mut done: Option<(Message, StopReason, Usage)> = None;
            let mut stream_error: Option<String> = None;
            let mut aborted = false;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        aborted = true;
                        break;
                    }
                    event = stream.next() => {
                        let Some(event) = event else { break };
                        match event {
                            MessageEvent::TextDelta { delta, .. } => {
                                // The assistant message is created lazily on
                                // the first fragment; a tool-only turn never
                                // leaves an empty placeholder behind.
                                if !created {
                                    self.transcript.begin_assistant(assistant_id);
                                    created = true;
                                    let _ = self
                                        .event_tx
                                        .send(SessionEvent::MessageStart { id: assistant_id });
                                }
                                self.transcript.append_text(assistant_id, &delta);
                                let _ = self.event_tx.send(SessionEvent::MessageDelta {
                                    id: assistant_id,
                                    delta,
                                });
                            }
                            MessageEvent::Done { message, stop_reason, usage } => {
                                done = Some((message, stop_reason, usage));
                            }
                            MessageEvent::Error { message } => {
                                stream_error = Some(message);
                            }
                            _ => {}
                        }
                    }
                }
            }

            if aborted {
                break TurnOutcome::Aborted;
            }
            if let Some(message) = stream_error {
                break TurnOutcome::Failed(message);
            }
            let Some((message, stop_reason, usage)) = done else {
                break TurnOutcome::Failed("stream ended without a completion".to_string());
            };
            turn_usage.accumulate(&usage);

            let calls: Vec<ToolCallRequest> = message
                .tool_calls()
                .into_iter()
                .map(|(id, name, arguments)| ToolCallRequest {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: arguments.clone(),
                })
                .collect();

            if stop_reason != StopReason::ToolUse || calls.is_empty() {
                break TurnOutcome::Completed;
            }

            // Tool dispatch window: the whole batch runs concurrently and
            // clears together. There is no iteration cap on this loop.
            history.push(message);
            self.active_tool_calls = calls
                .iter()
                .map(|c| ToolCall {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    status: ToolCallStatus::Running,
                })
                .collect();
            let _ = self.event_tx.send(SessionEvent::ToolBatchStart {
                calls: self.active_tool_calls.clone(),
            });

            let completed = self.executor.execute_batch(&calls, cancel.clone()).await;

            self.active_tool_calls.clear();
            let _ = self.event_tx.send(SessionEvent::ToolBatchEnd {
                call_ids: completed.iter().map(|c| c.id.clone()).collect(),
            });

            for call in completed {
                history.push(Message::tool_result(
                    call.id,
                    call.name,
                    call.result.content,
                    call.result.is_error,
                ));
            }
        };

        if created {
            self.transcript.finish_streaming(assistant_id);
            let _ = self.event_tx.send(SessionEvent::MessageEnd { id: assistant_id });
        }
        self.total_usage.accumulate(&turn_usage);

        match outcome {
            TurnOutcome::Completed => {
                self.transcript.strip_attachments(user_message_id);
                let _ = self.event_tx.send(SessionEvent::TurnEnd {
                    sub_turns,
                    usage: turn_usage,
                });
            }
            TurnOutcome::Aborted => {
                self.transcript.push(ChatMessage::assistant_text(STOPPED_MESSAGE));
                let _ = self.event_tx.send(SessionEvent::Aborted);
            }
            TurnOutcome::Failed(message) => {
                tracing::warn!("turn failed: {}", message);
                self.transcript.push(ChatMessage::assistant_text(format!(
                    "I encountered an error: {}. Please try again.",
                    message
                )));
                self.last_error = Some(message.clone());
                let _ = self.event_tx.send(SessionEvent::Error { message });
            }
        }

        self.active_tool_calls.clear();
        self.handle.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{Tool, ToolResult};
    use crate::transcript::Role;
    use async_trait::async_trait;
    use gridmate_ai::stream::MessageEventStream;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_util::sync::CancellationToken;

    // ===== Scripted completion service =====

    struct ScriptedService {
        scripts: Mutex<VecDeque<Vec<MessageEvent>>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedService {
        fn new(scripts: Vec<Vec<MessageEvent>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(vec![]),
            })
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn stream(
            &self,
            messages: Vec<Message>,
            _config: &RequestConfig,
            _cancel: CancellationToken,
        ) -> gridmate_ai::Result<MessageEventStream> {
            self.requests.lock().push(messages);
            let events = self
                .scripts
                .lock()
                .pop_front()
                .unwrap_or_else(|| text_response(&["done"]));
            Ok(Box::pin(tokio_stream::iter(events)))
        }
    }

    /// Yields one delta, then hangs until cancelled.
    struct HangingService {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CompletionService for HangingService {
        async fn stream(
            &self,
            _messages: Vec<Message>,
            _config: &RequestConfig,
            _cancel: CancellationToken,
        ) -> gridmate_ai::Result<MessageEventStream> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let stream = async_stream::stream! {
                yield MessageEvent::TextStart { content_index: 0 };
                yield MessageEvent::TextDelta {
                    content_index: 0,
                    delta: "partial".to_string(),
                };
                futures::future::pending::<()>().await;
            };
            Ok(Box::pin(stream))
        }
    }

    struct FailingService;

    #[async_trait]
    impl CompletionService for FailingService {
        async fn stream(
            &self,
            _messages: Vec<Message>,
            _config: &RequestConfig,
            _cancel: CancellationToken,
        ) -> gridmate_ai::Result<MessageEventStream> {
            Err(gridmate_ai::Error::Auth("bad key".into()))
        }
    }

    // ===== Script helpers =====

    fn text_response(chunks: &[&str]) -> Vec<MessageEvent> {
        let full: String = chunks.concat();
        let mut events = vec![
            MessageEvent::Start {
                message: Message::assistant_empty(),
            },
            MessageEvent::TextStart { content_index: 0 },
        ];
        for chunk in chunks {
            events.push(MessageEvent::TextDelta {
                content_index: 0,
                delta: chunk.to_string(),
            });
        }
        events.push(MessageEvent::TextEnd {
            content_index: 0,
            text: full.clone(),
        });
        events.push(MessageEvent::Done {
            message: Message::Assistant {
                content: vec![Content::text(full)],
                metadata: Default::default(),
            },
            stop_reason: StopReason::Stop,
            usage: Usage {
                input: 5,
                output: 7,
                ..Default::default()
            },
        });
        events
    }

    fn tool_response(calls: &[(&str, &str)]) -> Vec<MessageEvent> {
        let content: Vec<Content> = calls
            .iter()
            .map(|(id, name)| Content::tool_call(*id, *name, serde_json::json!({})))
            .collect();
        vec![
            MessageEvent::Start {
                message: Message::assistant_empty(),
            },
            MessageEvent::Done {
                message: Message::Assistant {
                    content,
                    metadata: Default::default(),
                },
                stop_reason: StopReason::ToolUse,
                usage: Usage::default(),
            },
        ]
    }

    // ===== Recording tool =====

    struct RecordingTool {
        tool_name: String,
        calls: Arc<AtomicU32>,
    }

    impl RecordingTool {
        fn new(name: &str) -> (Arc<Self>, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Arc::new(Self {
                    tool_name: name.to_string(),
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            &self.tool_name
        }
        fn description(&self) -> &str {
            "A recording tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            _arguments: serde_json::Value,
            _cancel: CancellationToken,
        ) -> ToolResult {
            self.calls.fetch_add(1, Ordering::Relaxed);
            ToolResult::success(serde_json::json!({ "ok": true }))
        }
    }

    fn make_session(service: Arc<dyn CompletionService>, tools: Vec<BoxedTool>) -> ChatSession {
        ChatSession::new(SessionConfig::default(), service, tools)
    }

    // ===== Tests =====

    #[tokio::test]
    async fn test_simple_turn_appends_user_and_assistant() {
        let service = ScriptedService::new(vec![text_response(&["The ", "sum ", "is 6"])]);
        let mut session = make_session(service.clone(), vec![]);

        session.send_message("Sum A1:A3", None, vec![]).await;

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        // Fragments applied in arrival order, nothing dropped.
        assert_eq!(messages[1].text(), "The sum is 6");
        assert!(!messages[1].streaming);
        assert!(!session.is_busy());
        assert_eq!(session.total_usage().output, 7);
    }

    #[tokio::test]
    async fn test_empty_message_is_dropped() {
        let service = ScriptedService::new(vec![]);
        let mut session = make_session(service.clone(), vec![]);
        session.send_message("   ", None, vec![]).await;
        assert!(session.messages().is_empty());
        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_send_while_busy_is_dropped_silently() {
        let service = ScriptedService::new(vec![]);
        let mut session = make_session(service.clone(), vec![]);
        session.handle.begin();
        session.send_message("hello", None, vec![]).await;
        assert!(session.messages().is_empty());
        assert!(service.requests().is_empty());
        session.handle.finish();
    }

    #[tokio::test]
    async fn test_selection_context_merged_into_outgoing_text() {
        let service = ScriptedService::new(vec![text_response(&["ok"])]);
        let mut session = make_session(service.clone(), vec![]);

        let selection = SelectionContext {
            address: "B2:D10".to_string(),
            sheet_name: "Budget".to_string(),
            row_count: 9,
            column_count: 3,
        };
        session.send_message("sum these", Some(&selection), vec![]).await;

        let requests = service.requests();
        let first_user_text = requests[0][0].text();
        assert!(first_user_text.starts_with("sum these"));
        assert!(first_user_text.contains("B2:D10"));
        assert!(first_user_text.contains("\"Budget\""));
    }

    #[tokio::test]
    async fn test_tool_round_trip_across_two_sub_turns() {
        let service = ScriptedService::new(vec![
            tool_response(&[("call_read", "read_range")]),
            tool_response(&[("call_write", "write_range")]),
            text_response(&["All done."]),
        ]);
        let (read_tool, read_calls) = RecordingTool::new("read_range");
        let (write_tool, write_calls) = RecordingTool::new("write_range");
        let mut session = make_session(service.clone(), vec![read_tool, write_tool]);

        assert!(session.active_tool_calls().is_empty());
        session.send_message("fill the sheet", None, vec![]).await;

        // Three completion requests were issued.
        let requests = service.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(read_calls.load(Ordering::Relaxed), 1);
        assert_eq!(write_calls.load(Ordering::Relaxed), 1);

        // The second request carries the first tool result keyed to its id.
        let tool_results: Vec<_> = requests[1]
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult {
                    tool_call_id,
                    is_error,
                    ..
                } => Some((tool_call_id.clone(), *is_error)),
                _ => None,
            })
            .collect();
        assert_eq!(tool_results, vec![("call_read".to_string(), false)]);

        // No visible tool messages: just the user and final assistant text.
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "All done.");
        assert!(session.active_tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_of_tool_calls_all_reported_in_follow_up() {
        let service = ScriptedService::new(vec![
            tool_response(&[("c1", "read_range"), ("c2", "get_selection")]),
            text_response(&["done"]),
        ]);
        let (read_tool, _) = RecordingTool::new("read_range");
        let (select_tool, _) = RecordingTool::new("get_selection");
        let mut session = make_session(service.clone(), vec![read_tool, select_tool]);

        session.send_message("inspect", None, vec![]).await;

        let requests = service.requests();
        let ids: Vec<String> = requests[1]
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult { tool_call_id, .. } => Some(tool_call_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recoverable_in_loop() {
        let service = ScriptedService::new(vec![
            tool_response(&[("c1", "not_a_real_tool")]),
            text_response(&["Sorry, I cannot do that."]),
        ]);
        let mut session = make_session(service.clone(), vec![]);

        session.send_message("do the thing", None, vec![]).await;

        let requests = service.requests();
        assert_eq!(requests.len(), 2);
        let result_text: String = requests[1]
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult {
                    content, is_error, ..
                } => {
                    assert!(*is_error);
                    Some(
                        content
                            .iter()
                            .filter_map(|c| c.as_text())
                            .collect::<String>(),
                    )
                }
                _ => None,
            })
            .collect();
        assert!(result_text.contains("Unknown tool: not_a_real_tool"));

        // The turn still finished normally.
        assert_eq!(session.messages().last().unwrap().text(), "Sorry, I cannot do that.");
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_stop_generation_mid_stream() {
        let service = Arc::new(HangingService {
            calls: AtomicU32::new(0),
        });
        let mut session = make_session(service.clone(), vec![]);

        let handle = session.handle();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            handle.abort();
        });

        session.send_message("never finishes", None, vec![]).await;

        let messages = session.messages();
        // Exactly one stopped message, after the partial assistant text.
        let stopped: Vec<_> = messages
            .iter()
            .filter(|m| m.text() == STOPPED_MESSAGE)
            .collect();
        assert_eq!(stopped.len(), 1);
        assert!(messages.iter().all(|m| !m.streaming));
        assert_eq!(service.calls.load(Ordering::Relaxed), 1);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_stop_generation_while_idle_is_noop() {
        let service = ScriptedService::new(vec![text_response(&["hi"])]);
        let mut session = make_session(service.clone(), vec![]);

        session.stop_generation();
        assert!(session.messages().is_empty());

        // The session still works afterwards.
        session.send_message("hello", None, vec![]).await;
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_service_error_becomes_assistant_message() {
        let mut session = make_session(Arc::new(FailingService), vec![]);

        session.send_message("hello", None, vec![]).await;

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        let text = messages[1].text();
        assert!(text.starts_with("I encountered an error:"));
        assert!(text.contains("bad key"));
        assert!(session.last_error().is_some());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_attachments_stripped_after_successful_turn() {
        let service = ScriptedService::new(vec![text_response(&["I see a receipt."])]);
        let mut session = make_session(service.clone(), vec![]);

        let attachment = FileAttachment::image("aW1hZ2U=", "image/png");
        session
            .send_message("what is this?", None, vec![attachment])
            .await;

        // The outgoing request carried the image block...
        let requests = service.requests();
        let sent_blocks = requests[0][0].content();
        assert_eq!(sent_blocks.len(), 2);
        assert!(matches!(sent_blocks[1], Content::Image { .. }));

        // ...but the stored message is text-only afterwards.
        let user = &session.messages()[0];
        assert!(user.attachments.is_empty());
        assert_eq!(user.content.len(), 1);
        assert_eq!(user.text(), "what is this?");
    }

    #[tokio::test]
    async fn test_attachments_kept_on_error_path() {
        let mut session = make_session(Arc::new(FailingService), vec![]);
        let attachment = FileAttachment::image("aW1hZ2U=", "image/png");
        session.send_message("look", None, vec![attachment]).await;

        assert_eq!(session.messages()[0].attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_truncates_and_replays_last_user_message() {
        let service = ScriptedService::new(vec![
            text_response(&["first answer"]),
            text_response(&["second answer"]),
            text_response(&["regenerated answer"]),
        ]);
        let mut session = make_session(service.clone(), vec![]);

        session.send_message("question one", None, vec![]).await;
        session.send_message("question two", None, vec![]).await;
        assert_eq!(session.messages().len(), 4);

        let target = session.messages()[3].id;
        session.regenerate(target).await;

        let messages = session.messages();
        // Same length and prior content; the old suffix never reappears.
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].text(), "question two");
        assert_eq!(messages[3].text(), "regenerated answer");
        assert!(!messages.iter().any(|m| m.text() == "second answer"));

        // The replayed request ends with the original user message, not a
        // duplicate of it.
        let requests = service.requests();
        assert_eq!(requests[2].len(), 3);
        assert_eq!(requests[2][2].text(), "question two");
    }

    #[tokio::test]
    async fn test_regenerate_first_message_is_noop() {
        let service = ScriptedService::new(vec![text_response(&["answer"])]);
        let mut session = make_session(service.clone(), vec![]);
        session.send_message("question", None, vec![]).await;

        let first = session.messages()[0].id;
        session.regenerate(first).await;
        assert_eq!(session.messages().len(), 2);
        assert_eq!(service.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_messages_resets_state() {
        let service = ScriptedService::new(vec![text_response(&["hello"])]);
        let mut session = make_session(service.clone(), vec![]);
        session.send_message("hi", None, vec![]).await;
        assert!(!session.messages().is_empty());

        session.clear_messages();
        assert!(session.messages().is_empty());
        assert_eq!(session.total_usage().output, 0);
        assert!(session.last_error().is_none());
    }

    #[tokio::test]
    async fn test_tool_only_sub_turn_creates_no_placeholder_message() {
        let service = ScriptedService::new(vec![
            tool_response(&[("c1", "read_range")]),
            text_response(&["the value is 3"]),
        ]);
        let (tool, _) = RecordingTool::new("read_range");
        let mut session = make_session(service.clone(), vec![tool]);

        session.send_message("read A1", None, vec![]).await;

        // One user message and one assistant message; no empty assistant
        // message for the tool-only sub-turn.
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].text(), "the value is 3");
    }

    #[tokio::test]
    async fn test_events_emitted_for_simple_turn() {
        let service = ScriptedService::new(vec![text_response(&["a", "b"])]);
        let mut session = make_session(service.clone(), vec![]);
        let mut rx = session.subscribe();

        session.send_message("hi", None, vec![]).await;

        let mut kinds = vec![];
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                SessionEvent::TurnStart => "turn_start",
                SessionEvent::MessageStart { .. } => "message_start",
                SessionEvent::MessageDelta { .. } => "delta",
                SessionEvent::MessageEnd { .. } => "message_end",
                SessionEvent::TurnEnd { .. } => "turn_end",
                _ => "other",
            });
        }
        assert_eq!(
            kinds,
            vec!["turn_start", "message_start", "delta", "delta", "message_end", "turn_end"]
        );
    }
}
