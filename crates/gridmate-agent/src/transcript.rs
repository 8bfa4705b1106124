//! The in-memory transcript: the ordered message log visible to the UI.

use gridmate_ai::{Content, Message};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::FileAttachment;

/// Message roles visible in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in the visible conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    /// Ordered content blocks, preserving the order they were produced
    pub content: Vec<Content>,
    /// Present only transiently on user messages; cleared once the reply
    /// for this turn completes successfully
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
    /// True while content is still arriving from the completion service
    #[serde(default)]
    pub streaming: bool,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn user(content: Vec<Content>, attachments: Vec<FileAttachment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content,
            attachments,
            streaming: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: vec![Content::text(text)],
            attachments: vec![],
            streaming: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn assistant_streaming(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: vec![],
            attachments: vec![],
            streaming: true,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Combined text content
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Ordered, in-memory log of messages. Mutated only by the session.
///
/// Invariant: at most one message is streaming at a time, and it is always
/// the most recently appended assistant message.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn get(&self, id: Uuid) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// The currently streaming message, if any
    pub fn streaming_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.streaming)
    }

    /// The most recent user message
    pub fn last_user(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Append a finished message
    pub fn push(&mut self, message: ChatMessage) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Append a new streaming assistant message. A stale streaming flag is
    /// flipped off first so the single-streaming invariant holds.
    pub fn begin_assistant(&mut self, id: Uuid) {
        for m in &mut self.messages {
            m.streaming = false;
        }
        self.messages.push(ChatMessage::assistant_streaming(id));
    }

    /// Append a text fragment to the streaming message with the given id.
    /// Fragments are applied in arrival order.
    pub fn append_text(&mut self, id: Uuid, delta: &str) {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id && m.streaming) else {
            return;
        };
        if let Some(Content::Text { text }) = message.content.last_mut() {
            text.push_str(delta);
        } else {
            message.content.push(Content::text(delta));
        }
    }

    /// Flip the streaming flag off
    pub fn finish_streaming(&mut self, id: Uuid) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            message.streaming = false;
        }
    }

    /// Drop a user message's attachments, collapsing its content to text
    /// only. Called after the model's reply for that turn completed.
    pub fn strip_attachments(&mut self, id: Uuid) {
        let Some(message) = self.messages.iter_mut().find(|m| m.id == id) else {
            return;
        };
        if message.attachments.is_empty() {
            return;
        }
        let text = message
            .content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n");
        message.content = if text.is_empty() {
            vec![]
        } else {
            vec![Content::text(text)]
        };
        message.attachments.clear();
    }

    /// Truncate the transcript to the given length
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Render the transcript as completion-service messages.
    ///
    /// Tool sub-turn messages are not part of the transcript; the durable
    /// cross-turn history is exactly what the user sees.
    pub fn service_history(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| match m.role {
                Role::User => Message::User {
                    content: m.content.clone(),
                    timestamp: m.timestamp,
                },
                Role::Assistant => Message::Assistant {
                    content: m.content.clone(),
                    metadata: Default::default(),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_text_concatenates_in_arrival_order() {
        let mut transcript = Transcript::new();
        let id = Uuid::new_v4();
        transcript.begin_assistant(id);
        for delta in ["The", " total", " is", " 42."] {
            transcript.append_text(id, delta);
        }
        assert_eq!(transcript.get(id).unwrap().text(), "The total is 42.");
    }

    #[test]
    fn test_single_streaming_invariant() {
        let mut transcript = Transcript::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        transcript.begin_assistant(first);
        transcript.begin_assistant(second);

        let streaming: Vec<_> = transcript.messages().iter().filter(|m| m.streaming).collect();
        assert_eq!(streaming.len(), 1);
        assert_eq!(streaming[0].id, second);
        // And it is the most recently appended message.
        assert_eq!(transcript.messages().last().unwrap().id, second);
    }

    #[test]
    fn test_append_text_ignored_after_finish() {
        let mut transcript = Transcript::new();
        let id = Uuid::new_v4();
        transcript.begin_assistant(id);
        transcript.append_text(id, "done");
        transcript.finish_streaming(id);
        transcript.append_text(id, " extra");
        assert_eq!(transcript.get(id).unwrap().text(), "done");
    }

    #[test]
    fn test_strip_attachments_collapses_to_text() {
        let mut transcript = Transcript::new();
        let attachment = FileAttachment::image("YWJj", "image/png");
        let id = transcript.push(ChatMessage::user(
            vec![
                Content::text("what is in this image?"),
                attachment.to_content(),
            ],
            vec![attachment],
        ));

        transcript.strip_attachments(id);

        let message = transcript.get(id).unwrap();
        assert!(message.attachments.is_empty());
        assert_eq!(message.content.len(), 1);
        assert_eq!(message.text(), "what is in this image?");
    }

    #[test]
    fn test_strip_attachments_without_attachments_keeps_content() {
        let mut transcript = Transcript::new();
        let id = transcript.push(ChatMessage::user(
            vec![Content::text("a"), Content::text("b")],
            vec![],
        ));
        transcript.strip_attachments(id);
        assert_eq!(transcript.get(id).unwrap().content.len(), 2);
    }

    #[test]
    fn test_truncate_and_last_user() {
        let mut transcript = Transcript::new();
        let u1 = transcript.push(ChatMessage::user(vec![Content::text("one")], vec![]));
        transcript.push(ChatMessage::assistant_text("reply one"));
        transcript.push(ChatMessage::user(vec![Content::text("two")], vec![]));
        let a2 = transcript.push(ChatMessage::assistant_text("reply two"));

        let index = transcript.position(a2).unwrap();
        transcript.truncate(index);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.last_user().unwrap().text(), "two");
        assert!(transcript.get(u1).is_some());
    }

    #[test]
    fn test_service_history_skips_empty_messages() {
        let mut transcript = Transcript::new();
        transcript.push(ChatMessage::user(vec![Content::text("hi")], vec![]));
        let id = Uuid::new_v4();
        transcript.begin_assistant(id);
        // Streaming message with no content yet is not sent upstream.
        assert_eq!(transcript.service_history().len(), 1);
    }
}
