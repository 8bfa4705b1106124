//! Session event types

use gridmate_ai::Usage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a live tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Running,
    Completed,
}

/// A live or completed invocation of a named tool.
///
/// The id is assigned by the completion service; all calls requested in one
/// model turn form a batch that runs and clears together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub status: ToolCallStatus,
}

/// Events emitted while a session processes a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A user turn started processing
    TurnStart,

    /// The streaming assistant message was created (first text fragment)
    MessageStart { id: Uuid },

    /// A text fragment was appended to the streaming assistant message
    MessageDelta { id: Uuid, delta: String },

    /// The streaming assistant message finished
    MessageEnd { id: Uuid },

    /// A batch of tool calls started executing
    ToolBatchStart { calls: Vec<ToolCall> },

    /// The whole batch finished; results keyed by call id were appended
    ToolBatchEnd { call_ids: Vec<String> },

    /// The turn finished successfully
    TurnEnd { sub_turns: u32, usage: Usage },

    /// The turn was stopped by the user
    Aborted,

    /// The turn ended with a completion-service error
    Error { message: String },
}

impl SessionEvent {
    /// Check if this event terminates a turn
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::TurnEnd { .. } | SessionEvent::Aborted | SessionEvent::Error { .. }
        )
    }
}
