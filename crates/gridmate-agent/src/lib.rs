//! gridmate-agent: conversation engine with tool execution
//!
//! This crate drives one full user turn against the completion service,
//! including any nested tool-use sub-turns: it owns the visible transcript,
//! dispatches requested tool calls concurrently against the spreadsheet
//! backend, and supports cancellation and regeneration.

pub mod attachment;
pub mod events;
pub mod executor;
pub mod handle;
pub mod session;
pub mod tool;
pub mod transcript;
pub mod transport;

pub use attachment::{AttachmentKind, FileAttachment};
pub use events::{SessionEvent, ToolCall, ToolCallStatus};
pub use executor::{CompletedToolCall, ToolCallRequest, ToolExecutor};
pub use handle::SessionHandle;
pub use session::{ChatSession, SelectionContext, SessionConfig};
pub use tool::{BoxedTool, Tool, ToolResult};
pub use transcript::{ChatMessage, Role, Transcript};
pub use transport::{AnthropicService, CompletionService, RequestConfig};
