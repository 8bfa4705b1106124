//! gridmate-ai: streaming completion-service client
//!
//! This crate provides the message/content model shared across the
//! assistant, the streaming event protocol, and a provider that speaks the
//! Anthropic Messages API over SSE.

pub mod error;
pub mod models;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::MessageEventStream;
pub use types::*;
