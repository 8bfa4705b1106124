//! Completion-service providers

pub mod anthropic;
