//! dr-core: Core types and traits for deep-researcher
//!
//! This crate provides the foundational types shared by the research
//! pipeline: the error type, the chat message model, the LLM `Provider`
//! trait, the `Tool` trait and the one-shot agent loop.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{Agent, AgentConfig, AgentId, AgentProgressEvent, AgentProgressHandler};
pub use error::Error;
pub use message::{Content, Message, Role, ToolCall, Usage};
pub use provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};
pub use tool::{PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters, ToolRegistry};

pub type Result<T> = std::result::Result<T, Error>;
