//! Model capability boundary
//!
//! The runtime's only outbound dependency: something that accepts a message
//! sequence plus tool specs and returns either a complete message or a
//! token-incremental stream.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::core::{Message, Result, ToolCall, ToolDefinition};

/// Complete response from a model capability
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Text content of the response
    pub content: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    /// A plain text response with no tool calls
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A chunk from a streaming response
///
/// Text arrives token-by-token; tool calls arrive fully formed on the final
/// chunk, since their argument payloads must be parsed as whole values.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    /// Token text content
    pub content: String,
    /// Whether this is the final chunk
    pub done: bool,
    /// Tool calls (only on the final chunk)
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl StreamChunk {
    /// Create a new content chunk
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            done: false,
            tool_calls: None,
        }
    }

    /// Create a final/done chunk
    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
            tool_calls: None,
        }
    }

    /// Create a done chunk with tool calls
    pub fn done_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            done: true,
            tool_calls: Some(tool_calls),
        }
    }
}

/// Type alias for a boxed stream of chunks
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Trait for model capability providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a complete response from messages and tool specs
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse>;

    /// Generate a token-incremental response
    async fn stream(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<ModelStream>;

    /// Get the provider name
    fn name(&self) -> &str;
}
