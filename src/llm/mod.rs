//! LLM module - the model capability boundary
//!
//! Provides the provider abstraction with an OpenAI-compatible client as the
//! primary implementation.

pub mod openai;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{ModelProvider, ModelResponse, ModelStream, StreamChunk, TokenUsage};
