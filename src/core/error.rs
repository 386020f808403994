//! Custom error types for Colloquy
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Colloquy operations
#[derive(Error, Debug)]
pub enum ColloquyError {
    /// Thread or message id absent
    #[error("not found: {0}")]
    NotFound(String),

    /// The model requested a capability that is not registered
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool argument payload failed to parse or validate
    #[error("malformed arguments for tool '{tool}': {reason}")]
    MalformedToolArguments { tool: String, reason: String },

    /// Model capability call failed or returned malformed data
    #[error("model call failed: {0}")]
    Upstream(String),

    /// The agent/tool loop ran past the configured round limit
    #[error("agent loop exceeded {0} rounds")]
    LoopExceeded(usize),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for Colloquy operations
pub type Result<T> = std::result::Result<T, ColloquyError>;

impl ColloquyError {
    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an upstream (model capability) error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a malformed-arguments error
    pub fn malformed_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedToolArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this failure aborts only a single tool call, not the round
    pub fn is_tool_scoped(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_) | Self::MalformedToolArguments { .. }
        )
    }
}
