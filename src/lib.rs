//! Colloquy - Conversational Agent Runtime
//!
//! A request drives a bounded state machine that alternates between calling
//! a model capability and executing tools the model requested, while thread
//! metadata and message history persist process-locally and model output is
//! relayed to the client as an incremental event stream.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Model capability boundary with an OpenAI-compatible client
//! - **Store**: Thread metadata registry and per-thread message history
//! - **Tools**: Capability table and tool dispatch
//! - **Agent**: The invocation state machine and chat service facade
//! - **Relay**: Token increments to wire events
//! - **CLI**: Interactive driver
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use colloquy::agent::ChatService;
//! use colloquy::core::{ChatRequest, Config, Prompt, Role};
//! use colloquy::llm::OpenAiClient;
//! use colloquy::relay::RelayEvent;
//! use colloquy::store::MemoryMessageStore;
//! use colloquy::tools::{ToolRegistry, WeatherTool};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load();
//!     let provider = Arc::new(OpenAiClient::from_config(&config));
//!     let mut tools = ToolRegistry::new();
//!     tools.register(Arc::new(WeatherTool::new()));
//!
//!     let service = ChatService::new(
//!         provider,
//!         Arc::new(MemoryMessageStore::new()),
//!         Arc::new(tools),
//!         &config,
//!     );
//!
//!     let thread = service.create_thread("Weather talk");
//!     let mut stream = service
//!         .chat(ChatRequest {
//!             prompt: Prompt {
//!                 role: Role::User,
//!                 content: "What's the weather in Paris?".to_string(),
//!                 id: "u1".to_string(),
//!             },
//!             thread_id: thread.id,
//!             response_id: "a1".to_string(),
//!         })
//!         .await;
//!
//!     while let Some(event) = stream.next().await {
//!         print!("{}", event.wire());
//!     }
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod relay;
pub mod store;
pub mod tools;

// Re-export commonly used items
pub use agent::ChatService;
pub use cli::Repl;
pub use core::{ColloquyError, Config, Result};
