//! Agent module - the invocation state machine and service facade
//!
//! Contains the loop that coordinates model calls and tool execution, and
//! the service wiring it to the stores and relay.

pub mod runtime;
pub mod service;
pub mod state;

pub use runtime::AgentRuntime;
pub use service::ChatService;
pub use state::{Phase, TurnContext};
