//! Tools module - capability table and tool implementations
//!
//! Contains the registry/dispatcher and the bundled sample tool.

pub mod registry;
pub mod weather;

pub use registry::{Tool, ToolOutcome, ToolRegistry};
pub use weather::WeatherTool;
