//! Weather lookup tool
//!
//! Stand-in capability returning a made-up current condition for a location.

use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};

use crate::core::{ColloquyError, Result, ToolDefinition};
use crate::tools::registry::Tool;

const CONDITIONS: &[&str] = &["sunny", "cloudy", "rainy", "snowy", "windy", "foggy"];

/// Get the current weather for the given location
#[derive(Debug, Clone, Default)]
pub struct WeatherTool;

impl WeatherTool {
    /// Create a new instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "get_weather",
            "Get the current weather for the given location",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The location for which to get the weather."
                    }
                },
                "required": ["location"]
            }),
        )
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let location = arguments
            .get("location")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ColloquyError::malformed_arguments("get_weather", "location must be a string")
            })?;

        let condition = CONDITIONS[rand::rng().random_range(0..CONDITIONS.len())];
        Ok(json!(format!(
            "The weather in {} is currently {}.",
            location, condition
        )))
    }
}
