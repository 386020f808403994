//! Tool registry - manages and dispatches tool calls
//!
//! A capability table mapping each registered name to its argument schema
//! and handler. Tool handlers are pure functions of their arguments with no
//! access to thread state, so execution cannot corrupt message ordering.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

use crate::core::{ColloquyError, Result, ToolCall, ToolDefinition};

/// A tool capability the model may invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    /// The definition advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Execute with an already-validated argument payload
    async fn execute(&self, arguments: &Value) -> Result<Value>;
}

/// Outcome of dispatching a single tool call within a round
///
/// A failed call carries its error here instead of aborting sibling calls.
pub struct ToolOutcome {
    /// The originating call
    pub call: ToolCall,
    /// Handler result, or the failure scoped to this call
    pub result: Result<Value>,
}

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its definition name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let definition = tool.definition();
        self.tools.insert(definition.function.name.clone(), tool);
        self.definitions.push(definition);
    }

    /// Definitions of all registered tools, for the model call
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Whether any tools are registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a single tool call
    ///
    /// Unknown names and bad payloads fail here without touching any other
    /// call in the round.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<Value> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ColloquyError::UnknownTool(call.name.clone()))?;

        let arguments = normalize_arguments(&call.name, &call.arguments)?;
        validate_arguments(&tool.definition(), &call.name, &arguments)?;

        tool.execute(&arguments).await
    }

    /// Execute all calls of one round concurrently.
    ///
    /// Outcomes come back in request order regardless of completion order.
    pub async fn dispatch_round(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        let futures = calls.iter().map(|call| async move {
            ToolOutcome {
                call: call.clone(),
                result: self.dispatch(call).await,
            }
        });

        join_all(futures).await
    }
}

/// Coerce the payload into a JSON object, parsing stringified payloads.
fn normalize_arguments(tool: &str, arguments: &Value) -> Result<Value> {
    match arguments {
        Value::Object(_) => Ok(arguments.clone()),
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .map_err(|e| ColloquyError::malformed_arguments(tool, format!("not valid JSON: {}", e)))
            .and_then(|parsed| {
                if parsed.is_object() {
                    Ok(parsed)
                } else {
                    Err(ColloquyError::malformed_arguments(
                        tool,
                        "payload is not a JSON object",
                    ))
                }
            }),
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        _ => Err(ColloquyError::malformed_arguments(
            tool,
            "payload is not a JSON object",
        )),
    }
}

/// Check the payload against the definition's required parameters.
fn validate_arguments(definition: &ToolDefinition, tool: &str, arguments: &Value) -> Result<()> {
    for required in definition.required_parameters() {
        if arguments.get(required).is_none() {
            return Err(ColloquyError::malformed_arguments(
                tool,
                format!("missing required parameter '{}'", required),
            ));
        }
    }
    Ok(())
}
