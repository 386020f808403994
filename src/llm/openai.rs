//! OpenAI-compatible chat completions client
//!
//! Async HTTP client for any `/chat/completions` endpoint with tool calling
//! and SSE streaming support. The base url and API key come from config, so
//! the same client speaks to hosted gateways and local servers alike.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::{ColloquyError, Config, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{ModelProvider, ModelResponse, ModelStream, StreamChunk, TokenUsage};

/// Client for an OpenAI-compatible completions endpoint
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

/// Chat completions request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    stream: bool,
}

/// Message in the endpoint's wire format
#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Tool call in the endpoint's wire format; arguments travel as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

/// Non-streaming response body
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Streaming chunk body
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<DeltaToolCall>>,
}

/// Incremental tool call fragment, keyed by index within the round
#[derive(Debug, Deserialize)]
struct DeltaToolCall {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize)]
struct DeltaFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates tool call fragments across streaming chunks.
///
/// Fragments for one call share an index; name and argument text build up
/// incrementally and the argument payload is only parseable once complete.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: Vec<PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn push(&mut self, fragment: DeltaToolCall) {
        if self.calls.len() <= fragment.index {
            self.calls
                .resize_with(fragment.index + 1, PartialToolCall::default);
        }

        let partial = &mut self.calls[fragment.index];
        if let Some(id) = fragment.id {
            partial.id = id;
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                partial.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                partial.arguments.push_str(&arguments);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|partial| ToolCall::new(partial.id, partial.name, parse_arguments(&partial.arguments)))
            .collect()
    }
}

/// Parse a stringified argument payload into a structured value.
///
/// Malformed payloads are preserved as raw strings; the dispatcher reports
/// them as malformed arguments for that call alone.
fn parse_arguments(raw: &str) -> serde_json::Value {
    if raw.is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

impl OpenAiClient {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.model.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.model.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key(),
            model: config.model.name.clone(),
        }
    }

    /// Create a client with a custom base URL and no API key
    pub fn with_base_url(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
        }
    }

    /// Convert an internal message to the wire format
    fn to_wire_message(message: &Message) -> WireMessage {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(
                message
                    .tool_calls
                    .iter()
                    .map(|tc| WireToolCall {
                        id: tc.id.clone(),
                        call_type: "function".to_string(),
                        function: WireFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        WireMessage {
            role: message.role.to_string(),
            content: message.content.render(),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }

    fn from_wire_calls(calls: Vec<WireToolCall>) -> Vec<ToolCall> {
        calls
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, parse_arguments(&tc.function.arguments)))
            .collect()
    }

    async fn send_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        stream: bool,
    ) -> Result<reqwest::Response> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: messages.iter().map(Self::to_wire_message).collect(),
            tools: if tools.is_empty() { None } else { Some(tools) },
            stream,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                ColloquyError::upstream(format!(
                    "Cannot connect to model endpoint at {}. Is it running?",
                    self.base_url
                ))
            } else {
                ColloquyError::from(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ColloquyError::upstream(format!(
                "model endpoint error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse> {
        let response = self.send_request(messages, tools, false).await?;

        let response_text = response.text().await?;
        let completion: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| ColloquyError::upstream(format!("failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ColloquyError::upstream("response carried no choices"))?;

        Ok(ModelResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .map(Self::from_wire_calls)
                .unwrap_or_default(),
            usage: completion.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn stream(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<ModelStream> {
        let response = self.send_request(messages, tools, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<StreamChunk>>(32);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            let mut accumulator = ToolCallAccumulator::default();
            let mut finished = false;

            'outer: while let Some(chunk_result) = body.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ColloquyError::upstream(format!("stream error: {}", e))))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete SSE lines from the buffer
                while let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].trim().to_string();
                    buffer = buffer[newline_pos + 1..].to_string();

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        finished = true;
                        break 'outer;
                    }

                    match serde_json::from_str::<ChatCompletionChunk>(data) {
                        Ok(chunk) => {
                            for choice in chunk.choices {
                                if let Some(content) = choice.delta.content {
                                    if !content.is_empty()
                                        && tx.send(Ok(StreamChunk::content(content))).await.is_err()
                                    {
                                        // Receiver gone; stop reading
                                        return;
                                    }
                                }
                                if let Some(fragments) = choice.delta.tool_calls {
                                    for fragment in fragments {
                                        accumulator.push(fragment);
                                    }
                                }
                                if choice.finish_reason.is_some() {
                                    finished = true;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, line = %data, "skipping unparseable chunk");
                        }
                    }
                }
            }

            let terminal = if accumulator.is_empty() {
                StreamChunk::done()
            } else {
                StreamChunk::done_with_tools(accumulator.finish())
            };

            if !finished {
                tracing::debug!("stream ended without a terminator; treating as complete");
            }
            let _ = tx.send(Ok(terminal)).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
