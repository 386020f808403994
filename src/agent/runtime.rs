//! Agent state machine
//!
//! Drives one chat invocation: alternate between calling the model and
//! executing requested tools until the model answers without tool calls,
//! forwarding streamed text through the relay as it arrives. The working
//! context is loaded from the message store at the start and the messages
//! produced by the invocation are committed back at a terminal state.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use uuid::Uuid;

use crate::agent::state::{Phase, TurnContext};
use crate::core::{ChatRequest, ColloquyError, Config, Message, MessageContent, Result};
use crate::llm::{ModelProvider, ModelResponse};
use crate::relay::StreamRelay;
use crate::store::MessageStore;
use crate::tools::ToolRegistry;

/// Outcome of one model call
enum ModelTurn {
    /// The model produced a response (text, tool calls, or both)
    Completed(ModelResponse),
    /// The client dropped the stream while tokens were being forwarded
    Disconnected,
}

/// The agent runtime for chat invocations
pub struct AgentRuntime {
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn MessageStore>,
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
    model_timeout: Duration,
    tool_timeout: Duration,
    streaming: bool,
}

impl AgentRuntime {
    /// Create a runtime over the given collaborators
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn MessageStore>,
        tools: Arc<ToolRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            store,
            tools,
            max_rounds: config.agent.max_rounds,
            model_timeout: Duration::from_secs(config.model.timeout_secs),
            tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
            streaming: config.streaming.enabled,
        }
    }

    /// Run one invocation to completion.
    ///
    /// All failures are scoped to the invocation: upstream errors and the
    /// round cap become a single relay error event plus a status-tagged
    /// transcript record. Only store reconciliation errors propagate.
    pub async fn run(&self, request: ChatRequest, mut relay: StreamRelay) -> Result<()> {
        let history = match self.store.history(&request.thread_id).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!(error = %e, thread_id = %request.thread_id, "history load failed");
                relay.send_error(e.to_string()).await;
                return Ok(());
            }
        };

        let prompt = Message::user(request.prompt.id.clone(), request.prompt.content.clone());
        let mut ctx = TurnContext::new(history, prompt, request.response_id.clone());

        loop {
            // AGENT: call the model with the current working context
            let turn = match self.call_model(ctx.messages(), &mut relay).await {
                Ok(turn) => turn,
                Err(e) => return self.fail(&request.thread_id, ctx, relay, e).await,
            };

            let response = match turn {
                ModelTurn::Completed(response) => response,
                ModelTurn::Disconnected => {
                    // Equivalent to the stream completing: the partial
                    // assistant text is dropped, completed rounds commit.
                    tracing::debug!(thread_id = %request.thread_id, "client disconnected mid-stream");
                    return self.commit(&request.thread_id, &mut ctx).await;
                }
            };

            // ROUTE: zero tool calls terminates the loop
            ctx.enter(Phase::Route);
            if response.tool_calls.is_empty() {
                ctx.enter(Phase::Done);
                // The caller-supplied id overrides whatever the model assigned
                let final_message =
                    Message::assistant(ctx.response_id().to_string(), response.content);
                ctx.push(final_message);
                return self.commit(&request.thread_id, &mut ctx).await;
            }

            if ctx.rounds() >= self.max_rounds {
                let err = ColloquyError::LoopExceeded(self.max_rounds);
                return self.fail(&request.thread_id, ctx, relay, err).await;
            }

            // TOOLS: record the request, run the round, append the results
            ctx.enter(Phase::Tools);
            let calls = response.tool_calls.clone();
            ctx.push(Message::assistant_with_calls(
                Uuid::new_v4().to_string(),
                response.content,
                response.tool_calls,
            ));

            let outcomes = match tokio::time::timeout(
                self.tool_timeout,
                self.tools.dispatch_round(&calls),
            )
            .await
            {
                Ok(outcomes) => outcomes,
                Err(_) => {
                    let err = ColloquyError::upstream("tool round timed out");
                    return self.fail(&request.thread_id, ctx, relay, err).await;
                }
            };

            for outcome in outcomes {
                let content = match outcome.result {
                    Ok(serde_json::Value::String(text)) => MessageContent::Text(text),
                    Ok(value) => MessageContent::Structured(value),
                    Err(e) => {
                        tracing::warn!(tool = %outcome.call.name, error = %e, "tool call failed");
                        MessageContent::Text(e.to_string())
                    }
                };
                ctx.push(Message::tool_result(
                    Uuid::new_v4().to_string(),
                    outcome.call.id,
                    content,
                ));
            }

            ctx.next_round();
            ctx.enter(Phase::Agent);
        }
    }

    /// One model call, forwarding streamed text through the relay.
    ///
    /// Chunks are forwarded speculatively, before it is known whether the
    /// response terminates the loop; tool calls arrive fully formed with the
    /// terminal chunk.
    async fn call_model(
        &self,
        messages: &[Message],
        relay: &mut StreamRelay,
    ) -> Result<ModelTurn> {
        let definitions = self.tools.definitions();

        if !self.streaming {
            let response = tokio::time::timeout(
                self.model_timeout,
                self.provider.complete(messages, definitions),
            )
            .await
            .map_err(|_| ColloquyError::upstream("model call timed out"))??;

            if !response.content.is_empty()
                && response.tool_calls.is_empty()
                && relay.send_chunk(response.content.as_str()).await.is_err()
            {
                return Ok(ModelTurn::Disconnected);
            }
            return Ok(ModelTurn::Completed(response));
        }

        let collect = async {
            let mut stream = self.provider.stream(messages, definitions).await?;
            let mut content = String::new();
            let mut tool_calls = Vec::new();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;

                if !chunk.content.is_empty() {
                    content.push_str(&chunk.content);
                    if relay.send_chunk(chunk.content.as_str()).await.is_err() {
                        return Ok(ModelTurn::Disconnected);
                    }
                }

                if let Some(calls) = chunk.tool_calls {
                    tool_calls.extend(calls);
                }

                if chunk.done {
                    break;
                }
            }

            Ok(ModelTurn::Completed(ModelResponse {
                content,
                tool_calls,
                usage: None,
            }))
        };

        tokio::time::timeout(self.model_timeout, collect)
            .await
            .map_err(|_| ColloquyError::upstream("model call timed out"))?
    }

    /// Terminal failure path: one relay error event, then a status-tagged
    /// record appended to history under the pre-assigned response id.
    async fn fail(
        &self,
        thread_id: &str,
        mut ctx: TurnContext,
        mut relay: StreamRelay,
        error: ColloquyError,
    ) -> Result<()> {
        tracing::warn!(thread_id = %thread_id, error = %error, "invocation failed");
        relay.send_error(error.to_string()).await;

        ctx.enter(Phase::Done);
        let record = Message::assistant(
            ctx.response_id().to_string(),
            MessageContent::Structured(json!({
                "status": "error",
                "error": error.to_string(),
            })),
        );
        ctx.push(record);

        self.commit(thread_id, &mut ctx).await
    }

    /// Reconcile the messages produced by this invocation into the store.
    async fn commit(&self, thread_id: &str, ctx: &mut TurnContext) -> Result<()> {
        for message in ctx.take_pending() {
            self.store.append(thread_id, message).await?;
        }
        Ok(())
    }
}
