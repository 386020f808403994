//! End-to-end tests for the agent state machine and streaming relay
//!
//! The model capability is replaced by a scripted provider so transitions,
//! round bounds, and failure semantics can be asserted deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_stream::StreamExt;

use colloquy::agent::ChatService;
use colloquy::core::{
    ChatRequest, ColloquyError, Config, Message, MessageContent, Prompt, Role, ToolCall,
    ToolDefinition,
};
use colloquy::llm::{ModelProvider, ModelResponse, ModelStream, StreamChunk};
use colloquy::relay::RelayEvent;
use colloquy::store::{MemoryMessageStore, MessageStore};
use colloquy::tools::{Tool, ToolRegistry};

/// One scripted model turn
#[derive(Clone)]
enum Turn {
    /// Yield these chunks, then end
    Stream(Vec<StreamChunk>),
    /// Yield these chunks, then fail mid-stream
    StreamThenFail(Vec<StreamChunk>, String),
    /// Fail before any output
    Fail(String),
}

/// Scripted stand-in for the model capability
struct ScriptedProvider {
    script: Mutex<VecDeque<Turn>>,
    fallback: Option<Turn>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(turns: Vec<Turn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that replays the same turn forever
    fn looping(turn: Turn) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(turn),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_turn(&self) -> Turn {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .expect("scripted provider ran out of turns")
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> colloquy::Result<ModelResponse> {
        match self.next_turn() {
            Turn::Stream(chunks) => {
                let mut content = String::new();
                let mut tool_calls = Vec::new();
                for chunk in chunks {
                    content.push_str(&chunk.content);
                    if let Some(calls) = chunk.tool_calls {
                        tool_calls.extend(calls);
                    }
                }
                Ok(ModelResponse {
                    content,
                    tool_calls,
                    usage: None,
                })
            }
            Turn::StreamThenFail(_, message) | Turn::Fail(message) => {
                Err(ColloquyError::upstream(message))
            }
        }
    }

    async fn stream(
        &self,
        _messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> colloquy::Result<ModelStream> {
        match self.next_turn() {
            Turn::Stream(chunks) => {
                let items: Vec<colloquy::Result<StreamChunk>> =
                    chunks.into_iter().map(Ok).collect();
                Ok(Box::pin(tokio_stream::iter(items)))
            }
            Turn::StreamThenFail(chunks, message) => {
                let mut items: Vec<colloquy::Result<StreamChunk>> =
                    chunks.into_iter().map(Ok).collect();
                items.push(Err(ColloquyError::upstream(message)));
                Ok(Box::pin(tokio_stream::iter(items)))
            }
            Turn::Fail(message) => Err(ColloquyError::upstream(message)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Deterministic weather tool for assertions
struct StubWeather;

#[async_trait]
impl Tool for StubWeather {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "get_weather",
            "Get the current weather for the given location",
            json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            }),
        )
    }

    async fn execute(&self, _arguments: &Value) -> colloquy::Result<Value> {
        Ok(json!("sunny"))
    }
}

fn test_config(max_rounds: usize, streaming: bool) -> Config {
    let mut config = Config::default();
    config.agent.max_rounds = max_rounds;
    config.streaming.enabled = streaming;
    config.model.timeout_secs = 5;
    config.agent.tool_timeout_secs = 5;
    config
}

struct Harness {
    service: ChatService,
    store: Arc<MemoryMessageStore>,
    provider: Arc<ScriptedProvider>,
}

fn harness(provider: ScriptedProvider, config: Config) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryMessageStore::new());

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(StubWeather));

    let service = ChatService::new(
        provider.clone(),
        store.clone(),
        Arc::new(tools),
        &config,
    );

    Harness {
        service,
        store,
        provider,
    }
}

fn request(thread_id: &str, content: &str, prompt_id: &str, response_id: &str) -> ChatRequest {
    ChatRequest {
        prompt: Prompt {
            role: Role::User,
            content: content.to_string(),
            id: prompt_id.to_string(),
        },
        thread_id: thread_id.to_string(),
        response_id: response_id.to_string(),
    }
}

fn weather_call(id: &str) -> ToolCall {
    ToolCall::new(id, "get_weather", json!({"location": "Paris"}))
}

#[tokio::test]
async fn streamed_response_is_relayed_and_persisted() {
    let h = harness(
        ScriptedProvider::new(vec![Turn::Stream(vec![
            StreamChunk::content("He"),
            StreamChunk::content("llo"),
            StreamChunk::done(),
        ])]),
        test_config(5, true),
    );

    let thread = h.service.create_thread("T1");
    let stream = h.service.chat(request(&thread.id, "hi", "u1", "a1")).await;
    let events: Vec<RelayEvent> = stream.collect().await;

    assert_eq!(
        events,
        vec![
            RelayEvent::Chunk("He".to_string()),
            RelayEvent::Chunk("llo".to_string())
        ]
    );

    let history = h.store.history(&thread.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, "u1");
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content.render(), "hi");
    assert_eq!(history[1].id, "a1");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content.render(), "Hello");
}

#[tokio::test]
async fn tool_round_appends_results_and_returns_to_agent() {
    let h = harness(
        ScriptedProvider::new(vec![
            Turn::Stream(vec![StreamChunk::done_with_tools(vec![weather_call("c1")])]),
            Turn::Stream(vec![
                StreamChunk::content("It is sunny."),
                StreamChunk::done(),
            ]),
        ]),
        test_config(5, true),
    );

    let thread = h.service.create_thread("weather");
    let stream = h
        .service
        .chat(request(&thread.id, "Weather in Paris?", "u1", "a1"))
        .await;
    let events: Vec<RelayEvent> = stream.collect().await;

    assert_eq!(events, vec![RelayEvent::Chunk("It is sunny.".to_string())]);
    assert_eq!(h.provider.calls(), 2);

    // Canonical history keeps the tool traffic
    let history = h.store.history(&thread.id).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].id, "u1");
    assert!(history[1].has_tool_calls());
    assert_eq!(history[2].role, Role::Tool);
    assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(history[2].content.render(), "sunny");
    assert_eq!(history[3].id, "a1");

    // The transcript projection omits it
    let transcript = h.service.thread_messages(&thread.id).await.unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].id, "u1");
    assert_eq!(transcript[1].id, "a1");
}

#[tokio::test]
async fn tool_results_preserve_request_order() {
    let h = harness(
        ScriptedProvider::new(vec![
            Turn::Stream(vec![StreamChunk::done_with_tools(vec![
                weather_call("c1"),
                weather_call("c2"),
                weather_call("c3"),
            ])]),
            Turn::Stream(vec![StreamChunk::content("done"), StreamChunk::done()]),
        ]),
        test_config(5, true),
    );

    let thread = h.service.create_thread("ordering");
    let _: Vec<RelayEvent> = h
        .service
        .chat(request(&thread.id, "three lookups", "u1", "a1"))
        .await
        .collect()
        .await;

    let history = h.store.history(&thread.id).await.unwrap();
    let tool_results: Vec<&Message> = history.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_results.len(), 3);
    assert_eq!(tool_results[0].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(tool_results[1].tool_call_id.as_deref(), Some("c2"));
    assert_eq!(tool_results[2].tool_call_id.as_deref(), Some("c3"));
}

#[tokio::test]
async fn self_referential_tool_loop_is_bounded() {
    let max_rounds = 3;
    let h = harness(
        ScriptedProvider::looping(Turn::Stream(vec![StreamChunk::done_with_tools(vec![
            weather_call("again"),
        ])])),
        test_config(max_rounds, true),
    );

    let thread = h.service.create_thread("looper");
    let events: Vec<RelayEvent> = h
        .service
        .chat(request(&thread.id, "loop forever", "u1", "a1"))
        .await
        .collect()
        .await;

    // Exactly one error event ends the stream
    assert_eq!(events.len(), 1);
    assert!(events[0].is_error());
    assert!(events[0].wire().contains("exceeded"));

    // One model call per allowed round, plus the one that hit the cap
    assert_eq!(h.provider.calls(), max_rounds + 1);

    // The failure record is persisted under the pre-assigned response id,
    // tagged so it cannot pass for genuine assistant output
    let history = h.store.history(&thread.id).await.unwrap();
    let record = history.iter().find(|m| m.id == "a1").unwrap();
    match &record.content {
        MessageContent::Structured(value) => {
            assert_eq!(value["status"], "error");
            assert!(value["error"].as_str().unwrap().contains("exceeded"));
        }
        MessageContent::Text(_) => panic!("error record should be structured"),
    }
}

#[tokio::test]
async fn mid_stream_failure_emits_single_error_and_drops_partial_text() {
    let h = harness(
        ScriptedProvider::new(vec![Turn::StreamThenFail(
            vec![StreamChunk::content("par")],
            "connection reset".to_string(),
        )]),
        test_config(5, true),
    );

    let thread = h.service.create_thread("flaky");
    let events: Vec<RelayEvent> = h
        .service
        .chat(request(&thread.id, "hi", "u1", "a1"))
        .await
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], RelayEvent::Chunk("par".to_string()));
    assert!(events[1].is_error());

    let history = h.store.history(&thread.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, "u1");
    // The partial "par" is not persisted as assistant content
    match &history[1].content {
        MessageContent::Structured(value) => {
            assert_eq!(value["status"], "error");
            assert!(value["error"].as_str().unwrap().contains("connection reset"));
        }
        MessageContent::Text(_) => panic!("error record should be structured"),
    }
}

#[tokio::test]
async fn upstream_failure_before_output_still_appends_record() {
    let h = harness(
        ScriptedProvider::new(vec![Turn::Fail("model unavailable".to_string())]),
        test_config(5, true),
    );

    let thread = h.service.create_thread("down");
    let events: Vec<RelayEvent> = h
        .service
        .chat(request(&thread.id, "hi", "u1", "a1"))
        .await
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(events[0].is_error());

    let history = h.store.history(&thread.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].id, "a1");
}

#[tokio::test]
async fn non_streaming_mode_relays_complete_response() {
    let h = harness(
        ScriptedProvider::new(vec![Turn::Stream(vec![
            StreamChunk::content("Hello"),
            StreamChunk::done(),
        ])]),
        test_config(5, false),
    );

    let thread = h.service.create_thread("blocking");
    let events: Vec<RelayEvent> = h
        .service
        .chat(request(&thread.id, "hi", "u1", "a1"))
        .await
        .collect()
        .await;

    assert_eq!(events, vec![RelayEvent::Chunk("Hello".to_string())]);

    let history = h.store.history(&thread.id).await.unwrap();
    assert_eq!(history[1].content.render(), "Hello");
}

#[tokio::test]
async fn distinct_threads_run_concurrently() {
    let h = harness(
        ScriptedProvider::new(vec![
            Turn::Stream(vec![StreamChunk::content("ok"), StreamChunk::done()]),
            Turn::Stream(vec![StreamChunk::content("ok"), StreamChunk::done()]),
        ]),
        test_config(5, true),
    );

    let t1 = h.service.create_thread("one");
    let t2 = h.service.create_thread("two");

    let s1 = h.service.chat(request(&t1.id, "hi", "u1", "a1")).await;
    let s2 = h.service.chat(request(&t2.id, "hi", "u2", "a2")).await;

    let (e1, e2): (Vec<RelayEvent>, Vec<RelayEvent>) =
        tokio::join!(s1.collect(), s2.collect());

    assert_eq!(e1, vec![RelayEvent::Chunk("ok".to_string())]);
    assert_eq!(e2, vec![RelayEvent::Chunk("ok".to_string())]);

    assert_eq!(h.store.history(&t1.id).await.unwrap().len(), 2);
    assert_eq!(h.store.history(&t2.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_sibling_call_does_not_abort_round() {
    let h = harness(
        ScriptedProvider::new(vec![
            Turn::Stream(vec![StreamChunk::done_with_tools(vec![
                weather_call("c1"),
                ToolCall::new("c2", "no_such_tool", json!({})),
            ])]),
            Turn::Stream(vec![StreamChunk::content("done"), StreamChunk::done()]),
        ]),
        test_config(5, true),
    );

    let thread = h.service.create_thread("partial");
    let events: Vec<RelayEvent> = h
        .service
        .chat(request(&thread.id, "mixed round", "u1", "a1"))
        .await
        .collect()
        .await;

    // The round completed and the follow-up response streamed normally
    assert_eq!(events, vec![RelayEvent::Chunk("done".to_string())]);

    let history = h.store.history(&thread.id).await.unwrap();
    let tool_results: Vec<&Message> = history.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_results.len(), 2);
    assert_eq!(tool_results[0].content.render(), "sunny");
    assert!(tool_results[1].content.render().contains("unknown tool"));
}
