//! Chat service facade
//!
//! Wires the thread registry, message store, and agent runtime together
//! behind the surface a transport layer consumes: thread CRUD, transcript
//! fetch, message updates, and the streaming chat entry point. Invocations
//! against the same thread are serialized through a per-thread lock;
//! distinct threads proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::agent::runtime::AgentRuntime;
use crate::core::{ChatRequest, ColloquyError, Config, Message, Result};
use crate::llm::ModelProvider;
use crate::relay::{self, RelayStream};
use crate::store::{MessageStore, Thread, ThreadRegistry, TranscriptMessage};
use crate::tools::ToolRegistry;

/// The chat service
pub struct ChatService {
    registry: ThreadRegistry,
    store: Arc<dyn MessageStore>,
    runtime: Arc<AgentRuntime>,
    writer_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    relay_capacity: usize,
}

impl ChatService {
    /// Create a service over the given collaborators
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn MessageStore>,
        tools: Arc<ToolRegistry>,
        config: &Config,
    ) -> Self {
        let runtime = AgentRuntime::new(provider, Arc::clone(&store), tools, config);

        Self {
            registry: ThreadRegistry::new(),
            store,
            runtime: Arc::new(runtime),
            writer_locks: Mutex::new(HashMap::new()),
            relay_capacity: config.agent.relay_capacity,
        }
    }

    /// Create a new thread
    pub fn create_thread(&self, title: impl Into<String>) -> Thread {
        self.registry.create(title)
    }

    /// All threads, most recently created first
    pub fn threads(&self) -> Vec<Thread> {
        self.registry.list()
    }

    /// Look up a single thread's metadata
    pub fn thread(&self, id: &str) -> Option<Thread> {
        self.registry.get(id)
    }

    /// Update a thread's title
    pub fn rename_thread(&self, id: &str, title: impl Into<String>) -> Result<Thread> {
        self.registry.update(id, title)
    }

    /// Delete a thread's metadata; message history is untouched
    pub fn delete_thread(&self, id: &str) -> bool {
        self.registry.delete(id)
    }

    /// The client-facing transcript for a thread.
    ///
    /// Not-found only when the projection is empty AND no metadata exists;
    /// a thread with metadata but no messages yields an empty transcript.
    pub async fn thread_messages(&self, thread_id: &str) -> Result<Vec<TranscriptMessage>> {
        let messages = self.store.list(thread_id).await?;

        if messages.is_empty() && self.registry.get(thread_id).is_none() {
            return Err(ColloquyError::not_found(format!("thread {}", thread_id)));
        }

        Ok(messages)
    }

    /// Replace a stored message in place (e.g. client-side feedback edits)
    pub async fn update_message(&self, thread_id: &str, message: Message) -> Result<()> {
        let message_id = message.id.clone();
        self.store.replace(thread_id, &message_id, message).await
    }

    /// Start a chat invocation and return its wire event stream.
    ///
    /// The invocation runs on its own task; the stream yields text chunks as
    /// the model produces them and ends on completion, or after a single
    /// error event.
    pub async fn chat(&self, request: ChatRequest) -> RelayStream {
        let (relay, stream) = relay::channel(self.relay_capacity);
        let lock = self.writer_lock(&request.thread_id).await;
        let runtime = Arc::clone(&self.runtime);

        tokio::spawn(async move {
            // One in-flight mutation per thread
            let _guard = lock.lock().await;
            if let Err(e) = runtime.run(request, relay).await {
                tracing::error!(error = %e, "invocation failed to reconcile");
            }
        });

        stream
    }

    async fn writer_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.writer_locks.lock().await;
        Arc::clone(
            locks
                .entry(thread_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
