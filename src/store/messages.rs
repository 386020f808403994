//! Per-thread message history
//!
//! The canonical store keeps the complete ordered sequence for each thread,
//! tool-call and tool-result messages included; the client-facing transcript
//! is a filtered projection computed at the read boundary, never by deleting
//! from the canonical sequence.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::{ColloquyError, Message, Result, Role};

/// A message as shown in the client-facing transcript
///
/// Only user messages and tool-call-free assistant messages appear here;
/// structured content is rendered to its JSON text form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// Message id
    pub id: String,
    /// `user` or `assistant`
    pub role: Role,
    /// Display content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Storage abstraction for per-thread message sequences
///
/// The runtime materializes its working context from this store at
/// invocation start and reconciles newly produced messages back at
/// completion. Implementations must keep each thread's sequence ordered
/// by insertion.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to the end of the thread's sequence.
    ///
    /// Implementations backed by pre-provisioned sessions may return
    /// [`ColloquyError::NotFound`] when the thread has no session state.
    async fn append(&self, thread_id: &str, message: Message) -> Result<()>;

    /// Replace the first message with a matching id, preserving its position.
    ///
    /// Returns [`ColloquyError::NotFound`] when no message has that id; the
    /// sequence is left unchanged in that case.
    async fn replace(&self, thread_id: &str, message_id: &str, message: Message) -> Result<()>;

    /// The canonical (unfiltered) sequence for a thread, in insertion order.
    async fn history(&self, thread_id: &str) -> Result<Vec<Message>>;

    /// The client-facing transcript projection.
    ///
    /// Filters to user messages and assistant messages without tool calls,
    /// in original order, each rendered to display form.
    async fn list(&self, thread_id: &str) -> Result<Vec<TranscriptMessage>> {
        let history = self.history(thread_id).await?;
        Ok(history.iter().filter_map(project).collect())
    }
}

/// Project a canonical message into its transcript form, if it is visible.
fn project(message: &Message) -> Option<TranscriptMessage> {
    let visible = match message.role {
        Role::User => true,
        Role::Assistant => !message.has_tool_calls(),
        Role::Tool => false,
    };

    if !visible {
        return None;
    }

    Some(TranscriptMessage {
        id: message.id.clone(),
        role: message.role,
        content: if message.content.is_empty() {
            None
        } else {
            Some(message.content.render())
        },
    })
}

/// In-memory message store
///
/// The per-thread sequence is created on first append; message history is
/// independent of thread metadata, so reading an unknown thread yields an
/// empty history rather than an error.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    threads: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, thread_id: &str, message: Message) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads
            .entry(thread_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn replace(&self, thread_id: &str, message_id: &str, message: Message) -> Result<()> {
        let mut threads = self.threads.write().await;

        let sequence = threads
            .get_mut(thread_id)
            .ok_or_else(|| ColloquyError::not_found(format!("thread {}", thread_id)))?;

        let position = sequence
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| ColloquyError::not_found(format!("message {}", message_id)))?;

        sequence[position] = message;
        Ok(())
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<Message>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolCall;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "get_weather", serde_json::json!({"location": "Paris"}))
    }

    #[tokio::test]
    async fn test_list_filters_tool_traffic() {
        let store = MemoryMessageStore::new();
        store
            .append("t1", Message::user("u1", "hi"))
            .await
            .unwrap();
        store
            .append(
                "t1",
                Message::assistant_with_calls("m1", "", vec![call("c1")]),
            )
            .await
            .unwrap();
        store
            .append("t1", Message::tool_result("r1", "c1", "sunny"))
            .await
            .unwrap();
        store
            .append("t1", Message::assistant("a1", "It is sunny."))
            .await
            .unwrap();

        let transcript = store.list("t1").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].id, "u1");
        assert_eq!(transcript[1].id, "a1");

        // Canonical history keeps everything
        assert_eq!(store.history("t1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_replace_preserves_position() {
        let store = MemoryMessageStore::new();
        store
            .append("t1", Message::user("u1", "one"))
            .await
            .unwrap();
        store
            .append("t1", Message::assistant("a1", "two"))
            .await
            .unwrap();

        store
            .replace("t1", "u1", Message::user("u1", "edited"))
            .await
            .unwrap();

        let history = store.history("t1").await.unwrap();
        assert_eq!(history[0].content.render(), "edited");
        assert_eq!(history[1].id, "a1");
    }

    #[tokio::test]
    async fn test_replace_missing_is_not_found() {
        let store = MemoryMessageStore::new();
        store
            .append("t1", Message::user("u1", "one"))
            .await
            .unwrap();

        let err = store
            .replace("t1", "ghost", Message::user("ghost", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ColloquyError::NotFound(_)));

        // Failure leaves the sequence unchanged
        let history = store.history("t1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content.render(), "one");
    }

    #[tokio::test]
    async fn test_unknown_thread_history_is_empty() {
        let store = MemoryMessageStore::new();
        assert!(store.history("missing").await.unwrap().is_empty());
        assert!(store.list("missing").await.unwrap().is_empty());
    }
}
