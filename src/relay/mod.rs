//! Streaming relay - token increments to wire events
//!
//! A direct forwarding stage between the agent loop and the client
//! connection: text chunks pass through in order, and a failure is reported
//! as exactly one error-shaped event, after which the stream is closed. The
//! relay never retries, buffers beyond its channel, or reorders.

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A wire-level event in the response stream
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A plain text chunk
    Chunk(String),
    /// Terminal error event; replaces the remainder of the stream
    Error { error: String },
}

impl RelayEvent {
    /// Render to the on-the-wire form: chunks pass through verbatim, errors
    /// serialize as a JSON object with an `error` field.
    pub fn wire(&self) -> String {
        match self {
            RelayEvent::Chunk(text) => text.clone(),
            RelayEvent::Error { error } => serde_json::json!({ "error": error }).to_string(),
        }
    }

    /// Whether this is the error event
    pub fn is_error(&self) -> bool {
        matches!(self, RelayEvent::Error { .. })
    }
}

/// Consumer side of a relay: an ordered stream of wire events
pub type RelayStream = ReceiverStream<RelayEvent>;

/// The client went away; forwarding should stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Producer side of a relay
///
/// Held by the agent loop for the duration of one invocation. Dropping it
/// ends the stream by natural exhaustion.
pub struct StreamRelay {
    tx: mpsc::Sender<RelayEvent>,
    terminated: bool,
}

/// Create a connected relay pair
pub fn channel(capacity: usize) -> (StreamRelay, RelayStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        StreamRelay {
            tx,
            terminated: false,
        },
        ReceiverStream::new(rx),
    )
}

impl StreamRelay {
    /// Forward one text chunk.
    ///
    /// Returns [`Disconnected`] when the consumer has dropped the stream.
    /// Chunks sent after the error event are discarded.
    pub async fn send_chunk(&mut self, text: impl Into<String>) -> Result<(), Disconnected> {
        if self.terminated {
            return Ok(());
        }

        self.tx
            .send(RelayEvent::Chunk(text.into()))
            .await
            .map_err(|_| Disconnected)
    }

    /// Emit the single terminal error event and close the relay.
    ///
    /// Subsequent sends of any kind are discarded.
    pub async fn send_error(&mut self, error: impl Into<String>) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        // The consumer may already be gone; nothing further to do either way.
        let _ = self.tx.send(RelayEvent::Error { error: error.into() }).await;
    }

    /// Whether the error event has been emitted
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}
