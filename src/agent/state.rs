//! Per-invocation working state
//!
//! Tracks the transient working context of one chat invocation: the message
//! sequence driving model calls, plus the subset produced during this
//! invocation that must be reconciled into the store at completion.

use crate::core::Message;

/// States of the agent loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Calling the model capability
    Agent,
    /// Deciding between tool execution and termination
    Route,
    /// Executing the pending tool calls of a round
    Tools,
    /// Terminal state; the response is committed
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Agent => write!(f, "agent"),
            Phase::Route => write!(f, "route"),
            Phase::Tools => write!(f, "tools"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// Working context for one invocation
///
/// Materialized from store history at invocation start; only the messages
/// produced during the invocation are written back. Append-only while the
/// invocation runs.
#[derive(Debug)]
pub struct TurnContext {
    messages: Vec<Message>,
    pending: Vec<Message>,
    response_id: String,
    phase: Phase,
    rounds: usize,
}

impl TurnContext {
    /// Build the context from prior history plus the new user prompt
    pub fn new(history: Vec<Message>, prompt: Message, response_id: impl Into<String>) -> Self {
        let mut ctx = Self {
            messages: history,
            pending: Vec::new(),
            response_id: response_id.into(),
            phase: Phase::Agent,
            rounds: 0,
        };
        ctx.push(prompt);
        ctx
    }

    /// Append a newly produced message to the working context
    pub fn push(&mut self, message: Message) {
        self.messages.push(message.clone());
        self.pending.push(message);
    }

    /// The full message sequence for the next model call
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages produced this invocation, handed off for the store commit
    pub fn take_pending(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.pending)
    }

    /// The id pre-assigned to the forthcoming assistant message
    pub fn response_id(&self) -> &str {
        &self.response_id
    }

    /// Move to the given phase
    pub fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed tool rounds so far
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Record a completed tool round
    pub fn next_round(&mut self) {
        self.rounds += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_seeds_prompt_as_pending() {
        let history = vec![Message::assistant("a0", "earlier")];
        let ctx = TurnContext::new(history, Message::user("u1", "hi"), "r1");

        assert_eq!(ctx.messages().len(), 2);
        assert_eq!(ctx.messages()[1].id, "u1");
        assert_eq!(ctx.phase(), Phase::Agent);
        assert_eq!(ctx.response_id(), "r1");
    }

    #[test]
    fn test_take_pending_excludes_history() {
        let history = vec![Message::assistant("a0", "earlier")];
        let mut ctx = TurnContext::new(history, Message::user("u1", "hi"), "r1");
        ctx.push(Message::assistant("r1", "Hello"));

        let pending = ctx.take_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "u1");
        assert_eq!(pending[1].id, "r1");
        assert!(ctx.take_pending().is_empty());
    }

    #[test]
    fn test_round_counter() {
        let mut ctx = TurnContext::new(Vec::new(), Message::user("u1", "hi"), "r1");
        assert_eq!(ctx.rounds(), 0);
        ctx.next_round();
        ctx.next_round();
        assert_eq!(ctx.rounds(), 2);
    }
}
