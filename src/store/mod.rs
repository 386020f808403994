//! Store module - thread metadata and message history
//!
//! Thread metadata and message sequences are owned independently: deleting a
//! thread's metadata does not touch its messages, and message history can
//! exist for a thread whose metadata is gone.

pub mod messages;
pub mod threads;

pub use messages::{MemoryMessageStore, MessageStore, TranscriptMessage};
pub use threads::{Thread, ThreadRegistry};
