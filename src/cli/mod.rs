//! CLI module - interactive driver for the chat service
//!
//! Contains the REPL and its command handling.

pub mod commands;
pub mod repl;

pub use repl::Repl;
