//! CLI commands
//!
//! Special commands that can be executed in the REPL; anything unrecognized
//! is treated as a chat prompt.

use crate::cli::repl::Repl;
use crate::core::Result;

/// Result of parsing a command
pub enum CommandResult {
    /// Continue processing as a chat prompt
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, repl: &mut Repl) -> Result<CommandResult> {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "threads" => {
            let threads = repl.service().threads();
            if threads.is_empty() {
                return Ok(CommandResult::Handled("No threads yet.".to_string()));
            }
            let current = repl.thread().id.clone();
            let listing = threads
                .iter()
                .map(|t| {
                    let marker = if t.id == current { "*" } else { " " };
                    format!("{} {}  {}  ({})", marker, t.id, t.title, t.created_at)
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(CommandResult::Handled(listing))
        }

        "new" => {
            let title = if args.is_empty() {
                "New conversation"
            } else {
                args
            };
            let thread = repl.service().create_thread(title);
            let output = format!("Switched to new thread: {} ({})", thread.title, thread.id);
            repl.set_thread(thread);
            Ok(CommandResult::Handled(output))
        }

        "open" => {
            if args.is_empty() {
                return Ok(CommandResult::Handled("Usage: open <thread-id>".to_string()));
            }
            match repl.service().thread(args) {
                Some(thread) => {
                    let output = format!("Switched to thread: {} ({})", thread.title, thread.id);
                    repl.set_thread(thread);
                    Ok(CommandResult::Handled(output))
                }
                None => Ok(CommandResult::Handled(format!("No thread with id {}", args))),
            }
        }

        "title" => {
            if args.is_empty() {
                return Ok(CommandResult::Handled("Usage: title <new title>".to_string()));
            }
            let updated = repl.service().rename_thread(&repl.thread().id, args)?;
            let output = format!("Thread renamed to: {}", updated.title);
            repl.set_thread(updated);
            Ok(CommandResult::Handled(output))
        }

        "delete" => {
            let removed = repl.service().delete_thread(&repl.thread().id);
            let thread = repl.service().create_thread("New conversation");
            let output = if removed {
                format!("Thread deleted. Switched to new thread {}", thread.id)
            } else {
                format!("Thread was already gone. Switched to new thread {}", thread.id)
            };
            repl.set_thread(thread);
            Ok(CommandResult::Handled(output))
        }

        "history" => {
            let messages = repl.service().thread_messages(&repl.thread().id).await?;
            if messages.is_empty() {
                return Ok(CommandResult::Handled("No messages yet.".to_string()));
            }
            let listing = messages
                .iter()
                .map(|m| {
                    format!(
                        "[{}] {}",
                        m.role,
                        m.content.as_deref().unwrap_or("(no content)")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(CommandResult::Handled(listing))
        }

        _ => Ok(CommandResult::Continue(input.to_string())),
    }
}

fn help_text() -> String {
    r#"Commands:
  threads          List all threads (* marks the open one)
  new [title]      Create a thread and switch to it
  open <id>        Switch to an existing thread
  title <text>     Rename the open thread
  delete           Delete the open thread's metadata
  history          Show the open thread's transcript
  help, ?          Show this help
  exit, quit, q    Leave the REPL

Anything else is sent to the agent as a chat prompt."#
        .to_string()
}
