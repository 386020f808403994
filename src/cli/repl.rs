//! Interactive REPL for Colloquy
//!
//! Provides the main user interaction loop: plain input becomes a chat
//! invocation against the current thread, slash-style commands manage
//! threads.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::agent::ChatService;
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{ChatRequest, Config, Prompt, Result, Role};
use crate::llm::OpenAiClient;
use crate::relay::RelayEvent;
use crate::store::{MemoryMessageStore, Thread};
use crate::tools::{ToolRegistry, WeatherTool};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    service: Arc<ChatService>,
    thread: Thread,
}

impl Repl {
    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Self {
        let provider = Arc::new(OpenAiClient::from_config(&config));
        let store = Arc::new(MemoryMessageStore::new());

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(WeatherTool::new()));

        let service = Arc::new(ChatService::new(provider, store, Arc::new(tools), &config));
        let thread = service.create_thread("New conversation");

        Self { service, thread }
    }

    /// The service behind this REPL
    pub fn service(&self) -> &Arc<ChatService> {
        &self.service
    }

    /// The currently open thread
    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    /// Switch the REPL to another thread
    pub fn set_thread(&mut self, thread: Thread) {
        self.thread = thread;
    }

    /// Run the REPL until exit
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break; // EOF
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, self).await? {
                CommandResult::Exit => break,
                CommandResult::Handled(output) => println!("{}\n", output),
                CommandResult::Continue(prompt) => self.send(&prompt).await?,
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Send one prompt to the current thread, printing the streamed response
    pub async fn send(&mut self, input: &str) -> Result<()> {
        let request = ChatRequest {
            prompt: Prompt {
                role: Role::User,
                content: input.to_string(),
                id: Uuid::new_v4().to_string(),
            },
            thread_id: self.thread.id.clone(),
            response_id: Uuid::new_v4().to_string(),
        };

        let mut stream = self.service.chat(request).await;
        let mut stdout = io::stdout();

        while let Some(event) = stream.next().await {
            match event {
                RelayEvent::Chunk(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                }
                RelayEvent::Error { error } => {
                    println!("\n[error] {}", error);
                }
            }
        }

        println!("\n");
        Ok(())
    }

    fn print_banner(&self) {
        println!("Colloquy - conversational agent runtime");
        println!("Thread: {} ({})", self.thread.title, self.thread.id);
        println!("Type 'help' for commands, 'exit' to quit.\n");
    }
}
