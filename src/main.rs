//! Colloquy - Conversational Agent Runtime
//!
//! Main entry point for the CLI driver.

use clap::Parser;
use colloquy::{Config, Repl};
use tracing_subscriber::EnvFilter;

/// Colloquy - conversational agent runtime
#[derive(Parser, Debug)]
#[command(name = "colloquy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the model endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Model identifier
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "colloquy=debug"
    } else {
        "colloquy=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref base_url) = args.base_url {
        config.model.base_url = base_url.clone();
    }

    if let Some(ref model) = args.model {
        config.model.name = model.clone();
    }

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        let mut repl = Repl::with_config(config);
        repl.send(&prompt).await?;
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_config(config);
    repl.run().await?;

    Ok(())
}
