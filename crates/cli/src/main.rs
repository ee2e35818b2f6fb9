//! Juliet CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize config and instructions
//! - `chat`    — Interactive chat or single-message mode
//! - `prompt`  — Print the assembled prompt without calling the model
//! - `ingest`  — Add a text document to semantic memory
//! - `fact`    — Store a subject / predicate / object fact
//! - `stats`   — Show memory statistics

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "juliet",
    about = "Juliet — a personal assistant with layered long-term memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and instructions
    Onboard,

    /// Chat with Juliet
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the prompt that would be sent for MESSAGE
    Prompt {
        message: String,

        /// Print as JSON instead of a readable listing
        #[arg(long)]
        json: bool,
    },

    /// Ingest a UTF-8 text document into semantic memory
    Ingest {
        file: PathBuf,

        /// Author recorded in chunk metadata
        #[arg(long)]
        author: Option<String>,

        /// Target collection
        #[arg(long, default_value = "semantic")]
        collection: String,

        /// Approximate maximum characters per chunk
        #[arg(long, default_value_t = commands::ingest::DEFAULT_CHUNK_CHARS)]
        chunk_chars: usize,
    },

    /// Store a fact triple
    Fact {
        subject: String,
        predicate: String,
        object: String,
    },

    /// Show memory statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Prompt { message, json } => commands::prompt::run(message, json).await?,
        Commands::Ingest {
            file,
            author,
            collection,
            chunk_chars,
        } => commands::ingest::run(file, author, collection, chunk_chars).await?,
        Commands::Fact {
            subject,
            predicate,
            object,
        } => commands::fact::run(subject, predicate, object).await?,
        Commands::Stats => commands::stats::run().await?,
    }

    Ok(())
}
