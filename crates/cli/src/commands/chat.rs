//! `juliet chat` — Interactive or single-message chat mode.

use juliet_config::AppConfig;
use juliet_context::{ChatSession, SessionOptions, TurnOutcome};
use juliet_core::error::Error;
use juliet_core::message::ConversationId;
use juliet_memory::Participants;
use juliet_providers::OpenAiCompatProvider;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use super::runtime::Runtime;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let config = &runtime.config;

    // Check for API key early and give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    JULIET_API_KEY   (generic)");
        eprintln!("    XAI_API_KEY      (for xAI)");
        eprintln!("    OPENAI_API_KEY   (for OpenAI)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config.provider)?);

    let conversations = Arc::new(runtime.conversations());
    let conversation_id = ConversationId::from(config.identity.conversation_id.as_str());
    conversations
        .get_or_start(
            &conversation_id,
            &Participants::human_and_bot(&config.identity.user_name, &config.identity.assistant_name),
        )
        .await?;

    let session = ChatSession::new(
        SessionOptions::from_config(config),
        runtime.pipeline.clone(),
        provider,
        runtime.writer.clone(),
        runtime.recency.clone(),
    )
    .with_conversations(conversations);

    if let Some(msg) = message {
        // Single message mode
        let outcome = session.process_turn(&msg).await?;
        report_persistence(&outcome);
        println!("{}", outcome.reply());
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Juliet — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.provider.name);
    println!("  Model:     {}", config.provider.model);
    println!("  Memory:    {}", config.user_data_dir().display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut rx = spawn_line_reader(tokio::io::stdin());

    print!("  {} > ", config.identity.user_name);
    std::io::stdout().flush()?;

    while let Some(input) = rx.recv().await {
        match session.process_turn(&input).await {
            Ok(outcome) => {
                println!();
                for text in outcome.reply().lines() {
                    println!("  {} > {text}", config.identity.assistant_name);
                }
                println!();
                report_persistence(&outcome);
            }
            Err(Error::EmptyRequest) => {}
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  {} > ", config.identity.user_name);
        std::io::stdout().flush()?;
    }

    println!("  Goodbye!");
    Ok(())
}

/// Read trimmed, non-empty lines on a background task until EOF or an
/// exit command.
fn spawn_line_reader<R>(input: R) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit") {
                break;
            }
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}

fn report_persistence(outcome: &TurnOutcome) {
    if let Some(e) = &outcome.persistence.store_error {
        match outcome.persistence.documents_written {
            0 => eprintln!("  [Warning] turn not saved to memory: {e}"),
            n => eprintln!("  [Warning] turn only partly saved to memory ({n} of 2 documents): {e}"),
        }
    }
    if let Some(e) = &outcome.persistence.audit_error {
        eprintln!("  [Warning] audit log not updated: {e}");
    }
    for skipped in &outcome.prompt.skipped {
        eprintln!("  [Warning] {} unavailable: {}", skipped.name, skipped.error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn line_reader_skips_blanks_and_stops_at_exit() {
        let mut rx = spawn_line_reader(&b"  hello \n\n   \nsecond\nexit\nignored\n"[..]);
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn line_reader_ends_at_eof() {
        let mut rx = spawn_line_reader(&b"only line"[..]);
        assert_eq!(rx.recv().await.as_deref(), Some("only line"));
        assert_eq!(rx.recv().await, None);
    }
}
