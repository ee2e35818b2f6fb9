//! `juliet stats` — Show memory statistics.

use juliet_core::store::VectorStore;
use juliet_memory::AuditLog;

use super::runtime::Runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let config = &runtime.config;

    println!();
    println!("  Juliet Memory");
    println!("  ─────────────");
    println!("  Assistant:   {}", config.identity.assistant_name);
    println!("  User:        {}", config.identity.user_name);
    println!("  Store:       {} ({})", runtime.store.name(), config.store_dir().display());
    println!();

    let names = runtime.store.collection_names().await;
    if names.is_empty() {
        println!("  No collections yet.");
    }
    for name in &names {
        let count = runtime.store.count(name).await?;
        println!("  {name:<14} {count} documents");
    }

    let conversations = runtime.conversations();
    println!();
    println!(
        "  Conversations: {} ({} turns)",
        conversations.len().await,
        conversations.turn_count().await
    );

    match config.audit_path() {
        Some(path) => println!(
            "  Audit log:     {} records ({})",
            AuditLog::read_all(&path).len(),
            path.display()
        ),
        None => println!("  Audit log:     disabled"),
    }
    println!();
    Ok(())
}
