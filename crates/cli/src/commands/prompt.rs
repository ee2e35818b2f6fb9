//! `juliet prompt` — Show the assembled prompt for a message (dry run).

use super::runtime::Runtime;

pub async fn run(message: String, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let prompt = runtime.pipeline.build_messages(&message).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prompt.messages)?);
        return Ok(());
    }

    for (i, m) in prompt.messages.iter().enumerate() {
        println!("── [{i}] {} ──", m.role);
        println!("{}", m.content);
    }
    println!();
    println!(
        "~{} tokens across {} messages{}",
        prompt.metadata.estimated_tokens,
        prompt.messages.len(),
        if prompt.metadata.over_budget { " (over budget)" } else { "" }
    );
    for skipped in &prompt.metadata.skipped {
        println!("skipped {}: {}", skipped.name, skipped.error);
    }
    Ok(())
}
