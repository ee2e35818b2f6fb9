//! `juliet fact` — Store a subject / predicate / object fact.

use juliet_memory::FactTriple;

use super::runtime::Runtime;

pub async fn run(subject: String, predicate: String, object: String) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let fact = FactTriple::new(subject, predicate, object);
    let audit = runtime.config.audit_path();

    runtime.writer.store_fact(&fact, audit.as_deref()).await.into_result()?;
    println!("Stored fact: {fact}");
    Ok(())
}
