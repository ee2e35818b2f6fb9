pub mod chat;
pub mod fact;
pub mod ingest;
pub mod onboard;
pub mod prompt;
pub mod runtime;
pub mod stats;
