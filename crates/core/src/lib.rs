//! # Juliet Core
//!
//! Domain types, traits, and error definitions for the Juliet context
//! pipeline. This crate has **no framework dependencies**; it defines the
//! domain model that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates:
//! - [`VectorStore`] — long-term memory (`juliet-memory`)
//! - [`Provider`] — completion backend (`juliet-providers`)

pub mod error;
pub mod instructions;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, PersistenceError, ProviderError, Result, RetrievalError};
pub use instructions::Instructions;
pub use message::{Conversation, ConversationId, Message, PromptMessage, Role, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use store::{DocumentRecord, Metadata, QueryResult, VectorStore, create_batches};
