//! Long-term memory for Juliet.
//!
//! - [`LocalVectorStore`]: in-process [`VectorStore`](juliet_core::VectorStore)
//!   with optional JSONL persistence
//! - [`MemoryWriter`]: turn / chunk / fact persistence with audit logging
//! - [`ConversationStore`]: full conversation history as JSON

pub mod audit;
pub mod conversation;
pub mod facts;
pub mod local;
pub mod persistence;
pub mod vector;

pub use audit::{AuditLog, AuditRecord};
pub use conversation::{ConversationStore, Participants};
pub use facts::{FACTS_COLLECTION, FactTriple};
pub use local::LocalVectorStore;
pub use persistence::{MemoryWriter, PersistenceReport};
pub use vector::{Embedder, HashingEmbedder, cosine_distance, cosine_similarity};
