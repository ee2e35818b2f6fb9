//! Vector store trait — the long-term memory collaborator.
//!
//! The context pipeline only needs a narrow surface from the vector database:
//! query a named collection for the nearest documents, add documents in
//! bounded batches, and report how large a batch may be. Everything else
//! (ANN indices, embeddings, on-disk formats) lives behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, RetrievalError};

/// Per-document metadata, kept as a flat JSON object.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Raw result of one query against one collection.
///
/// `documents`, `distances` and `metadatas` are parallel lists of equal
/// length, ordered by the store's own relevance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub documents: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<Metadata>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Check the parallel-list invariant.
    pub fn validate(&self, collection: &str) -> Result<(), RetrievalError> {
        if self.distances.len() != self.documents.len() || self.metadatas.len() != self.documents.len() {
            return Err(RetrievalError::MalformedResult {
                collection: collection.into(),
                reason: format!(
                    "documents={}, distances={}, metadatas={}",
                    self.documents.len(),
                    self.distances.len(),
                    self.metadatas.len()
                ),
            });
        }
        Ok(())
    }
}

/// A single document ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// The core VectorStore trait.
///
/// Implementations: local (in-process, optionally file-backed), test doubles.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "local").
    fn name(&self) -> &str;

    /// Ensure a collection exists.
    async fn get_or_create_collection(&self, name: &str) -> Result<(), RetrievalError>;

    /// Return up to `n_results` nearest documents for `query_text`.
    async fn query(
        &self,
        collection: &str,
        query_text: &str,
        n_results: usize,
    ) -> Result<QueryResult, RetrievalError>;

    /// Add documents. Callers must respect [`VectorStore::max_batch_size`].
    async fn add(&self, collection: &str, records: Vec<DocumentRecord>) -> Result<(), PersistenceError>;

    /// Largest number of documents accepted by a single `add` call.
    fn max_batch_size(&self) -> usize;

    /// Number of documents in a collection (0 when it does not exist).
    async fn count(&self, collection: &str) -> Result<usize, RetrievalError>;
}

/// Split records into batches of at most `max_batch_size` documents.
///
/// A zero limit is treated as one document per batch.
pub fn create_batches(records: Vec<DocumentRecord>, max_batch_size: usize) -> Vec<Vec<DocumentRecord>> {
    let size = max_batch_size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(records.len()));
    for record in records {
        current.push(record);
        if current.len() == size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
