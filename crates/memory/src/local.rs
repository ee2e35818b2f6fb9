//! Local vector store — in-process collections with optional JSONL persistence.
//!
//! Each collection is a list of documents plus their embeddings. Queries
//! embed the query text with the configured [`Embedder`] and rank every
//! document by cosine distance. Good enough for a personal assistant's
//! memory; swap in a real vector database behind [`VectorStore`] for more.
//!
//! Storage layout when opened on a directory:
//!
//! ```text
//! <dir>/semantic.jsonl
//! <dir>/episodic.jsonl
//! <dir>/facts.jsonl
//! ```
//!
//! Each line is a JSON-encoded [`DocumentRecord`]. Writes append; on load a
//! later line with the same id replaces the earlier one. Embeddings are not
//! persisted and are recomputed on load.

use async_trait::async_trait;
use juliet_core::error::{PersistenceError, RetrievalError};
use juliet_core::store::{DocumentRecord, QueryResult, VectorStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::vector::{Embedder, HashingEmbedder, cosine_distance};

/// Default batch limit for a single `add` call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 512;

struct StoredDocument {
    record: DocumentRecord,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Collection {
    documents: Vec<StoredDocument>,
    index: HashMap<String, usize>,
}

impl Collection {
    fn upsert(&mut self, doc: StoredDocument) {
        match self.index.get(&doc.record.id) {
            Some(&pos) => self.documents[pos] = doc,
            None => {
                self.index.insert(doc.record.id.clone(), self.documents.len());
                self.documents.push(doc);
            }
        }
    }
}

/// An in-process [`VectorStore`].
pub struct LocalVectorStore {
    dir: Option<PathBuf>,
    embedder: Arc<dyn Embedder>,
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    max_batch_size: usize,
}

impl LocalVectorStore {
    /// A purely in-memory store. Nothing touches disk.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            embedder: Arc::new(HashingEmbedder::default()),
            collections: Arc::new(RwLock::new(HashMap::new())),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Open (or create on first write) a store persisted under `dir`.
    ///
    /// Every `*.jsonl` file in the directory is loaded as a collection.
    /// Corrupted lines are skipped with a warning.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::open_with_embedder(dir, Arc::new(HashingEmbedder::default()))
    }

    pub fn open_with_embedder(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        let dir = dir.into();
        let collections = Self::load_from_disk(&dir, embedder.as_ref());
        debug!(
            dir = %dir.display(),
            collections = collections.len(),
            "Local vector store loaded"
        );
        Self {
            dir: Some(dir),
            embedder,
            collections: Arc::new(RwLock::new(collections)),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Names of all known collections, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn collection_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.jsonl"))
    }

    fn load_from_disk(dir: &Path, embedder: &dyn Embedder) -> HashMap<String, Collection> {
        let mut collections = HashMap::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return collections, // Directory doesn't exist yet, start empty
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read collection file");
                    continue;
                }
            };

            let mut collection = Collection::default();
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<DocumentRecord>(line) {
                    Ok(record) => {
                        let embedding = embedder.embed(&record.text);
                        collection.upsert(StoredDocument { record, embedding });
                    }
                    Err(e) => {
                        warn!(collection = name, error = %e, "Skipping corrupted document");
                    }
                }
            }
            collections.insert(name.to_string(), collection);
        }
        collections
    }

    async fn append_to_disk(&self, collection: &str, records: &[DocumentRecord]) -> Result<(), PersistenceError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let write_err = |reason: String| PersistenceError::StoreWrite {
            collection: collection.to_string(),
            reason,
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| write_err(format!("Failed to create store directory: {e}")))?;

        let mut buf = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| write_err(format!("Failed to serialize document: {e}")))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::collection_path(dir, collection))
            .await
            .map_err(|e| write_err(format!("Failed to open collection file: {e}")))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| write_err(format!("Failed to write collection file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| write_err(format!("Failed to flush collection file: {e}")))?;
        Ok(())
    }
}

fn valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<(), RetrievalError> {
        if !valid_collection_name(name) {
            return Err(RetrievalError::CollectionNotFound(name.to_string()));
        }
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query_text: &str,
        n_results: usize,
    ) -> Result<QueryResult, RetrievalError> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            debug!(collection, "Query against unknown collection");
            return Ok(QueryResult::default());
        };

        let query_embedding = self.embedder.embed(query_text);
        let mut scored: Vec<(f32, &StoredDocument)> = coll
            .documents
            .iter()
            .map(|doc| (cosine_distance(&query_embedding, &doc.embedding), doc))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(n_results);

        let mut result = QueryResult::default();
        for (distance, doc) in scored {
            result.documents.push(doc.record.text.clone());
            result.distances.push(distance);
            result.metadatas.push(doc.record.metadata.clone());
        }
        Ok(result)
    }

    async fn add(&self, collection: &str, records: Vec<DocumentRecord>) -> Result<(), PersistenceError> {
        if !valid_collection_name(collection) {
            return Err(PersistenceError::StoreWrite {
                collection: collection.to_string(),
                reason: "invalid collection name".into(),
            });
        }
        if records.len() > self.max_batch_size {
            return Err(PersistenceError::StoreWrite {
                collection: collection.to_string(),
                reason: format!(
                    "batch of {} exceeds max batch size {}",
                    records.len(),
                    self.max_batch_size
                ),
            });
        }
        if records.is_empty() {
            return Ok(());
        }

        self.append_to_disk(collection, &records).await?;

        let count = records.len();
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        for record in records {
            let embedding = self.embedder.embed(&record.text);
            coll.upsert(StoredDocument { record, embedding });
        }
        debug!(collection, count, "Documents added");
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn count(&self, collection: &str) -> Result<usize, RetrievalError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0))
    }
}
