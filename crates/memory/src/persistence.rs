//! Turn persistence — writing exchanges, document chunks and facts back
//! into long-term memory.
//!
//! Every write goes to two independent sinks:
//! 1. the vector store, in batches no larger than its `max_batch_size`
//! 2. optionally, an append-only audit file (see [`crate::audit`])
//!
//! A failure in one sink never prevents the other from being attempted.
//! Both outcomes are collected into a [`PersistenceReport`].

use chrono::Utc;
use juliet_core::error::{Error, PersistenceError};
use juliet_core::message::{ConversationId, Message, Turn};
use juliet_core::store::{DocumentRecord, Metadata, VectorStore, create_batches};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditLog, AuditRecord};
use crate::facts::{FACTS_COLLECTION, FactTriple};

/// Outcome of a persistence call.
#[derive(Debug, Clone, Default)]
pub struct PersistenceReport {
    /// Documents accepted by the vector store
    pub documents_written: usize,
    /// Lines appended to the audit file
    pub audit_lines: usize,
    pub store_error: Option<PersistenceError>,
    pub audit_error: Option<PersistenceError>,
}

impl PersistenceReport {
    pub fn is_ok(&self) -> bool {
        self.store_error.is_none() && self.audit_error.is_none()
    }

    /// Whether the vector-store side succeeded, regardless of the audit.
    pub fn store_ok(&self) -> bool {
        self.store_error.is_none()
    }

    /// Convert into a `Result`, naming both failures when either occurred.
    pub fn into_result(self) -> juliet_core::Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(Error::Persistence {
                store: self.store_error,
                audit: self.audit_error,
            })
        }
    }
}

/// Writes documents into a [`VectorStore`] and an optional audit file.
pub struct MemoryWriter {
    store: Arc<dyn VectorStore>,
    audit_logs: Mutex<HashMap<PathBuf, Arc<AuditLog>>>,
}

impl MemoryWriter {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            audit_logs: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Persist one completed exchange as `{turn_id}_req` and `{turn_id}_res`.
    pub async fn store_turn(
        &self,
        conversation_id: &ConversationId,
        turn: &Turn,
        collection: &str,
        audit_path: Option<&Path>,
    ) -> PersistenceReport {
        self.store_batch(conversation_id, std::slice::from_ref(turn), collection, audit_path)
            .await
    }

    /// Persist several exchanges in one pass.
    pub async fn store_batch(
        &self,
        conversation_id: &ConversationId,
        turns: &[Turn],
        collection: &str,
        audit_path: Option<&Path>,
    ) -> PersistenceReport {
        if let Some(err) = turns.iter().find_map(|t| t.validate().err()) {
            warn!(conversation = %conversation_id, error = %err, "Refusing malformed turn");
            return PersistenceReport {
                store_error: Some(err),
                ..Default::default()
            };
        }

        let records: Vec<DocumentRecord> = turns
            .iter()
            .flat_map(|turn| {
                [
                    turn_document(conversation_id, turn, &turn.request, "req"),
                    turn_document(conversation_id, turn, &turn.response, "res"),
                ]
            })
            .collect();

        debug!(
            conversation = %conversation_id,
            turns = turns.len(),
            collection,
            "Persisting turns"
        );
        self.write(collection, records, audit_path).await
    }

    /// Store pre-chunked document text for the semantic adapter.
    ///
    /// `source_path` is the full path of the original file; the file name and
    /// extension are derived from it. Blank chunks are skipped but still
    /// count towards `total_chunks` and keep their `chunk_index`.
    pub async fn ingest_chunks(
        &self,
        source_path: &Path,
        chunks: &[String],
        author: Option<&str>,
        collection: &str,
        audit_path: Option<&Path>,
    ) -> PersistenceReport {
        let source_file = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());
        let file_type = source_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let ingested_at = Utc::now().to_rfc3339();
        let total_chunks = chunks.len();

        let records: Vec<DocumentRecord> = chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.trim().is_empty())
            .map(|(index, chunk)| {
                let mut metadata = Metadata::new();
                metadata.insert("source_file".into(), json!(source_file));
                metadata.insert("source_path".into(), json!(source_path.display().to_string()));
                metadata.insert("file_type".into(), json!(file_type));
                metadata.insert("chunk_index".into(), json!(index));
                metadata.insert("total_chunks".into(), json!(total_chunks));
                metadata.insert("ingested_at".into(), json!(ingested_at));
                if let Some(author) = author.filter(|a| !a.trim().is_empty()) {
                    metadata.insert("author".into(), json!(author));
                }
                DocumentRecord {
                    id: Uuid::new_v4().to_string(),
                    text: chunk.trim().to_string(),
                    metadata,
                }
            })
            .collect();

        if records.is_empty() {
            info!(source = %source_file, "Nothing to ingest");
            return PersistenceReport::default();
        }

        info!(source = %source_file, chunks = records.len(), collection, "Ingesting document");
        self.write(collection, records, audit_path).await
    }

    /// Store a fact triple in the `facts` collection.
    pub async fn store_fact(&self, fact: &FactTriple, audit_path: Option<&Path>) -> PersistenceReport {
        if fact.is_blank() {
            return PersistenceReport {
                store_error: Some(PersistenceError::InvalidInput(format!(
                    "fact has an empty part: '{fact}'"
                ))),
                ..Default::default()
            };
        }

        let mut metadata = Metadata::new();
        metadata.insert("subject".into(), json!(fact.subject.trim()));
        metadata.insert("predicate".into(), json!(fact.predicate.trim()));
        metadata.insert("object".into(), json!(fact.object.trim()));
        metadata.insert("created_at".into(), json!(Utc::now().to_rfc3339()));

        let record = DocumentRecord {
            id: fact.document_id(),
            text: fact.to_document(),
            metadata,
        };
        self.write(FACTS_COLLECTION, vec![record], audit_path).await
    }

    async fn write(
        &self,
        collection: &str,
        records: Vec<DocumentRecord>,
        audit_path: Option<&Path>,
    ) -> PersistenceReport {
        let mut report = PersistenceReport::default();
        let audit_records: Vec<AuditRecord> = match audit_path {
            Some(_) => records.iter().map(AuditRecord::from).collect(),
            None => Vec::new(),
        };

        let (written, store_error) = self.write_store(collection, records).await;
        report.documents_written = written;
        if let Some(e) = store_error {
            warn!(collection, written, error = %e, "Vector store write failed");
            report.store_error = Some(e);
        }

        if let Some(path) = audit_path {
            let log = self.audit_log(path).await;
            match log.append(&audit_records).await {
                Ok(lines) => report.audit_lines = lines,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Audit append failed");
                    report.audit_error = Some(e);
                }
            }
        }

        report
    }

    /// Write every batch, stopping at the first failure. Returns how many
    /// documents landed before it.
    async fn write_store(
        &self,
        collection: &str,
        records: Vec<DocumentRecord>,
    ) -> (usize, Option<PersistenceError>) {
        if let Err(e) = self.store.get_or_create_collection(collection).await {
            let err = PersistenceError::StoreWrite {
                collection: collection.to_string(),
                reason: e.to_string(),
            };
            return (0, Some(err));
        }

        let mut written = 0;
        for batch in create_batches(records, self.store.max_batch_size()) {
            let len = batch.len();
            if let Err(e) = self.store.add(collection, batch).await {
                return (written, Some(e));
            }
            written += len;
        }
        (written, None)
    }

    async fn audit_log(&self, path: &Path) -> Arc<AuditLog> {
        let mut logs = self.audit_logs.lock().await;
        Arc::clone(
            logs.entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(AuditLog::new(path))),
        )
    }
}

fn turn_document(conversation_id: &ConversationId, turn: &Turn, message: &Message, message_type: &str) -> DocumentRecord {
    let mut metadata = Metadata::new();
    metadata.insert("conversation_id".into(), json!(conversation_id.as_str()));
    metadata.insert("turn_id".into(), json!(turn.id));
    metadata.insert("message_type".into(), json!(message_type));
    metadata.insert("role".into(), json!(message.role.as_str()));
    metadata.insert("speaker".into(), json!(message.speaker));
    metadata.insert("timestamp".into(), json!(message.timestamp.to_rfc3339()));

    DocumentRecord {
        id: format!("{}_{message_type}", turn.id),
        text: message.to_memory_string(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalVectorStore;
    use async_trait::async_trait;
    use juliet_core::error::RetrievalError;
    use juliet_core::store::QueryResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_turn(conversation: &ConversationId) -> Turn {
        Turn::new(
            conversation.clone(),
            Message::user("wallscreet", "What's my favorite color?"),
            Message::assistant("juliet", "You told me it's green."),
        )
    }

    /// Store that accepts the first `accept` batches, rejects the rest and
    /// counts `add` calls.
    struct FailingStore {
        adds: AtomicUsize,
        accept: usize,
        batch_size: usize,
    }

    impl FailingStore {
        fn new() -> Self {
            Self::accepting(0, 10)
        }

        fn accepting(accept: usize, batch_size: usize) -> Self {
            Self {
                adds: AtomicUsize::new(0),
                accept,
                batch_size,
            }
        }
    }

    #[async_trait]
    impl VectorStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn get_or_create_collection(&self, _name: &str) -> Result<(), RetrievalError> {
            Ok(())
        }

        async fn query(&self, _c: &str, _q: &str, _n: usize) -> Result<QueryResult, RetrievalError> {
            Ok(QueryResult::default())
        }

        async fn add(&self, collection: &str, _records: Vec<DocumentRecord>) -> Result<(), PersistenceError> {
            if self.adds.fetch_add(1, Ordering::SeqCst) < self.accept {
                return Ok(());
            }
            Err(PersistenceError::StoreWrite {
                collection: collection.into(),
                reason: "disk full".into(),
            })
        }

        fn max_batch_size(&self) -> usize {
            self.batch_size
        }

        async fn count(&self, _collection: &str) -> Result<usize, RetrievalError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn store_turn_writes_two_documents_and_two_audit_lines() {
        let dir = tempfile::tempdir().unwrap();
        let audit = dir.path().join("isos").join("juliet").join("episodic_memory.jsonl");
        let store = Arc::new(LocalVectorStore::in_memory());
        let writer = MemoryWriter::new(store.clone());
        let conversation = ConversationId::from("c1");
        let turn = sample_turn(&conversation);

        let report = writer.store_turn(&conversation, &turn, "episodic", Some(&audit)).await;
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.documents_written, 2);
        assert_eq!(report.audit_lines, 2);
        assert_eq!(store.count("episodic").await.unwrap(), 2);

        let lines = AuditLog::read_all(&audit);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, format!("{}_req", turn.id));
        assert_eq!(lines[1].id, format!("{}_res", turn.id));
        assert_eq!(lines[0].metadata["message_type"], "req");
        assert_eq!(lines[1].metadata["role"], "assistant");
        assert_eq!(lines[0].metadata["conversation_id"], "c1");
        assert_eq!(lines[0].metadata["speaker"], "wallscreet");
        assert!(lines[0].text.starts_with("wallscreet @ "));
    }

    #[tokio::test]
    async fn store_turn_without_audit_path_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MemoryWriter::new(Arc::new(LocalVectorStore::in_memory()));
        let conversation = ConversationId::from("c1");

        let report = writer
            .store_turn(&conversation, &sample_turn(&conversation), "episodic", None)
            .await;
        assert!(report.is_ok());
        assert_eq!(report.audit_lines, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn store_batch_respects_max_batch_size() {
        let store = Arc::new(LocalVectorStore::in_memory().with_max_batch_size(3));
        let writer = MemoryWriter::new(store.clone());
        let conversation = ConversationId::from("c1");
        let turns: Vec<_> = (0..4).map(|_| sample_turn(&conversation)).collect();

        let report = writer.store_batch(&conversation, &turns, "episodic", None).await;
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.documents_written, 8);
        assert_eq!(store.count("episodic").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn store_failure_still_appends_audit() {
        let dir = tempfile::tempdir().unwrap();
        let audit = dir.path().join("audit.jsonl");
        let store = Arc::new(FailingStore::new());
        let writer = MemoryWriter::new(store.clone());
        let conversation = ConversationId::from("c1");

        let report = writer
            .store_turn(&conversation, &sample_turn(&conversation), "episodic", Some(&audit))
            .await;
        assert!(!report.store_ok());
        assert!(report.audit_error.is_none());
        assert_eq!(report.audit_lines, 2);
        assert_eq!(store.adds.load(Ordering::SeqCst), 1);

        let err = report.into_result().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("disk full"));
        assert!(text.contains("audit: ok"));
    }

    #[tokio::test]
    async fn malformed_turn_is_rejected_before_writing() {
        let store = Arc::new(LocalVectorStore::in_memory());
        let writer = MemoryWriter::new(store.clone());
        let conversation = ConversationId::from("c1");
        let swapped = Turn::new(
            conversation.clone(),
            Message::assistant("juliet", "hello"),
            Message::user("wallscreet", "hi"),
        );

        let report = writer.store_turn(&conversation, &swapped, "episodic", None).await;
        assert!(matches!(report.store_error, Some(PersistenceError::InvalidInput(_))));
        assert_eq!(report.documents_written, 0);
        assert_eq!(store.count("episodic").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn partial_store_write_keeps_written_count() {
        let store = Arc::new(FailingStore::accepting(1, 1));
        let writer = MemoryWriter::new(store.clone());
        let conversation = ConversationId::from("c1");

        let report = writer
            .store_turn(&conversation, &sample_turn(&conversation), "episodic", None)
            .await;
        assert!(!report.store_ok());
        assert_eq!(report.documents_written, 1);
        assert_eq!(store.adds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn audit_failure_is_reported_independently() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the audit file should be makes the append fail.
        let audit = dir.path().join("audit.jsonl");
        std::fs::create_dir_all(&audit).unwrap();
        let store = Arc::new(LocalVectorStore::in_memory());
        let writer = MemoryWriter::new(store.clone());
        let conversation = ConversationId::from("c1");

        let report = writer
            .store_turn(&conversation, &sample_turn(&conversation), "episodic", Some(&audit))
            .await;
        assert!(report.store_ok());
        assert!(report.audit_error.is_some());
        assert_eq!(store.count("episodic").await.unwrap(), 2);
        assert!(matches!(
            report.into_result(),
            Err(Error::Persistence { store: None, audit: Some(_) })
        ));
    }

    #[tokio::test]
    async fn ingest_chunks_sets_source_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let audit = dir.path().join("ingest.jsonl");
        let store = Arc::new(LocalVectorStore::in_memory());
        let writer = MemoryWriter::new(store.clone());
        let chunks = vec![
            "Rust ownership rules.".to_string(),
            "   ".to_string(),
            "Borrowing and lifetimes.".to_string(),
        ];

        let report = writer
            .ingest_chunks(
                Path::new("/docs/My Notes v2.TXT"),
                &chunks,
                Some("wallscreet"),
                "semantic",
                Some(&audit),
            )
            .await;
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.documents_written, 2);

        let lines = AuditLog::read_all(&audit);
        assert_eq!(lines.len(), 2);
        let meta = &lines[1].metadata;
        assert_eq!(meta["source_file"], "My Notes v2.TXT");
        assert_eq!(meta["source_path"], "/docs/My Notes v2.TXT");
        assert_eq!(meta["file_type"], ".txt");
        assert_eq!(meta["chunk_index"], 2);
        assert_eq!(meta["total_chunks"], 3);
        assert_eq!(meta["author"], "wallscreet");
        assert!(meta.contains_key("ingested_at"));
    }

    #[tokio::test]
    async fn ingest_of_blank_chunks_is_a_noop() {
        let store = Arc::new(LocalVectorStore::in_memory());
        let writer = MemoryWriter::new(store.clone());
        let report = writer
            .ingest_chunks(Path::new("empty.md"), &["  ".to_string()], None, "semantic", None)
            .await;
        assert!(report.is_ok());
        assert_eq!(report.documents_written, 0);
        assert_eq!(store.count("semantic").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_fact_deduplicates() {
        let store = Arc::new(LocalVectorStore::in_memory());
        let writer = MemoryWriter::new(store.clone());

        let first = writer.store_fact(&FactTriple::new("Alice", "likes", "tea"), None).await;
        let again = writer.store_fact(&FactTriple::new("alice", "Likes", "Tea"), None).await;
        assert!(first.is_ok() && again.is_ok());
        assert_eq!(store.count(FACTS_COLLECTION).await.unwrap(), 1);

        let result = store.query(FACTS_COLLECTION, "alice tea", 1).await.unwrap();
        assert_eq!(result.documents[0], "alice | Likes | Tea");
    }

    #[tokio::test]
    async fn blank_fact_is_rejected() {
        let writer = MemoryWriter::new(Arc::new(LocalVectorStore::in_memory()));
        let report = writer.store_fact(&FactTriple::new("Alice", "", "tea"), None).await;
        assert!(matches!(report.store_error, Some(PersistenceError::InvalidInput(_))));
    }
}
