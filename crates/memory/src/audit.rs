//! Audit log — append-only JSONL record of everything written to memory.
//!
//! Each line is `{"id": ..., "text": ..., "metadata": {...}}`, one per
//! stored document. The file is never rewritten, only appended to, so it
//! doubles as a human-inspectable export of the vector store.

use juliet_core::error::PersistenceError;
use juliet_core::store::{DocumentRecord, Metadata};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl From<&DocumentRecord> for AuditRecord {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            id: record.id.clone(),
            text: record.text.clone(),
            metadata: record.metadata.clone(),
        }
    }
}

/// An append-only JSONL file. Appends through one instance are serialized.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records, one JSON line each, in a single write.
    ///
    /// Parent directories are created as needed. Returns the number of lines
    /// written.
    pub async fn append(&self, records: &[AuditRecord]) -> Result<usize, PersistenceError> {
        if records.is_empty() {
            return Ok(0);
        }

        let append_err = |reason: String| PersistenceError::AuditAppend {
            path: self.path.display().to_string(),
            reason,
        };

        let mut buf = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| append_err(format!("Failed to serialize record: {e}")))?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| append_err(format!("Failed to create audit directory: {e}")))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| append_err(format!("Failed to open audit file: {e}")))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| append_err(format!("Failed to write audit file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| append_err(format!("Failed to flush audit file: {e}")))?;

        debug!(path = %self.path.display(), count = records.len(), "Audit records appended");
        Ok(records.len())
    }

    /// Read every record back. Corrupted lines are skipped with a warning;
    /// a missing file reads as empty.
    pub fn read_all(path: &Path) -> Vec<AuditRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted audit line");
                    None
                }
            })
            .collect()
    }
}
