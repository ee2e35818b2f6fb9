//! Fact triples — `subject | predicate | object` documents.

use serde::{Deserialize, Serialize};

/// Collection that fact documents are written to.
pub const FACTS_COLLECTION: &str = "facts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl FactTriple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Flat document text stored in the vector store.
    pub fn to_document(&self) -> String {
        format!(
            "{} | {} | {}",
            self.subject.trim(),
            self.predicate.trim(),
            self.object.trim()
        )
    }

    /// Stable id: the same fact (ignoring case) always maps to the same
    /// document, so restating it overwrites rather than duplicates.
    pub fn document_id(&self) -> String {
        format!("fact:{}", self.to_document().to_lowercase())
    }

    pub fn is_blank(&self) -> bool {
        self.subject.trim().is_empty()
            || self.predicate.trim().is_empty()
            || self.object.trim().is_empty()
    }
}

impl std::fmt::Display for FactTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_document())
    }
}
