//! Collection-backed adapters: semantic, episodic, procedural and fact memory.
//!
//! All four are the same [`CollectionAdapter`] bound to a different
//! `(collection, tagging policy)` pair. Adding a new memory source means
//! constructing another one, not writing new control flow.

use async_trait::async_trait;
use juliet_config::RankerConfig;
use juliet_core::error::RetrievalError;
use juliet_core::message::PromptMessage;
use juliet_core::store::VectorStore;
use juliet_memory::FACTS_COLLECTION;
use std::sync::Arc;
use tracing::debug;

use crate::adapter::ContextAdapter;
use crate::ranker::{Ranker, TaggingPolicy, render_block};

pub const SEMANTIC_COLLECTION: &str = "semantic";
pub const EPISODIC_COLLECTION: &str = "episodic";
pub const PROCEDURAL_COLLECTION: &str = "procedural";

/// Queries one collection and emits at most one tagged system message.
pub struct CollectionAdapter {
    store: Arc<dyn VectorStore>,
    collection: String,
    policy: TaggingPolicy,
    ranker: Ranker,
    outer_tag: Option<String>,
}

impl CollectionAdapter {
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        policy: TaggingPolicy,
        ranker: RankerConfig,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            policy,
            ranker: Ranker::new(ranker),
            outer_tag: None,
        }
    }

    /// Ingested documents, tagged by source file.
    pub fn semantic(store: Arc<dyn VectorStore>, ranker: RankerConfig) -> Self {
        Self::new(store, SEMANTIC_COLLECTION, TaggingPolicy::SourceFile, ranker)
    }

    /// Past conversation turns, tagged by role.
    pub fn episodic(store: Arc<dyn VectorStore>, collection: impl Into<String>, ranker: RankerConfig) -> Self {
        Self::new(store, collection, TaggingPolicy::Role, ranker)
    }

    /// How-to knowledge, untagged.
    pub fn procedural(store: Arc<dyn VectorStore>, ranker: RankerConfig) -> Self {
        Self::new(store, PROCEDURAL_COLLECTION, TaggingPolicy::None, ranker)
    }

    /// `subject | predicate | object` triples, untagged.
    pub fn facts(store: Arc<dyn VectorStore>, ranker: RankerConfig) -> Self {
        Self::new(store, FACTS_COLLECTION, TaggingPolicy::None, ranker)
    }

    /// Wrap the block in `tag` instead of the collection name.
    pub fn with_outer_tag(mut self, tag: impl Into<String>) -> Self {
        self.outer_tag = Some(tag.into());
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn policy(&self) -> TaggingPolicy {
        self.policy
    }
}

#[async_trait]
impl ContextAdapter for CollectionAdapter {
    fn requires_user_request(&self) -> bool {
        true
    }

    async fn build_messages(&self, user_request: Option<&str>) -> Result<Vec<PromptMessage>, RetrievalError> {
        let Some(query) = user_request.map(str::trim).filter(|q| !q.is_empty()) else {
            return Ok(Vec::new());
        };

        let result = self
            .store
            .query(&self.collection, query, self.ranker.fetch_k())
            .await?;
        result.validate(&self.collection)?;

        let ranked = self.ranker.rank(&result, self.policy);
        debug!(
            collection = %self.collection,
            fetched = result.len(),
            kept = ranked.len(),
            "Ranked retrieval"
        );

        let tag = self.outer_tag.as_deref().unwrap_or(&self.collection);
        Ok(render_block(tag, &ranked)
            .map(PromptMessage::system)
            .into_iter()
            .collect())
    }
}
