//! Wiring shared by the commands: config → store, writer, cache, pipeline.

use juliet_config::AppConfig;
use juliet_context::{ContextPipeline, RecencyCache};
use juliet_core::instructions::Instructions;
use juliet_core::store::VectorStore;
use juliet_memory::{ConversationStore, LocalVectorStore, MemoryWriter};
use std::sync::Arc;
use tracing::debug;

pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<LocalVectorStore>,
    pub writer: Arc<MemoryWriter>,
    pub recency: Arc<RecencyCache>,
    pub pipeline: Arc<ContextPipeline>,
}

impl Runtime {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: AppConfig) -> Self {
        let store_dir = config.store_dir();
        debug!(store = %store_dir.display(), "Opening vector store");
        let store = Arc::new(LocalVectorStore::open(&store_dir).with_max_batch_size(config.memory.max_batch_size));
        let dyn_store: Arc<dyn VectorStore> = store.clone();

        let instructions = Instructions::load(&config.instructions_path());
        let recency = Arc::new(RecencyCache::new(config.memory.cache_capacity));
        let pipeline = Arc::new(ContextPipeline::canonical(
            instructions,
            dyn_store.clone(),
            recency.clone(),
            &config,
        ));
        let writer = Arc::new(MemoryWriter::new(dyn_store));

        Self {
            config,
            store,
            writer,
            recency,
            pipeline,
        }
    }

    pub fn conversations(&self) -> ConversationStore {
        ConversationStore::load(self.config.conversations_path())
    }
}
