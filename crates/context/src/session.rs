//! Chat session — one request through the whole loop.
//!
//! ```text
//! request ─▶ pipeline ─▶ provider ─▶ Turn ─▶ MemoryWriter ─▶ RecencyCache
//!                                             └─▶ ConversationStore
//! ```
//!
//! The turn enters the recency cache only after the vector-store write
//! succeeded, so the short-term and long-term views never disagree about
//! what was remembered. Persistence problems are reported, not raised: the
//! user still gets their answer.

use juliet_config::AppConfig;
use juliet_core::error::{Error, Result};
use juliet_core::message::{ConversationId, Message, Turn};
use juliet_core::provider::{Provider, ProviderRequest};
use juliet_memory::{ConversationStore, MemoryWriter, PersistenceReport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::pipeline::{AssembledPrompt, AssemblyMetadata, ContextPipeline};
use crate::recency::RecencyCache;

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub conversation_id: ConversationId,
    pub user_name: String,
    pub assistant_name: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub episodic_collection: String,
    pub audit_path: Option<PathBuf>,
    /// Stripped from the front of the model's reply if it echoes it.
    pub assistant_prefix: String,
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            conversation_id: ConversationId::from(config.identity.conversation_id.as_str()),
            user_name: config.identity.user_name.clone(),
            assistant_name: config.identity.assistant_name.clone(),
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            episodic_collection: config.memory.episodic_collection.clone(),
            audit_path: config.audit_path(),
            assistant_prefix: config.context.assistant_prefix.clone(),
        }
    }
}

/// What one processed request produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn: Turn,
    pub prompt: AssemblyMetadata,
    pub persistence: PersistenceReport,
}

impl TurnOutcome {
    pub fn reply(&self) -> &str {
        &self.turn.response.content
    }
}

pub struct ChatSession {
    options: SessionOptions,
    pipeline: Arc<ContextPipeline>,
    provider: Arc<dyn Provider>,
    writer: Arc<MemoryWriter>,
    recency: Arc<RecencyCache>,
    conversations: Option<Arc<ConversationStore>>,
}

impl ChatSession {
    /// `recency` must be the same cache registered in `pipeline`.
    pub fn new(
        options: SessionOptions,
        pipeline: Arc<ContextPipeline>,
        provider: Arc<dyn Provider>,
        writer: Arc<MemoryWriter>,
        recency: Arc<RecencyCache>,
    ) -> Self {
        Self {
            options,
            pipeline,
            provider,
            writer,
            recency,
            conversations: None,
        }
    }

    /// Also record every turn in a conversation store.
    pub fn with_conversations(mut self, store: Arc<ConversationStore>) -> Self {
        self.conversations = Some(store);
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn recency(&self) -> &Arc<RecencyCache> {
        &self.recency
    }

    /// Assemble the prompt without calling the provider.
    pub async fn preview(&self, user_input: &str) -> Result<AssembledPrompt> {
        self.pipeline.build_messages(user_input).await
    }

    /// Run one full exchange.
    pub async fn process_turn(&self, user_input: &str) -> Result<TurnOutcome> {
        let user_input = user_input.trim();
        if user_input.is_empty() {
            return Err(Error::EmptyRequest);
        }

        let request = Message::user(&self.options.user_name, user_input);
        let prompt = self.pipeline.build_messages(user_input).await?;

        let mut provider_request = ProviderRequest::new(&self.options.model, prompt.messages);
        provider_request.temperature = self.options.temperature;
        provider_request.max_tokens = self.options.max_tokens;

        debug!(provider = self.provider.name(), model = %self.options.model, "Requesting completion");
        let completion = self.provider.complete(provider_request).await?;
        let reply = clean_reply(&completion.content, &self.options.assistant_prefix);

        let response = Message::assistant(&self.options.assistant_name, reply);
        let turn = Turn::new(self.options.conversation_id.clone(), request, response);

        let persistence = self
            .writer
            .store_turn(
                &self.options.conversation_id,
                &turn,
                &self.options.episodic_collection,
                self.options.audit_path.as_deref(),
            )
            .await;

        if persistence.store_ok() {
            self.recency.add_turn(turn.clone()).await;
        } else {
            warn!(
                turn = %turn.id,
                documents_written = persistence.documents_written,
                "Turn not cached: vector store write failed"
            );
        }

        if let Some(conversations) = &self.conversations
            && let Err(e) = conversations.append_turn(turn.clone()).await
        {
            warn!(turn = %turn.id, error = %e, "Failed to record turn in conversation store");
        }

        info!(
            turn = %turn.id,
            tokens = prompt.metadata.estimated_tokens,
            persisted = persistence.is_ok(),
            "Turn complete"
        );

        Ok(TurnOutcome {
            turn,
            prompt: prompt.metadata,
            persistence,
        })
    }
}

/// Trim the reply and drop an echoed opening prefix or a trailing closing tag.
fn clean_reply(content: &str, prefix: &str) -> String {
    let mut reply = content.trim();
    let prefix = prefix.trim();
    if !prefix.is_empty() {
        reply = reply.strip_prefix(prefix).unwrap_or(reply).trim_start();
        if let Some(name) = prefix.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
            let closing = format!("</{name}>");
            reply = reply.strip_suffix(closing.as_str()).unwrap_or(reply).trim_end();
        }
    }
    reply.to_string()
}
