//! Context pipeline — assembles the full prompt for one user request.
//!
//! # Layout
//!
//! | # | Source | Role |
//! |---|--------|------|
//! | 1 | `<system>` instructions | system |
//! | 2 | `<assistant_intro>` | assistant |
//! | 3 | `<focus>` | system |
//! | 4.. | registered adapters, in registration order | per adapter |
//!
//! The canonical registry is `timestamp`, `facts`, `semantic`, `procedural`,
//! `episodic`, `history`, `user_request`, `assistant_prefix`. The last two
//! always close the prompt: the live request, then an open assistant turn.
//!
//! # Failure policy
//!
//! Retrieval adapters run concurrently. An adapter that fails is skipped:
//! its block is left out, a warning is logged, and the skip is recorded in
//! [`AssemblyMetadata::skipped`]. Assembly itself only fails on a blank
//! request.
//!
//! # Determinism
//!
//! Output depends only on the registry, the instructions and the request.
//! Results are folded back in registration order regardless of which
//! retrieval finishes first.

use futures::future::join_all;
use juliet_config::AppConfig;
use juliet_core::error::{Error, Result};
use juliet_core::instructions::Instructions;
use juliet_core::message::PromptMessage;
use juliet_core::store::VectorStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapter::ContextAdapter;
use crate::builtin::{AssistantPrefixAdapter, TimestampAdapter, UserRequestAdapter};
use crate::recency::RecencyCache;
use crate::sources::{CollectionAdapter, SEMANTIC_COLLECTION};
use crate::token;

// ── Types ─────────────────────────────────────────────────────────────────

/// The assembled prompt plus how it was put together.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub messages: Vec<PromptMessage>,
    pub metadata: AssemblyMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Estimated tokens of the whole prompt.
    pub estimated_tokens: usize,
    /// Configured budget, if any.
    pub budget: Option<usize>,
    /// Whether the estimate exceeds the budget.
    pub over_budget: bool,
    /// One entry per adapter that ran successfully, in registration order.
    pub contributions: Vec<AdapterContribution>,
    /// Adapters whose retrieval failed.
    pub skipped: Vec<SkippedAdapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterContribution {
    pub name: String,
    pub messages: usize,
    pub tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedAdapter {
    pub name: String,
    pub error: String,
}

/// Adapters that always close the prompt, in this order.
const CLOSING_ADAPTERS: [&str; 2] = ["user_request", "assistant_prefix"];

// ── Pipeline ──────────────────────────────────────────────────────────────

pub struct ContextPipeline {
    instructions: Instructions,
    adapters: Vec<(String, Arc<dyn ContextAdapter>)>,
    max_context_tokens: Option<usize>,
}

impl ContextPipeline {
    /// An empty pipeline: only the three instruction messages.
    pub fn new(instructions: Instructions) -> Self {
        Self {
            instructions,
            adapters: Vec::new(),
            max_context_tokens: None,
        }
    }

    /// The canonical registry, wired from configuration.
    ///
    /// Retrieval sources disabled in `config.retrieval` are not registered.
    pub fn canonical(
        instructions: Instructions,
        store: Arc<dyn VectorStore>,
        recency: Arc<RecencyCache>,
        config: &AppConfig,
    ) -> Self {
        let ranker = config.retrieval.ranker;
        let mut pipeline = Self::new(instructions).with_max_context_tokens(config.context.max_context_tokens);

        pipeline.register("timestamp", Arc::new(TimestampAdapter::new()));
        if config.retrieval.facts {
            pipeline.register("facts", Arc::new(CollectionAdapter::facts(store.clone(), ranker)));
        }
        if config.retrieval.semantic {
            pipeline.register(
                SEMANTIC_COLLECTION,
                Arc::new(CollectionAdapter::semantic(store.clone(), ranker)),
            );
        }
        if config.retrieval.procedural {
            pipeline.register(
                "procedural",
                Arc::new(CollectionAdapter::procedural(store.clone(), ranker)),
            );
        }
        if config.retrieval.episodic {
            pipeline.register(
                "episodic",
                Arc::new(CollectionAdapter::episodic(
                    store,
                    config.memory.episodic_collection.clone(),
                    ranker,
                )),
            );
        }
        pipeline.register("history", recency);
        pipeline.register(
            "user_request",
            Arc::new(UserRequestAdapter::new(config.context.user_tag.clone())),
        );
        pipeline.register(
            "assistant_prefix",
            Arc::new(AssistantPrefixAdapter::new(config.context.assistant_prefix.clone())),
        );
        pipeline
    }

    /// Warn when an assembled prompt is estimated above `tokens`. Zero disables.
    pub fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = (tokens > 0).then_some(tokens);
        self
    }

    /// Register an adapter. Re-registering a name replaces it in place,
    /// keeping its original position. New names go before the closing
    /// `user_request` / `assistant_prefix` anchors when those are present.
    pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn ContextAdapter>) {
        let name = name.into();
        if let Some(slot) = self.adapters.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = adapter;
            return;
        }
        let closing = if CLOSING_ADAPTERS.contains(&name.as_str()) {
            None
        } else {
            self.adapters
                .iter()
                .position(|(n, _)| CLOSING_ADAPTERS.contains(&n.as_str()))
        };
        match closing {
            Some(pos) => self.adapters.insert(pos, (name, adapter)),
            None => self.adapters.push((name, adapter)),
        }
    }

    /// Remove an adapter. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.adapters.len();
        self.adapters.retain(|(n, _)| n != name);
        self.adapters.len() != before
    }

    /// Registered adapter names, in order.
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn instructions(&self) -> &Instructions {
        &self.instructions
    }

    /// Assemble the prompt for `user_request`.
    pub async fn build_messages(&self, user_request: &str) -> Result<AssembledPrompt> {
        if user_request.trim().is_empty() {
            return Err(Error::EmptyRequest);
        }

        let mut messages = vec![
            PromptMessage::system(format!("<system>{}</system>", self.instructions.system_message)),
            PromptMessage::assistant(format!(
                "<assistant_intro>{}</assistant_intro>",
                self.instructions.assistant_intro
            )),
            PromptMessage::system(format!("<focus>{}</focus>", self.instructions.assistant_focus)),
        ];

        let outputs = join_all(self.adapters.iter().map(|(_, adapter)| {
            let request = adapter.requires_user_request().then_some(user_request);
            adapter.build_messages(request)
        }))
        .await;

        let mut metadata = AssemblyMetadata {
            budget: self.max_context_tokens,
            ..Default::default()
        };

        for ((name, _), output) in self.adapters.iter().zip(outputs) {
            match output {
                Ok(produced) => {
                    let produced: Vec<PromptMessage> =
                        produced.into_iter().filter(|m| !m.content.is_empty()).collect();
                    metadata.contributions.push(AdapterContribution {
                        name: name.clone(),
                        messages: produced.len(),
                        tokens: token::estimate_messages_tokens(&produced),
                    });
                    messages.extend(produced);
                }
                Err(e) => {
                    warn!(adapter = %name, error = %e, "Context adapter failed, skipping");
                    metadata.skipped.push(SkippedAdapter {
                        name: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        metadata.estimated_tokens = token::estimate_messages_tokens(&messages);
        if let Some(budget) = self.max_context_tokens
            && metadata.estimated_tokens > budget
        {
            metadata.over_budget = true;
            warn!(
                estimated = metadata.estimated_tokens,
                budget, "Assembled prompt exceeds context budget"
            );
        }

        debug!(
            messages = messages.len(),
            tokens = metadata.estimated_tokens,
            skipped = metadata.skipped.len(),
            "Prompt assembled"
        );

        Ok(AssembledPrompt { messages, metadata })
    }
}
