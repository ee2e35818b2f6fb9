//! Context assembly for Juliet.
//!
//! Builds the prompt for each user request from a registry of adapters:
//!
//! | Module | Role |
//! |--------|------|
//! | [`ranker`] | Adaptive similarity threshold and tagging |
//! | [`sources`] | Semantic / episodic / procedural / fact retrieval |
//! | [`recency`] | Last N turns, verbatim |
//! | [`builtin`] | Timestamp, user request, assistant prefix |
//! | [`pipeline`] | Ordered registry and assembly |
//! | [`session`] | Assemble → complete → persist → cache |

pub mod adapter;
pub mod builtin;
pub mod pipeline;
pub mod ranker;
pub mod recency;
pub mod session;
pub mod sources;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use adapter::ContextAdapter;
pub use builtin::{AssistantPrefixAdapter, TimestampAdapter, UserRequestAdapter};
pub use pipeline::{AdapterContribution, AssembledPrompt, AssemblyMetadata, ContextPipeline, SkippedAdapter};
pub use ranker::{RankedChunk, Ranker, TaggingPolicy, render_block, sanitize_tag, source_file_tag};
pub use recency::RecencyCache;
pub use session::{ChatSession, SessionOptions, TurnOutcome};
pub use sources::CollectionAdapter;
