//! Similarity ranker — adaptive thresholding of raw vector-store results.
//!
//! Given one query's documents, distances and metadata:
//!
//! 1. similarity `s = 1 - distance`
//! 2. threshold `= max(best / dynamic_multiplier, min_similarity)`
//! 3. drop documents below the threshold or blank after trimming
//! 4. tag each survivor according to the adapter's [`TaggingPolicy`]
//! 5. stable sort by similarity (descending), drop duplicates, keep `top_k`
//!
//! The relative cutoff means a strong best match raises the bar for the rest,
//! while a weak field of candidates is still bounded by the absolute floor.

use juliet_config::RankerConfig;
use juliet_core::store::{Metadata, QueryResult};
use regex_lite::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

static NON_ALNUM_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9]+").unwrap_or_else(|e| panic!("invalid tag pattern: {e}"))
});

/// How a retrieved document is wrapped before inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggingPolicy {
    /// `<{sanitized source_file}>…</…>` from the `source_file` metadata field
    SourceFile,
    /// `<{role}>…</…>` from the `role` metadata field
    Role,
    /// No inner tag
    None,
}

/// One surviving document, already tagged.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub similarity: f32,
    pub text: String,
}

/// Collapse non-alphanumeric runs to `_` and trim leading/trailing `_`.
/// Returns `None` when nothing usable is left.
pub fn sanitize_tag(raw: &str) -> Option<String> {
    let collapsed = NON_ALNUM_RUN.replace_all(raw, "_");
    let tag = collapsed.trim_matches('_');
    if tag.is_empty() { None } else { Some(tag.to_string()) }
}

/// Tag for a source file name: extension stripped, then sanitized.
///
/// `"My Notes v2.txt"` becomes `"My_Notes_v2"`.
pub fn source_file_tag(file_name: &str) -> Option<String> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    sanitize_tag(stem)
}

impl TaggingPolicy {
    /// The inner tag for a document, or `None` for untagged.
    /// Missing or non-string metadata falls back to untagged.
    pub fn tag_for(&self, metadata: Option<&Metadata>) -> Option<String> {
        let field = match self {
            TaggingPolicy::SourceFile => "source_file",
            TaggingPolicy::Role => "role",
            TaggingPolicy::None => return None,
        };
        let value = metadata?.get(field)?.as_str()?;
        match self {
            TaggingPolicy::SourceFile => source_file_tag(value),
            _ => sanitize_tag(value),
        }
    }

    pub fn apply(&self, text: &str, metadata: Option<&Metadata>) -> String {
        match self.tag_for(metadata) {
            Some(tag) => format!("<{tag}>{text}</{tag}>"),
            None => text.to_string(),
        }
    }
}

/// Ranks one query's results. Cheap to copy; holds only its parameters.
#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    config: RankerConfig,
}

impl Ranker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Number of candidates to request from the store.
    pub fn fetch_k(&self) -> usize {
        self.config.fetch_k()
    }

    /// Cutoff for a query whose best similarity is `best`.
    pub fn threshold(&self, best: f32) -> f32 {
        (best / self.config.dynamic_multiplier).max(self.config.min_similarity)
    }

    /// Rank a query result. Returns at most `top_k` chunks, highest first.
    pub fn rank(&self, result: &QueryResult, policy: TaggingPolicy) -> Vec<RankedChunk> {
        let candidates: Vec<(f32, &str, Option<&Metadata>)> = result
            .documents
            .iter()
            .zip(result.distances.iter())
            .enumerate()
            .map(|(i, (doc, distance))| (1.0 - *distance, doc.trim(), result.metadatas.get(i)))
            .filter(|(s, _, _)| s.is_finite())
            .collect();

        let Some(best) = candidates.iter().map(|(s, _, _)| *s).reduce(f32::max) else {
            return Vec::new();
        };
        let threshold = self.threshold(best);

        let mut ranked: Vec<RankedChunk> = candidates
            .into_iter()
            .filter(|(s, doc, _)| *s >= threshold && !doc.is_empty())
            .map(|(similarity, doc, metadata)| RankedChunk {
                similarity,
                text: policy.apply(doc, metadata),
            })
            .collect();

        // `sort_by` is stable: ties keep fetch order.
        ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let mut seen = HashSet::new();
        ranked.retain(|chunk| seen.insert(chunk.text.clone()));
        ranked.truncate(self.config.top_k);
        ranked
    }
}

/// Join ranked chunks into one `<outer>…</outer>` block, or `None` if empty.
pub fn render_block(outer_tag: &str, chunks: &[RankedChunk]) -> Option<String> {
    if chunks.is_empty() {
        return None;
    }
    let body = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(format!("<{outer_tag}>\n{body}\n</{outer_tag}>"))
}
