//! Recency cache — the last N turns, verbatim and in order.
//!
//! A ring buffer, not a retrieval index: it is never re-ranked and the
//! oldest turn is dropped silently once capacity is reached.

use async_trait::async_trait;
use juliet_core::error::RetrievalError;
use juliet_core::message::{PromptMessage, Turn};
use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::adapter::ContextAdapter;

pub const DEFAULT_CAPACITY: usize = 20;

pub struct RecencyCache {
    capacity: usize,
    turns: RwLock<VecDeque<Turn>>,
}

impl RecencyCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            turns: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a completed turn, evicting the oldest when full.
    pub async fn add_turn(&self, turn: Turn) {
        let mut turns = self.turns.write().await;
        if turns.len() == self.capacity {
            turns.pop_front();
        }
        turns.push_back(turn);
    }

    pub async fn len(&self) -> usize {
        self.turns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.turns.write().await.clear();
    }

    /// Snapshot of every cached turn, oldest first.
    pub async fn turns(&self) -> Vec<Turn> {
        self.turns.read().await.iter().cloned().collect()
    }

    /// The `n` most recent turns, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<Turn> {
        let turns = self.turns.read().await;
        let skip = turns.len().saturating_sub(n);
        turns.iter().skip(skip).cloned().collect()
    }
}

impl Default for RecencyCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ContextAdapter for RecencyCache {
    async fn build_messages(&self, _user_request: Option<&str>) -> Result<Vec<PromptMessage>, RetrievalError> {
        let turns = self.turns.read().await;
        if turns.is_empty() {
            return Ok(Vec::new());
        }

        let lines: Vec<String> = turns
            .iter()
            .flat_map(|t| [t.request.to_memory_string(), t.response.to_memory_string()])
            .collect();
        Ok(vec![PromptMessage::system(format!(
            "<history>\n{}\n</history>",
            lines.join("\n")
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone, Utc};
    use juliet_core::message::{ConversationId, Message};

    fn turn(i: u32) -> Turn {
        let ts = Local
            .with_ymd_and_hms(2025, 12, 18, 14, i, 0)
            .unwrap()
            .with_timezone(&Utc);
        Turn::new(
            ConversationId::from("c1"),
            Message::user("wallscreet", format!("question {i}")).at(ts),
            Message::assistant("juliet", format!("answer {i}")).at(ts),
        )
    }

    #[tokio::test]
    async fn empty_cache_emits_nothing() {
        let cache = RecencyCache::default();
        assert!(cache.build_messages(None).await.unwrap().is_empty());
        assert_eq!(cache.capacity(), 20);
    }

    #[tokio::test]
    async fn evicts_oldest_at_capacity() {
        let cache = RecencyCache::new(3);
        let turns: Vec<_> = (0..4).map(turn).collect();
        for t in &turns {
            cache.add_turn(t.clone()).await;
        }

        assert_eq!(cache.len().await, 3);
        let ids: Vec<_> = cache.turns().await.into_iter().map(|t| t.id).collect();
        assert!(!ids.contains(&turns[0].id));
        assert_eq!(ids, vec![turns[1].id.clone(), turns[2].id.clone(), turns[3].id.clone()]);
    }

    #[tokio::test]
    async fn history_block_keeps_insertion_order() {
        let cache = RecencyCache::new(5);
        cache.add_turn(turn(1)).await;
        cache.add_turn(turn(2)).await;

        let messages = cache.build_messages(None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].content,
            "<history>\n\
             wallscreet @ 2025-12-18 @ 14:01: question 1\n\
             juliet @ 2025-12-18 @ 14:01: answer 1\n\
             wallscreet @ 2025-12-18 @ 14:02: question 2\n\
             juliet @ 2025-12-18 @ 14:02: answer 2\n\
             </history>"
        );
    }

    #[tokio::test]
    async fn recent_returns_tail() {
        let cache = RecencyCache::new(5);
        for i in 0..4 {
            cache.add_turn(turn(i)).await;
        }
        let recent = cache.recent(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].request.content, "question 2");
        assert_eq!(cache.recent(10).await.len(), 4);
    }

    #[tokio::test]
    async fn clear_empties() {
        let cache = RecencyCache::new(2);
        cache.add_turn(turn(0)).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let cache = RecencyCache::new(0);
        cache.add_turn(turn(0)).await;
        cache.add_turn(turn(1)).await;
        assert_eq!(cache.len().await, 1);
    }
}
