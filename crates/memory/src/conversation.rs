//! Conversation store — every turn of every conversation, as one JSON file.
//!
//! The whole map is held in memory and rewritten on each append. Fine for a
//! single user's chat history; the vector store is what scales.

use chrono::Utc;
use juliet_core::error::PersistenceError;
use juliet_core::message::{Conversation, ConversationId, Turn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Participants of a conversation, used when one has to be started.
#[derive(Debug, Clone)]
pub struct Participants {
    pub host: String,
    pub host_is_bot: bool,
    pub guest: String,
    pub guest_is_bot: bool,
}

impl Participants {
    /// A human host talking to a bot guest.
    pub fn human_and_bot(host: impl Into<String>, guest: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            host_is_bot: false,
            guest: guest.into(),
            guest_is_bot: true,
        }
    }
}

pub struct ConversationStore {
    path: Option<PathBuf>,
    conversations: Arc<RwLock<BTreeMap<String, Conversation>>>,
    /// Set when an unparseable file could not be moved aside; writes are
    /// refused so it is never overwritten.
    write_blocked: Option<String>,
}

impl ConversationStore {
    /// Load from `path`. A missing file starts empty. A file that fails to
    /// parse is renamed to `<name>.corrupt-<timestamp>` and the store starts
    /// empty; if the rename fails the store refuses to write.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (conversations, write_blocked) = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = conversations.len(), "Conversation store loaded");
        Self {
            path: Some(path),
            conversations: Arc::new(RwLock::new(conversations)),
            write_blocked,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            conversations: Arc::new(RwLock::new(BTreeMap::new())),
            write_blocked: None,
        }
    }

    fn load_from_disk(path: &Path) -> (BTreeMap<String, Conversation>, Option<String>) {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return (BTreeMap::new(), None),
        };
        match serde_json::from_str::<Vec<Conversation>>(&content) {
            Ok(list) => (
                list.into_iter()
                    .map(|c| (c.id.as_str().to_string(), c))
                    .collect(),
                None,
            ),
            Err(e) => {
                let backup = Self::corrupt_path(path);
                match std::fs::rename(path, &backup) {
                    Ok(()) => {
                        warn!(
                            path = %path.display(),
                            backup = %backup.display(),
                            error = %e,
                            "Invalid conversation file moved aside, starting empty"
                        );
                        (BTreeMap::new(), None)
                    }
                    Err(rename_err) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            rename_error = %rename_err,
                            "Invalid conversation file could not be moved aside, writes disabled"
                        );
                        (
                            BTreeMap::new(),
                            Some(format!("{} is unreadable ({e}) and could not be moved aside", path.display())),
                        )
                    }
                }
            }
        }
    }

    fn corrupt_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "conversations.json".into());
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.f")));
        path.with_file_name(name)
    }

    /// Rewrite the file through a temporary sibling and a rename.
    async fn flush(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(reason) = &self.write_blocked {
            return Err(PersistenceError::Conversation(format!("Refusing to write: {reason}")));
        }
        let conversations = self.conversations.read().await;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::Conversation(format!("Failed to create conversation directory: {e}"))
            })?;
        }

        let list: Vec<&Conversation> = conversations.values().collect();
        let content = serde_json::to_string_pretty(&list).map_err(|e| {
            PersistenceError::Conversation(format!("Failed to serialize conversations: {e}"))
        })?;

        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "conversations.json".into());
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);
        std::fs::write(&tmp, content).map_err(|e| {
            PersistenceError::Conversation(format!("Failed to write conversation file: {e}"))
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            PersistenceError::Conversation(format!("Failed to replace conversation file: {e}"))
        })?;
        Ok(())
    }

    /// Return the conversation with `id`, starting (and saving) it if absent.
    pub async fn get_or_start(
        &self,
        id: &ConversationId,
        participants: &Participants,
    ) -> Result<Conversation, PersistenceError> {
        if let Some(existing) = self.get(id).await {
            return Ok(existing);
        }

        let conversation = Conversation::start(
            id.clone(),
            participants.host.clone(),
            participants.host_is_bot,
            participants.guest.clone(),
            participants.guest_is_bot,
        );
        self.conversations
            .write()
            .await
            .entry(id.as_str().to_string())
            .or_insert_with(|| conversation.clone());
        self.flush().await?;
        debug!(conversation = %id, "Conversation started");
        Ok(conversation)
    }

    pub async fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations.read().await.get(id.as_str()).cloned()
    }

    /// Append a turn to its conversation and save.
    pub async fn append_turn(&self, turn: Turn) -> Result<(), PersistenceError> {
        turn.validate()?;
        {
            let mut conversations = self.conversations.write().await;
            let conversation = conversations
                .get_mut(turn.conversation_id.as_str())
                .ok_or_else(|| {
                    PersistenceError::Conversation(format!(
                        "Unknown conversation: {}",
                        turn.conversation_id
                    ))
                })?;
            conversation.push(turn);
        }
        self.flush().await
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }

    /// Total number of turns across every conversation.
    pub async fn turn_count(&self) -> usize {
        self.conversations
            .read()
            .await
            .values()
            .map(|c| c.turns.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use juliet_core::message::Message;

    fn participants() -> Participants {
        Participants::human_and_bot("wallscreet", "juliet")
    }

    #[tokio::test]
    async fn get_or_start_is_idempotent() {
        let store = ConversationStore::in_memory();
        let id = ConversationId::from("c1");
        let first = store.get_or_start(&id, &participants()).await.unwrap();
        let second = store.get_or_start(&id, &participants()).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(first.description, "wallscreet-juliet");
        assert!(first.guest_is_bot);
        assert!(!first.host_is_bot);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn append_updates_last_active() {
        let store = ConversationStore::in_memory();
        let id = ConversationId::from("c1");
        store.get_or_start(&id, &participants()).await.unwrap();

        let later = Utc::now() + Duration::minutes(5);
        let turn = Turn::new(
            id.clone(),
            Message::user("wallscreet", "hi"),
            Message::assistant("juliet", "hello").at(later),
        );
        store.append_turn(turn).await.unwrap();

        let conversation = store.get(&id).await.unwrap();
        assert_eq!(conversation.turns.len(), 1);
        assert_eq!(conversation.last_active, later);
        assert_eq!(store.turn_count().await, 1);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = ConversationStore::in_memory();
        let turn = Turn::new(
            ConversationId::from("ghost"),
            Message::user("u", "hi"),
            Message::assistant("a", "hello"),
        );
        let err = store.append_turn(turn).await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users").join("conversations.json");
        let id = ConversationId::from("c1");

        {
            let store = ConversationStore::load(&path);
            store.get_or_start(&id, &participants()).await.unwrap();
            store
                .append_turn(Turn::new(
                    id.clone(),
                    Message::user("wallscreet", "remember this"),
                    Message::assistant("juliet", "noted"),
                ))
                .await
                .unwrap();
        }

        let reloaded = ConversationStore::load(&path);
        let conversation = reloaded.get(&id).await.unwrap();
        assert_eq!(conversation.turns.len(), 1);
        assert_eq!(conversation.turns[0].request.content, "remember this");
    }

    #[tokio::test]
    async fn corrupted_file_is_moved_aside_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.json");
        let damaged = r#"[{"id":"keep","truncated"#;
        std::fs::write(&path, damaged).unwrap();

        let store = ConversationStore::load(&path);
        assert!(store.is_empty().await);
        store
            .get_or_start(&ConversationId::from("new"), &participants())
            .await
            .unwrap();

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("conversations.json.corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read_to_string(backups[0].path()).unwrap(), damaged);

        let reloaded = ConversationStore::load(&path);
        assert!(reloaded.get(&ConversationId::from("new")).await.is_some());
        assert!(!dir.path().join("conversations.json.tmp").exists());
    }

    #[tokio::test]
    async fn blocked_store_refuses_to_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.json");
        let store = ConversationStore {
            path: Some(path.clone()),
            conversations: Arc::new(RwLock::new(BTreeMap::new())),
            write_blocked: Some("damaged".into()),
        };

        let err = store
            .get_or_start(&ConversationId::from("c1"), &participants())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Refusing to write"));
        assert!(!path.exists());
    }
}
