//! Conversation persistence
//!
//! The agent talks to a [`Storage`] trait so tests can swap in an in-memory
//! implementation; [`JsonStorage`] is the production backend, one
//! pretty-printed JSON file per conversation under
//! `<data_dir>/conversations/`.

use crate::conversation::Conversation;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("conversation {0:?} not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Backend for saving and loading conversations
pub trait Storage: Send + Sync {
    /// Persist a conversation, bumping its `updated` stamp
    fn save(&self, conversation: &mut Conversation) -> Result<()>;

    fn load(&self, id: &str) -> Result<Conversation>;

    fn delete(&self, id: &str) -> Result<()>;

    /// All conversations, newest `updated` first. Unreadable or malformed
    /// records are skipped, never fatal.
    fn list(&self) -> Result<Vec<Conversation>>;

    /// Most recently updated conversation, if any
    fn latest(&self) -> Result<Option<Conversation>> {
        Ok(self.list()?.into_iter().next())
    }
}

/// File-backed storage
pub struct JsonStorage {
    data_dir: PathBuf,
}

impl JsonStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Storage rooted at the platform data directory
    pub fn default_location(app_name: &str) -> Option<Self> {
        dirs::data_local_dir().map(|dir| Self::new(dir.join(app_name)))
    }

    fn conversations_dir(&self) -> PathBuf {
        self.data_dir.join("conversations")
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.conversations_dir().join(format!("{id}.json"))
    }
}

impl Storage for JsonStorage {
    fn save(&self, conversation: &mut Conversation) -> Result<()> {
        std::fs::create_dir_all(self.conversations_dir())?;
        conversation.updated = Utc::now();
        let data = serde_json::to_vec_pretty(conversation)?;
        std::fs::write(self.path_for(&conversation.id), data)?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Conversation> {
        let path = self.path_for(id);
        let data = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(id.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn delete(&self, id: &str) -> Result<()> {
        std::fs::remove_file(self.path_for(id)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(id.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn list(&self) -> Result<Vec<Conversation>> {
        let entries = match std::fs::read_dir(self.conversations_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut conversations = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_conversation(&path) {
                Ok(conversation) => conversations.push(conversation),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable conversation");
                }
            }
        }

        conversations.sort_by(|a, b| b.updated.cmp(&a.updated));
        Ok(conversations)
    }
}

fn read_conversation(path: &Path) -> Result<Conversation> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}
