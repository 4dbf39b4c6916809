use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::Role;

/// One line of a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_id: Option<String>,
}

impl MessageRecord {
    pub fn new(conversation_id: Uuid, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.into(),
            ts: Utc::now(),
            model: None,
            response_id: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, response_id: Option<String>) -> Self {
        self.model = Some(model.into());
        self.response_id = response_id;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt record in {path} line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Append-only JSONL logs, one file per conversation.
pub struct ConversationStore {
    dir: PathBuf,
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl ConversationStore {
    /// Open the store, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, conversation_id: Uuid) -> PathBuf {
        self.dir.join(format!("{conversation_id}.jsonl"))
    }

    /// All records in write order. An unknown conversation is empty.
    pub async fn load(&self, conversation_id: Uuid) -> Result<Vec<MessageRecord>, StoreError> {
        let path = self.path_for(conversation_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    line: n + 1,
                    source,
                })
            })
            .collect()
    }

    pub async fn append(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(record).map_err(StoreError::Encode)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(record.conversation_id))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Exclusive access to one conversation until the guard drops.
    pub async fn lock(&self, conversation_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only the registry still references are idle.
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            locks.entry(conversation_id).or_default().clone()
        };
        slot.lock_owned().await
    }
}
