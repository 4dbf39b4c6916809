use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::Mutex;

#[derive(Debug)]
struct Cached {
    modified: Option<SystemTime>,
    text: Arc<str>,
}

/// System prompt file, re-read only when its modification time changes.
pub struct PromptLoader {
    path: PathBuf,
    cache: Mutex<Option<Cached>>,
}

impl PromptLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Current prompt text; empty when the file does not exist.
    pub async fn load(&self) -> io::Result<Arc<str>> {
        let modified = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.modified().ok(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("system prompt {} not found", self.path.display());
                return Ok(Arc::from(""));
            }
            Err(err) => return Err(err),
        };

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if modified.is_some() && cached.modified == modified {
                return Ok(cached.text.clone());
            }
        }

        // The file may vanish between the metadata check and the read.
        let Some(text) = read_if_present(&self.path).await? else {
            tracing::warn!("system prompt {} disappeared", self.path.display());
            *cache = None;
            return Ok(Arc::from(""));
        };
        let text: Arc<str> = text.into();
        tracing::debug!("loaded system prompt ({} chars)", text.chars().count());
        *cache = Some(Cached {
            modified,
            text: text.clone(),
        });
        Ok(text)
    }
}

async fn read_if_present(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
