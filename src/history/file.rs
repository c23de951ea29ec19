use async_trait::async_trait;
use log::{ debug, error, info };
use std::collections::BTreeMap;
use std::path::{ Path, PathBuf };
use tokio::fs;
use tokio::sync::Mutex;

use super::{ HistoryError, HistoryStore };
use crate::models::chat::{ ChatMessage, ChatSummary };

type Histories = BTreeMap<String, Vec<ChatMessage>>;

/// Stores all conversations in one JSON document (`token -> [message]`),
/// reading and rewriting the whole file on every access.
pub struct FileHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistoryStore {
    /// Opens the store, writing an empty document if the file is missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        if fs::metadata(&path).await.is_err() {
            info!("History file '{}' not found, creating it", path.display());
            fs::write(&path, b"{}").await.map_err(|e| io_error(&path, e))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unreadable or corrupt files are logged and treated as empty.
    async fn load_all(&self) -> Histories {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) => {
                error!("Error loading chat histories from '{}': {}", self.path.display(), e);
                return Histories::new();
            }
        };
        match serde_json::from_str::<Histories>(&data) {
            Ok(histories) => histories,
            Err(e) => {
                error!("Error parsing chat histories in '{}': {}", self.path.display(), e);
                Histories::new()
            }
        }
    }

    async fn save_all(&self, histories: &Histories) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(histories)?;
        let tmp = self.path.with_extension("json.tmp");
        let result: std::io::Result<()> = async {
            fs::write(&tmp, json.as_bytes()).await?;
            fs::rename(&tmp, &self.path).await
        }.await;
        if let Err(e) = result {
            error!("Error saving chat histories to '{}': {}", self.path.display(), e);
            return Err(io_error(&self.path, e));
        }
        debug!("Saved {} conversation(s) to {}", histories.len(), self.path.display());
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> HistoryError {
    HistoryError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn get_conversation(&self, token: &str) -> Result<Vec<ChatMessage>, HistoryError> {
        Ok(self.load_all().await.remove(token).unwrap_or_default())
    }

    async fn append_messages(
        &self,
        token: &str,
        messages: &[ChatMessage]
    ) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().await;
        let mut histories = self.load_all().await;
        histories.entry(token.to_string()).or_default().extend_from_slice(messages);
        self.save_all(&histories).await
    }

    async fn list_conversations(&self) -> Result<Vec<ChatSummary>, HistoryError> {
        let histories = self.load_all().await;
        Ok(
            histories
                .iter()
                .map(|(token, messages)| ChatSummary::from_messages(token, messages))
                .collect()
        )
    }

    async fn delete_conversation(&self, token: &str) -> Result<bool, HistoryError> {
        let _guard = self.write_lock.lock().await;
        let mut histories = self.load_all().await;
        if histories.remove(token).is_none() {
            return Ok(false);
        }
        self.save_all(&histories).await?;
        Ok(true)
    }

    async fn delete_message(
        &self,
        token: &str,
        timestamp: &str
    ) -> Result<Option<usize>, HistoryError> {
        let _guard = self.write_lock.lock().await;
        let mut histories = self.load_all().await;
        let removed = match histories.get_mut(token) {
            Some(messages) => {
                let before = messages.len();
                messages.retain(|m| m.timestamp != timestamp);
                before - messages.len()
            }
            None => {
                return Ok(None);
            }
        };
        if removed > 0 {
            self.save_all(&histories).await?;
        }
        Ok(Some(removed))
    }
}
