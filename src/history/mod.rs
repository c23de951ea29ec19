mod file;
mod memory;
pub mod selector;

pub use file::FileHistoryStore;
pub use memory::MemoryHistoryStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error as ThisError;
use crate::cli::Args;
use crate::models::chat::{ ChatMessage, ChatSummary };

#[derive(Debug, ThisError)]
pub enum HistoryError {
    #[error("History file IO error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("History JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-token conversation log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Full log for `token`; empty when the token is unknown.
    async fn get_conversation(&self, token: &str) -> Result<Vec<ChatMessage>, HistoryError>;

    /// Appends to the stored log in one read-modify-write step, creating the
    /// conversation if needed.
    async fn append_messages(
        &self,
        token: &str,
        messages: &[ChatMessage]
    ) -> Result<(), HistoryError>;

    async fn list_conversations(&self) -> Result<Vec<ChatSummary>, HistoryError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_conversation(&self, token: &str) -> Result<bool, HistoryError>;

    /// Removes every message of `token` stamped `timestamp`. `None` when the
    /// conversation does not exist, otherwise the number removed.
    async fn delete_message(
        &self,
        token: &str,
        timestamp: &str
    ) -> Result<Option<usize>, HistoryError>;
}

pub async fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "file" => {
            let store = FileHistoryStore::open(&args.history_path).await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub async fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    if args.history_type.eq_ignore_ascii_case("file") {
        info!("Chat history will be stored in file: {}", args.history_path);
    } else {
        info!("Chat history will be stored in: {}", args.history_type);
    }
    create_history_store(args).await
}
