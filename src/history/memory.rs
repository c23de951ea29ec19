use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{ HistoryError, HistoryStore };
use crate::models::chat::{ ChatMessage, ChatSummary };

/// Keeps every conversation in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: RwLock<BTreeMap<String, Vec<ChatMessage>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn get_conversation(&self, token: &str) -> Result<Vec<ChatMessage>, HistoryError> {
        Ok(self.conversations.read().await.get(token).cloned().unwrap_or_default())
    }

    async fn append_messages(
        &self,
        token: &str,
        messages: &[ChatMessage]
    ) -> Result<(), HistoryError> {
        let mut w = self.conversations.write().await;
        w.entry(token.to_string()).or_default().extend_from_slice(messages);
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<ChatSummary>, HistoryError> {
        let r = self.conversations.read().await;
        Ok(
            r
                .iter()
                .map(|(token, messages)| ChatSummary::from_messages(token, messages))
                .collect()
        )
    }

    async fn delete_conversation(&self, token: &str) -> Result<bool, HistoryError> {
        Ok(self.conversations.write().await.remove(token).is_some())
    }

    async fn delete_message(
        &self,
        token: &str,
        timestamp: &str
    ) -> Result<Option<usize>, HistoryError> {
        let mut w = self.conversations.write().await;
        Ok(
            w.get_mut(token).map(|messages| {
                let before = messages.len();
                messages.retain(|m| m.timestamp != timestamp);
                before - messages.len()
            })
        )
    }
}
