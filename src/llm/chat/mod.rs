pub mod openai;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::sync::Arc;
use thiserror::Error;

use self::openai::OpenAIChatClient;
use super::LlmConfig;
use crate::models::chat::ChatMessage;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")] Http(#[from] reqwest::Error),
    #[error("Invalid API key format: {0}")] InvalidApiKey(String),
    #[error("{0}")] Config(String),
    #[error("No response from completion API")] EmptyResponse,
}

/// One entry of the message list sent to the completion API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

impl From<&ChatMessage> for PromptMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Builds the request body: the preamble first, then the history in order.
pub fn build_prompt(preamble: &str, history: &[ChatMessage]) -> Vec<PromptMessage> {
    std::iter
        ::once(PromptMessage::system(preamble))
        .chain(history.iter().map(PromptMessage::from))
        .collect()
}

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[PromptMessage]
    ) -> Result<CompletionResponse, CompletionError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, CompletionError> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
