use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "setToken")] SetToken {
        token: String,
    },
    #[serde(rename = "chatMessage")] ChatMessage {
        token: String,
        message: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "chatHistory")] ChatHistory {
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "chatPrompt")] ChatPrompt {
        message: ChatMessage,
        timestamp: String,
    },
    #[serde(rename = "chatResponse")] ChatResponse {
        message: String,
        timestamp: String,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
