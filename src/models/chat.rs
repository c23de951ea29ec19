use chrono::{ SecondsFormat, Utc };
use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, now_iso())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, now_iso())
    }
}

/// One row of the conversation listing. Describes a chat by its opening message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub token: String,
    pub last_message: String,
    pub timestamp: String,
}

impl ChatSummary {
    pub fn from_messages(token: &str, messages: &[ChatMessage]) -> Self {
        let first = messages.first();
        Self {
            token: token.to_string(),
            last_message: first.map(|m| m.content.clone()).unwrap_or_default(),
            timestamp: first.map(|m| m.timestamp.clone()).unwrap_or_default(),
        }
    }
}

/// UTC timestamp with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_lowercase_role() {
        let msg = ChatMessage::new(Role::Assistant, "hi", "2024-05-01T10:00:00.000Z");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "role": "assistant",
                "content": "hi",
                "timestamp": "2024-05-01T10:00:00.000Z"
            })
        );
    }

    #[test]
    fn summary_uses_first_message_and_camel_case() {
        let messages = vec![
            ChatMessage::new(Role::User, "opening", "t1"),
            ChatMessage::new(Role::Assistant, "reply", "t2")
        ];
        let summary = ChatSummary::from_messages("abc", &messages);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["lastMessage"], "opening");
        assert_eq!(json["timestamp"], "t1");

        let empty = ChatSummary::from_messages("abc", &[]);
        assert_eq!(empty.last_message, "");
        assert_eq!(empty.timestamp, "");
    }

    #[test]
    fn now_iso_has_millis_and_zulu_suffix() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-05-01T10:00:00.000Z".len());
    }
}
