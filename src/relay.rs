use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::history::selector::select_relevant_history;
use crate::history::{ initialize_history_store, HistoryError, HistoryStore };
use crate::llm::chat::{ build_prompt, new_client as new_chat_client, ChatClient, CompletionError };
use crate::llm::{ model_for_environment, LlmConfig };
use crate::models::chat::{ now_iso, ChatMessage, ChatSummary, Role };
use crate::models::websocket::ServerMessage;
use crate::session::{ ClientSender, ConnectionId, SessionRegistry };

use log::{ info, error };
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::sync::RwLock;

pub const CHAT_ERROR_MESSAGE: &str = "Error processing message";

#[derive(Debug, ThisError)]
pub enum RelayError {
    #[error(transparent)] History(#[from] HistoryError),
    #[error(transparent)] Completion(#[from] CompletionError),
}

/// Ties the history store, the completion client and the connected sessions
/// together. Cheap to clone; every clone shares the same state.
#[derive(Clone)]
pub struct ChatRelay {
    history_store: Arc<dyn HistoryStore>,
    chat_client: Arc<dyn ChatClient>,
    sessions: SessionRegistry,
    prompt_config: Arc<RwLock<PromptConfig>>,
    prompts_path: Option<PathBuf>,
    max_history_tokens: usize,
}

impl ChatRelay {
    pub async fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let model = args.chat_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| model_for_environment(&args.environment).to_string());
        let chat_config = LlmConfig {
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: Some(model),
            base_url: args.chat_base_url.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Model={}, BaseURL={}",
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("client default")
        );

        let history_store = initialize_history_store(args).await?;

        let prompt_config = prompt::load_prompts_or_default(&args.prompts_path)?;

        Ok(Self {
            history_store,
            chat_client,
            sessions: SessionRegistry::new(),
            prompt_config: Arc::new(RwLock::new(prompt_config)),
            prompts_path: Some(PathBuf::from(&args.prompts_path)),
            max_history_tokens: args.max_history_tokens(),
        })
    }

    pub fn from_parts(
        history_store: Arc<dyn HistoryStore>,
        chat_client: Arc<dyn ChatClient>,
        prompt_config: PromptConfig,
        max_history_tokens: usize
    ) -> Self {
        Self {
            history_store,
            chat_client,
            sessions: SessionRegistry::new(),
            prompt_config: Arc::new(RwLock::new(prompt_config)),
            prompts_path: None,
            max_history_tokens,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn prompts(&self) -> PromptConfig {
        self.prompt_config.read().await.clone()
    }

    /// Reads a conversation; read failures are logged and yield an empty log.
    async fn load_history(&self, token: &str) -> Vec<ChatMessage> {
        match self.history_store.get_conversation(token).await {
            Ok(history) => history,
            Err(e) => {
                error!("Error loading history for {}: {}", token, e);
                Vec::new()
            }
        }
    }

    /// Joins `conn_id` to the room for `token` and returns the stored log.
    pub async fn join(
        &self,
        token: &str,
        conn_id: ConnectionId,
        sender: ClientSender
    ) -> Vec<ChatMessage> {
        // register before reading so no broadcast falls between the two
        self.sessions.join(token, conn_id, sender).await;
        let history = self.load_history(token).await;
        info!("Connection {} joined room {} ({} message(s))", conn_id, token, history.len());
        history
    }

    pub async fn leave(&self, conn_id: ConnectionId) {
        self.sessions.leave_all(conn_id).await;
    }

    /// Trims `history` and asks the completion API for the next assistant turn.
    async fn request_reply(
        &self,
        preamble_for: impl FnOnce(&PromptConfig, &[ChatMessage]) -> String,
        history: &[ChatMessage]
    ) -> Result<ChatMessage, RelayError> {
        let relevant = select_relevant_history(history, self.max_history_tokens);
        let preamble = {
            let prompts = self.prompt_config.read().await;
            preamble_for(&prompts, &relevant)
        };
        let prompt = build_prompt(&preamble, &relevant);
        info!(
            "Requesting completion with {} of {} message(s) ({})",
            relevant.len(),
            history.len(),
            self.chat_client.get_model()
        );
        let completion = self.chat_client.complete(&prompt).await?;
        Ok(ChatMessage::assistant(completion.response))
    }

    /// One chat turn from a connected client. The reply, or a generic error
    /// event, is broadcast to everyone in the token's room.
    pub async fn chat(&self, token: &str, message: &str) -> Result<ChatMessage, RelayError> {
        let mut history = self.load_history(token).await;
        let user_message = ChatMessage::user(message);
        history.push(user_message.clone());

        let result = async {
            let reply = self.request_reply(
                |prompts, relevant| prompts.chat_preamble(relevant.is_empty()).to_string(),
                &history
            ).await?;
            self.history_store.append_messages(token, &[user_message, reply.clone()]).await?;
            Ok::<_, RelayError>(reply)
        }.await;

        match result {
            Ok(reply) => {
                self.sessions.broadcast(token, ServerMessage::ChatResponse {
                    message: reply.content.clone(),
                    timestamp: reply.timestamp.clone(),
                }).await;
                Ok(reply)
            }
            Err(e) => {
                error!("Chat turn failed for {}: {}", token, e);
                self.sessions.broadcast(token, ServerMessage::Error {
                    message: CHAT_ERROR_MESSAGE.to_string(),
                }).await;
                Err(e)
            }
        }
    }

    /// A transcript pushed over HTTP. Listeners see the prompt right away and
    /// the reply once the completion returns.
    pub async fn submit_transcript(
        &self,
        token: &str,
        transcript: &str,
        timestamp: Option<String>
    ) -> Result<ChatMessage, RelayError> {
        let mut history = self.load_history(token).await;
        let prompt_message = ChatMessage::new(
            Role::User,
            transcript,
            timestamp.unwrap_or_else(now_iso)
        );
        history.push(prompt_message.clone());

        self.sessions.broadcast(token, ServerMessage::ChatPrompt {
            message: prompt_message.clone(),
            timestamp: prompt_message.timestamp.clone(),
        }).await;

        let reply = self.request_reply(|prompts, _| prompts.transcript.clone(), &history).await?;
        self.history_store.append_messages(token, &[prompt_message, reply.clone()]).await?;

        self.sessions.broadcast(token, ServerMessage::ChatResponse {
            message: reply.content.clone(),
            timestamp: reply.timestamp.clone(),
        }).await;
        Ok(reply)
    }

    /// Stores a ready-made prompt/response pair without calling the completion
    /// API and pushes the updated log to the room. Returns the timestamp used.
    pub async fn upload_chat(
        &self,
        token: &str,
        prompt: &str,
        response: &str,
        timestamp: Option<String>
    ) -> Result<String, RelayError> {
        let timestamp = timestamp.unwrap_or_else(now_iso);
        let pair = [
            ChatMessage::new(Role::User, prompt, timestamp.clone()),
            ChatMessage::new(Role::Assistant, response, timestamp.clone()),
        ];
        self.history_store.append_messages(token, &pair).await?;

        let history = self.load_history(token).await;
        self.sessions.broadcast(token, ServerMessage::ChatHistory { messages: history }).await;
        Ok(timestamp)
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSummary>, RelayError> {
        Ok(self.history_store.list_conversations().await?)
    }

    pub async fn history(&self, token: &str) -> Result<Vec<ChatMessage>, RelayError> {
        Ok(self.history_store.get_conversation(token).await?)
    }

    pub async fn delete_chat(&self, token: &str) -> Result<bool, RelayError> {
        let deleted = self.history_store.delete_conversation(token).await?;
        if deleted {
            info!("Deleted conversation {}", token);
        }
        Ok(deleted)
    }

    pub async fn delete_message(
        &self,
        token: &str,
        timestamp: &str
    ) -> Result<Option<usize>, RelayError> {
        let removed = self.history_store.delete_message(token, timestamp).await?;
        if let Some(count) = removed {
            info!("Deleted {} message(s) stamped {} from {}", count, timestamp, token);
        }
        Ok(removed)
    }

    /// Re-reads the prompts file if it changed. `Ok(false)` when nothing was
    /// reloaded.
    pub async fn reload_prompts_if_changed(&self) -> Result<bool, PromptError> {
        let Some(path) = &self.prompts_path else {
            return Ok(false);
        };
        let mut current = self.prompt_config.write().await;
        match prompt::reload_prompts_if_changed(path, &current)? {
            Some(new_config) => {
                *current = new_config;
                info!("Prompts reloaded from {}", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{ relay_with, relay_with_read_only_store, StubChatClient };
    use super::*;
    use crate::config::prompt::{ DEFAULT_CHAT_PROMPT, DEFAULT_TRANSCRIPT_PROMPT };
    use tokio::sync::mpsc;
    use uuid::Uuid;

    async fn listener(relay: &ChatRelay, token: &str) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        relay.join(token, Uuid::new_v4(), tx).await;
        rx
    }

    #[tokio::test]
    async fn chat_stores_both_turns_and_broadcasts_reply() {
        let client = Arc::new(StubChatClient::replying(&["Tell me about yourself."]));
        let (relay, store) = relay_with(client.clone());
        let mut rx = listener(&relay, "tok").await;

        let reply = relay.chat("tok", "Start the interview").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);

        let stored = store.get_conversation("tok").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, Role::User);
        assert_eq!(stored[0].content, "Start the interview");
        assert_eq!(stored[1], reply);

        match rx.recv().await {
            Some(ServerMessage::ChatResponse { message, timestamp }) => {
                assert_eq!(message, "Tell me about yourself.");
                assert_eq!(timestamp, reply.timestamp);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let prompts = client.prompts.lock().await;
        assert_eq!(prompts[0][0].role, "system");
        assert_eq!(prompts[0][0].content, DEFAULT_CHAT_PROMPT);
        assert_eq!(prompts[0][1].content, "Start the interview");
    }

    #[tokio::test]
    async fn failed_completion_stores_nothing_and_reports_generic_error() {
        let (relay, store) = relay_with(Arc::new(StubChatClient::failing()));
        let mut rx = listener(&relay, "tok").await;

        assert!(relay.chat("tok", "hello").await.is_err());
        assert!(store.get_conversation("tok").await.unwrap().is_empty());
        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Error { message: CHAT_ERROR_MESSAGE.to_string() })
        );
    }

    #[tokio::test]
    async fn long_history_is_trimmed_before_completion() {
        let client = Arc::new(StubChatClient::replying(&["ok"]));
        let store = Arc::new(crate::history::MemoryHistoryStore::new());
        let relay = ChatRelay::from_parts(store.clone(), client.clone(), PromptConfig::default(), 0);
        let earlier: Vec<ChatMessage> = (0..8)
            .map(|i| ChatMessage::new(Role::User, format!("m{}", i), format!("t{}", i)))
            .collect();
        store.append_messages("tok", &earlier).await.unwrap();

        relay.chat("tok", "latest").await.unwrap();

        let prompts = client.prompts.lock().await;
        let sent: Vec<&str> = prompts[0][1..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(sent, vec!["m0", "m4", "m5", "m6", "m7", "latest"]);
        assert_eq!(store.get_conversation("tok").await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn transcript_broadcasts_prompt_then_reply() {
        let client = Arc::new(StubChatClient::replying(&["I led the migration."]));
        let (relay, store) = relay_with(client.clone());
        let mut rx = listener(&relay, "tok").await;

        relay
            .submit_transcript("tok", "What was your biggest project?", Some("2024-05-01T10:00:00.000Z".into())).await
            .unwrap();

        match rx.recv().await {
            Some(ServerMessage::ChatPrompt { message, timestamp }) => {
                assert_eq!(message.content, "What was your biggest project?");
                assert_eq!(timestamp, "2024-05-01T10:00:00.000Z");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(rx.recv().await, Some(ServerMessage::ChatResponse { .. })));

        let stored = store.get_conversation("tok").await.unwrap();
        assert_eq!(stored[0].timestamp, "2024-05-01T10:00:00.000Z");
        assert_eq!(stored[1].content, "I led the migration.");
        assert_eq!(client.prompts.lock().await[0][0].content, DEFAULT_TRANSCRIPT_PROMPT);
    }

    #[tokio::test]
    async fn upload_appends_pair_and_pushes_full_history() {
        let (relay, store) = relay_with(Arc::new(StubChatClient::default()));
        let mut rx = listener(&relay, "tok").await;

        let ts = relay.upload_chat("tok", "Q", "A", Some("ts-1".into())).await.unwrap();
        assert_eq!(ts, "ts-1");

        let stored = store.get_conversation("tok").await.unwrap();
        assert_eq!(stored, vec![
            ChatMessage::new(Role::User, "Q", "ts-1"),
            ChatMessage::new(Role::Assistant, "A", "ts-1")
        ]);
        assert_eq!(rx.recv().await, Some(ServerMessage::ChatHistory { messages: stored }));
    }

    #[tokio::test]
    async fn join_returns_existing_history() {
        let (relay, store) = relay_with(Arc::new(StubChatClient::default()));
        store.append_messages("tok", &[ChatMessage::new(Role::User, "hi", "t1")]).await.unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let history = relay.join("tok", Uuid::new_v4(), tx).await;
        assert_eq!(history.len(), 1);
        assert_eq!(relay.sessions().subscriber_count("tok").await, 1);
    }

    #[tokio::test]
    async fn prompts_without_a_file_never_reload() {
        let (relay, _) = relay_with(Arc::new(StubChatClient::default()));
        assert!(!relay.reload_prompts_if_changed().await.unwrap());
    }

    #[tokio::test]
    async fn missing_prompts_file_reloads_as_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let prompts_path = dir.path().join("prompts.json");
        let args = <Args as clap::Parser>::parse_from([
            "chat-relay",
            "--history-type",
            "memory",
            "--chat-api-key",
            "sk-test",
            "--prompts-path",
            prompts_path.to_str().unwrap(),
        ]);
        let relay = ChatRelay::new(&args).await.unwrap();
        assert_eq!(relay.prompts().await.chat, DEFAULT_CHAT_PROMPT);
        assert!(!relay.reload_prompts_if_changed().await.unwrap());

        std::fs::write(&prompts_path, r#"{"chat":"Be concise."}"#).unwrap();
        assert!(relay.reload_prompts_if_changed().await.unwrap());
        assert_eq!(relay.prompts().await.chat, "Be concise.");
    }

    #[tokio::test]
    async fn write_failure_in_chat_reports_generic_error() {
        let client = Arc::new(StubChatClient::replying(&["never stored"]));
        let relay = relay_with_read_only_store(client);
        let mut rx = listener(&relay, "tok").await;

        assert!(matches!(relay.chat("tok", "hello").await, Err(RelayError::History(_))));
        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Error { message: CHAT_ERROR_MESSAGE.to_string() })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn write_failure_in_transcript_is_propagated() {
        let relay = relay_with_read_only_store(Arc::new(StubChatClient::replying(&["reply"])));
        let result = relay.submit_transcript("tok", "question", None).await;
        assert!(matches!(result, Err(RelayError::History(_))));
    }

    /// Reads report how many connections were already in the room.
    #[derive(Default)]
    struct RoomObservingStore {
        inner: crate::history::MemoryHistoryStore,
        sessions: std::sync::Mutex<Option<SessionRegistry>>,
        seen: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl HistoryStore for RoomObservingStore {
        async fn get_conversation(&self, token: &str) -> Result<Vec<ChatMessage>, HistoryError> {
            let sessions = self.sessions.lock().unwrap().clone();
            if let Some(sessions) = sessions {
                let count = sessions.subscriber_count(token).await;
                self.seen.lock().unwrap().push(count);
            }
            self.inner.get_conversation(token).await
        }

        async fn append_messages(
            &self,
            token: &str,
            messages: &[ChatMessage]
        ) -> Result<(), HistoryError> {
            self.inner.append_messages(token, messages).await
        }

        async fn list_conversations(&self) -> Result<Vec<ChatSummary>, HistoryError> {
            self.inner.list_conversations().await
        }

        async fn delete_conversation(&self, token: &str) -> Result<bool, HistoryError> {
            self.inner.delete_conversation(token).await
        }

        async fn delete_message(
            &self,
            token: &str,
            timestamp: &str
        ) -> Result<Option<usize>, HistoryError> {
            self.inner.delete_message(token, timestamp).await
        }
    }

    #[tokio::test]
    async fn join_registers_before_reading_history() {
        let store = Arc::new(RoomObservingStore::default());
        let relay = ChatRelay::from_parts(
            store.clone(),
            Arc::new(StubChatClient::default()),
            PromptConfig::default(),
            0
        );
        *store.sessions.lock().unwrap() = Some(relay.sessions().clone());

        let (tx, _rx) = mpsc::unbounded_channel();
        relay.join("tok", Uuid::new_v4(), tx).await;
        assert_eq!(*store.seen.lock().unwrap(), vec![1]);
    }
}
