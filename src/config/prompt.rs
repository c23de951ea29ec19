use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;
use log::{ info, warn };

pub const DEFAULT_CHAT_PROMPT: &str =
    "You are a professional interviewer and career coach. Provide insightful, detailed, and well-structured responses. Focus on giving comprehensive answers that demonstrate expertise and professionalism.";
pub const DEFAULT_CHAT_OPENING_PROMPT: &str =
    "I am preparing an interview, and these are information of the interview.";
pub const DEFAULT_TRANSCRIPT_PROMPT: &str =
    "This is chat history till now in this interview, make valid answer or next sentence, don't need any explanation, only few sentences of answer.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error: {0}")] IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")] JsonError(#[from] serde_json::Error),
}

/// System preambles placed in front of the selected history.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    /// Preamble for chat turns sent over the WebSocket.
    pub chat: String,
    /// Used instead of `chat` when there is no history to send.
    pub chat_opening: String,
    /// Preamble for transcripts submitted over HTTP.
    pub transcript: String,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            chat: DEFAULT_CHAT_PROMPT.to_string(),
            chat_opening: DEFAULT_CHAT_OPENING_PROMPT.to_string(),
            transcript: DEFAULT_TRANSCRIPT_PROMPT.to_string(),
            last_loaded: None,
        }
    }
}

impl PromptConfig {
    pub fn chat_preamble(&self, history_is_empty: bool) -> &str {
        if history_is_empty { &self.chat_opening } else { &self.chat }
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<PromptConfig, PromptError> {
    let modified = fs::metadata(&path)?.modified().ok();
    let file_content = fs::read_to_string(&path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.last_loaded = modified;
    Ok(config)
}

/// Loads prompts from `path`, falling back to the built-in set when the file
/// does not exist. A file that exists but cannot be parsed is an error.
pub fn load_prompts_or_default<P: AsRef<Path>>(path: P) -> Result<PromptConfig, PromptError> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("Prompts file '{}' not found, using built-in prompts", path.display());
        return Ok(PromptConfig::default());
    }
    let config = load_prompts(path)?;
    info!("Loaded prompts from '{}'", path.display());
    Ok(config)
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &PromptConfig
) -> Result<Option<PromptConfig>, PromptError> {
    let metadata = match fs::metadata(&path) {
        Ok(metadata) => metadata,
        // built-in prompts stay in effect until a file appears
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(e) => {
            return Err(e.into());
        }
    };

    if let Ok(modified) = metadata.modified() {
        match current_config.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Prompts file changed, reloading...");
                return Ok(Some(load_prompts(&path)?));
            }
            None => {
                info!("No last_loaded timestamp, reloading prompts...");
                return Ok(Some(load_prompts(&path)?));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_prompts_or_default(dir.path().join("nope.json")).unwrap();
        assert_eq!(config, PromptConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");
        fs::write(&path, r#"{"chat":"Be brief."}"#).unwrap();

        let config = load_prompts_or_default(&path).unwrap();
        assert_eq!(config.chat, "Be brief.");
        assert_eq!(config.transcript, DEFAULT_TRANSCRIPT_PROMPT);
        assert!(config.last_loaded.is_some());
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(load_prompts_or_default(&path), Err(PromptError::JsonError(_))));
    }

    #[test]
    fn opening_preamble_only_for_empty_history() {
        let config = PromptConfig::default();
        assert_eq!(config.chat_preamble(true), DEFAULT_CHAT_OPENING_PROMPT);
        assert_eq!(config.chat_preamble(false), DEFAULT_CHAT_PROMPT);
    }

    #[test]
    fn reload_skips_unchanged_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");
        fs::write(&path, r#"{"chat":"v1"}"#).unwrap();

        let loaded = load_prompts(&path).unwrap();
        assert!(reload_prompts_if_changed(&path, &loaded).unwrap().is_none());

        let reloaded = reload_prompts_if_changed(&path, &PromptConfig::default()).unwrap();
        assert_eq!(reloaded.map(|c| c.chat), Some("v1".to_string()));
    }

    #[test]
    fn reload_of_missing_file_keeps_current_prompts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        let reloaded = reload_prompts_if_changed(&path, &PromptConfig::default()).unwrap();
        assert!(reloaded.is_none());

        fs::write(&path, r#"{"transcript":"late"}"#).unwrap();
        let reloaded = reload_prompts_if_changed(&path, &PromptConfig::default()).unwrap();
        assert_eq!(reloaded.map(|c| c.transcript), Some("late".to_string()));
    }
}
