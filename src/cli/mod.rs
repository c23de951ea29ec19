use clap::Parser;

use crate::history::selector::{ MAX_CONTEXT_LENGTH, RESPONSE_BUFFER };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History chat store type (file, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Path of the JSON document holding every conversation (file store only)
    #[arg(long, env = "HISTORY_PATH", default_value = "chat_histories.json")]
    pub history_path: String,

    /// Context window of the chat model, in estimated tokens.
    #[arg(long, env = "MAX_CONTEXT_LENGTH", default_value_t = MAX_CONTEXT_LENGTH)]
    pub max_context_length: usize,

    /// Tokens kept free for the model's reply when trimming history.
    #[arg(long, env = "RESPONSE_BUFFER", default_value_t = RESPONSE_BUFFER)]
    pub response_buffer: usize,

    // --- Chat LLM Args ---
    /// API Key for the OpenAI chat completions API
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Base URL for the chat completions API (e.g., https://api.openai.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let the client pick
    pub chat_base_url: Option<String>,

    /// Model name override. Without it the model follows --environment.
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Deployment environment (development, production). Selects the default model.
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Path to the prompt configuration file.
    #[arg(long, env = "PROMPTS_PATH", default_value = "json/prompts.json")]
    pub prompts_path: String,

    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8001")]
    pub server_addr: String,

    /// Port for the HTTP API (bound on 0.0.0.0).
    #[arg(long, env = "HTTP_PORT", default_value = "8000")]
    pub http_port: u16,

    /// Optional API Key required for clients to open the WebSocket. Clients send it
    /// as the X-API-Key header or the api_key query parameter.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Budget handed to the history selector.
    pub fn max_history_tokens(&self) -> usize {
        self.max_context_length.saturating_sub(self.response_buffer)
    }

    pub fn tls_paths(&self) -> Option<(&str, &str)> {
        if !self.enable_tls {
            return None;
        }
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_budget() {
        let args = Args::parse_from(["chat-relay"]);
        assert_eq!(args.history_type, "file");
        assert_eq!(args.http_port, 8000);
        assert_eq!(args.max_history_tokens(), 126_000);
        assert!(args.tls_paths().is_none());
    }

    #[test]
    fn tls_needs_flag_and_both_paths() {
        let args = Args::parse_from([
            "chat-relay",
            "--tls-cert-path",
            "cert.pem",
            "--tls-key-path",
            "key.pem",
        ]);
        assert!(args.tls_paths().is_none());

        let args = Args::parse_from([
            "chat-relay",
            "--enable-tls",
            "--tls-cert-path",
            "cert.pem",
            "--tls-key-path",
            "key.pem",
        ]);
        assert_eq!(args.tls_paths(), Some(("cert.pem", "key.pem")));
    }

    #[test]
    fn buffer_larger_than_context_saturates() {
        let args = Args::parse_from([
            "chat-relay",
            "--max-context-length",
            "10",
            "--response-buffer",
            "20",
        ]);
        assert_eq!(args.max_history_tokens(), 0);
    }
}
