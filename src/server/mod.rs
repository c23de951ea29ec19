pub mod api;
pub mod websocket;

use crate::cli::Args;
use crate::relay::ChatRelay;
use log::error;
use std::error::Error;

pub struct Server {
    addr: String,
    relay: ChatRelay,
    args: Args,
}

impl Server {
    pub fn new(addr: String, relay: ChatRelay, args: Args) -> Self {
        Self { addr, relay, args }
    }

    /// Starts the HTTP API in the background, then serves WebSocket clients
    /// until the listener fails.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.args.enable_tls && self.args.tls_paths().is_none() {
            error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
            return Err("Missing TLS certificate or key path".into());
        }
        self.start_http_server().await?;
        self.start_ws_server().await?;
        Ok(())
    }

    async fn start_http_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(self.args.http_port, self.relay.clone(), self.args.tls_paths()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.addr,
            self.relay.clone(),
            self.args.server_api_key.clone(),
            self.args.tls_paths()
        ).await
    }
}
