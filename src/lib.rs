pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;
pub mod session;

use cli::Args;
use log::info;
use relay::ChatRelay;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Port: {}", args.http_port);
    info!("Environment: {}", args.environment);
    info!("History Store Type: {}", args.history_type);
    info!("History Path: {}", args.history_path);
    info!("History Token Budget: {}", args.max_history_tokens());
    info!("Prompts Path: {}", args.prompts_path);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let relay = ChatRelay::new(&args).await?;
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, relay, args.clone());
    server.run().await?;

    Ok(())
}
