use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::relay::ChatRelay;
use futures::{ SinkExt, StreamExt };
use log::{ debug, error, info, warn };
use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };
use uuid::Uuid;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

pub fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;

    Ok(Arc::new(config))
}

pub async fn start_ws_server(
    addr: &str,
    relay: ChatRelay,
    api_key: Option<String>,
    tls: Option<(&str, &str)>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = match tls {
        Some((cert_path, key_path)) => {
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            let config = load_tls_config(cert_path, key_path)?;
            Some(TlsAcceptor::from(config))
        }
        None => {
            info!("TLS not enabled. Running plain WebSocket (WS) server.");
            None
        }
    };
    let protocol = if tls_acceptor.is_some() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    let api_key = api_key.filter(|k| !k.trim().is_empty());
    if api_key.is_some() {
        info!("WebSocket server configured with API Key authentication.");
    } else {
        warn!("WebSocket server configured WITHOUT API Key authentication. Connections are open.");
    }

    accept_loop(listener, relay, api_key, tls_acceptor).await
}

pub async fn accept_loop(
    listener: TcpListener,
    relay: ChatRelay,
    api_key: Option<String>,
    tls_acceptor: Option<TlsAcceptor>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;

        info!("Incoming connection from: {}", peer);
        let relay_clone = relay.clone();
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, relay_clone, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, relay_clone, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

/// Key sent by the client as the `X-API-Key` header or the `api_key` query
/// parameter, header first.
fn provided_api_key(req: &Request) -> Option<String> {
    if let Some(key) = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
    {
        return Some(key.to_owned());
    }
    req.uri()
        .query()?
        .split('&')
        .find_map(|pair| {
            let mut kv = pair.splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("api_key"), Some(value)) => Some(value.to_string()),
                _ => None,
            }
        })
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    relay: ChatRelay,
    required_api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = move |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let Some(required) = required_api_key.as_deref() else {
            debug!("{} no API key required", peer);
            return Ok(response);
        };
        if provided_api_key(req).as_deref() != Some(required) {
            warn!("{}: bad or missing API key", peer);
            let mut resp = ErrorResponse::new(Some("Unauthorized".into()));
            *resp.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(resp);
        }
        info!("{} authenticated", peer);
        Ok(response)
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, relay).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

pub async fn handle_connection<S>(peer: SocketAddr, websocket: WebSocketStream<S>, relay: ChatRelay)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let conn_id = Uuid::new_v4();
    info!("New WebSocket connection: {} (connection {})", peer, conn_id);

    let (mut ws_tx, mut ws_rx) = websocket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Everything bound for this client, replies and room broadcasts alike, goes through `tx`.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize event for {}: {}", peer, e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(json)).await {
                debug!("Error sending to {}: {}", peer, e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let _ = tx.send(ServerMessage::Error {
                        message: "Message too large".to_string(),
                    });
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::SetToken { token }) => {
                                let history = relay.join(&token, conn_id, tx.clone()).await;
                                let _ = tx.send(ServerMessage::ChatHistory { messages: history });
                            }
                            Ok(ClientMessage::ChatMessage { token, message }) => {
                                let relay = relay.clone();
                                tokio::spawn(async move {
                                    if let Err(e) = relay.chat(&token, &message).await {
                                        debug!("Chat turn for {} ended with error: {}", token, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let _ = tx.send(ServerMessage::Error {
                                    message: format!("Failed to parse message: {}", e),
                                });
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    // pings are answered by tungstenite itself
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }

    relay.leave(conn_id).await;
    drop(tx);
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", peer, e);
    }
    info!("WebSocket connection closed for {} (connection {})", peer, conn_id);
}
