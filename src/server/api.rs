use crate::relay::ChatRelay;
use std::error::Error;
use std::net::SocketAddr;
use axum::{
    routing::{ delete, get, post },
    Router,
    Json,
    extract::{ Path, Query, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub token: Option<String>,
    pub transcript: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadChatRequest {
    pub token: Option<String>,
    pub prompt: Option<String>,
    pub response: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteMessageQuery {
    pub timestamp: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Clone)]
struct AppState {
    relay: ChatRelay,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Present and not blank.
fn required(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .filter(|v| !v.trim().is_empty())
}

pub fn router(relay: ChatRelay) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/submit", post(submit_handler))
        .route("/chats", get(list_chats_handler))
        .route("/chats/{token}", get(get_chat_handler).delete(delete_chat_handler))
        .route("/chats/{token}/messages", delete(delete_message_handler))
        .route("/upload-chat", post(upload_chat_handler))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(AppState { relay })
}

pub async fn start_http_server(
    http_port: u16,
    relay: ChatRelay,
    tls: Option<(&str, &str)>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(relay);

    if let Some((cert_path, key_path)) = tls {
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        tokio::spawn(async move {
            let result = axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });

        info!("HTTPS API server started on: https://{}", addr);
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });

        info!("HTTP API server started on: http://{}", addr);
    }

    Ok(())
}

async fn submit_handler(State(state): State<AppState>, Json(req): Json<SubmitRequest>) -> Response {
    let (Some(token), Some(transcript)) = (required(&req.token), required(&req.transcript)) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    match state.relay.submit_transcript(token, transcript, req.timestamp.clone()).await {
        Ok(_) => Json(json!({ "success": true })).into_response(),
        Err(e) => {
            error!("Error processing transcript for {}: {}", token, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error processing transcript")
        }
    }
}

async fn list_chats_handler(State(state): State<AppState>) -> Response {
    match state.relay.list_chats().await {
        Ok(chats) => Json(chats).into_response(),
        Err(e) => {
            error!("Error listing chats: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error listing chats")
        }
    }
}

async fn get_chat_handler(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.relay.history(&token).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => {
            error!("Error getting chat history for {}: {}", token, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error getting chat history")
        }
    }
}

async fn upload_chat_handler(
    State(state): State<AppState>,
    Json(req): Json<UploadChatRequest>
) -> Response {
    let (Some(token), Some(prompt), Some(response)) = (
        required(&req.token),
        required(&req.prompt),
        required(&req.response),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required fields");
    };

    match state.relay.upload_chat(token, prompt, response, req.timestamp.clone()).await {
        Ok(timestamp) => Json(json!({ "success": true, "timestamp": timestamp })).into_response(),
        Err(e) => {
            error!("Error uploading chat for {}: {}", token, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error uploading chat")
        }
    }
}

async fn delete_chat_handler(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.relay.delete_chat(&token).await {
        Ok(true) => Json(json!({ "success": true })).into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Chat not found"),
        Err(e) => {
            error!("Error deleting chat {}: {}", token, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error deleting chat")
        }
    }
}

async fn delete_message_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<DeleteMessageQuery>
) -> Response {
    match state.relay.delete_message(&token, &query.timestamp).await {
        Ok(Some(removed)) => Json(json!({ "success": true, "removed": removed })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Chat not found"),
        Err(e) => {
            error!("Error deleting message {} from {}: {}", query.timestamp, token, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error deleting message")
        }
    }
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.relay.reload_prompts_if_changed().await {
        Ok(true) =>
            (
                StatusCode::OK,
                Json(ReloadResponse { success: true, message: "Prompts reloaded".into() }),
            ),
        Ok(false) =>
            (
                StatusCode::OK,
                Json(ReloadResponse { success: true, message: "Prompts unchanged".into() }),
            ),
        Err(e) => {
            error!("Failed to reload prompts: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReloadResponse { success: false, message: e.to_string() }),
            )
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
