use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::agent::ERROR_REPLY_PREFIX;
use crate::context::AppContext;
use crate::error::{Result, ScoutError};

/// Pause between streamed characters.
const CHAR_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub stream: bool,
}

/// Payload of every SSE event on `/api/chat/stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start { message: String },
    Content { content: String },
    Done { message: String },
    Error { message: String },
}

#[derive(Serialize)]
struct StoredEntry {
    role: &'static str,
    content: String,
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/memory", get(memory))
        .route("/api/clear", post(clear))
        .with_state(ctx)
}

/// Bind the configured address and serve until the process exits.
pub async fn serve(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config().server.host, ctx.config().server.port)
        .parse()
        .map_err(|err| ScoutError::Config(format!("invalid listen address: {err}")))?;
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, ctx).await
}

pub async fn serve_on(listener: TcpListener, ctx: AppContext) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "search agent API listening");
    }
    axum::serve(listener, router(ctx).into_make_service())
        .await
        .map_err(|err| ScoutError::Protocol(format!("server error: {err}")))
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Search Agent API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/api/chat (POST)",
            "stream": "/api/chat/stream (POST)",
            "memory": "/api/memory (GET)",
            "clear": "/api/clear (POST)"
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "agent_ready": true }))
}

fn bad_request(detail: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
}

async fn chat(State(ctx): State<AppContext>, Json(req): Json<ChatRequest>) -> Response {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return bad_request("Message cannot be empty");
    }
    if req.stream {
        return stream_reply(ctx, message).into_response();
    }

    let agent = ctx.agent();
    let reply = agent.lock().await.chat(message).await;
    Json(reply).into_response()
}

async fn chat_stream(State(ctx): State<AppContext>, Json(req): Json<ChatRequest>) -> Response {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return bad_request("Message cannot be empty");
    }
    stream_reply(ctx, message).into_response()
}

/// Answer in a background task and replay the finished text one character
/// per event. The query completes even if the client goes away.
fn stream_reply(
    ctx: AppContext,
    message: String,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<StreamEvent>(64);

    tokio::spawn(async move {
        let _ = tx
            .send(StreamEvent::Start {
                message: "Processing your question...".into(),
            })
            .await;

        let agent = ctx.agent();
        let (result, verbose) = {
            let mut agent = agent.lock().await;
            let settings = agent.settings().clone();
            let result = agent.try_query(message, settings.max_iterations).await;
            (result, settings.verbose)
        };
        let answer = match result {
            Ok(answer) => answer.text,
            Err(err) => {
                if verbose {
                    error!(error = ?err, "streamed query failed");
                } else {
                    error!(error = %err, "streamed query failed");
                }
                let _ = tx
                    .send(StreamEvent::Error {
                        message: format!("{ERROR_REPLY_PREFIX}: {err}"),
                    })
                    .await;
                return;
            }
        };

        for ch in answer.chars() {
            let event = StreamEvent::Content {
                content: ch.to_string(),
            };
            if tx.send(event).await.is_err() {
                warn!("stream client disconnected");
                return;
            }
            tokio::time::sleep(CHAR_DELAY).await;
        }

        let _ = tx
            .send(StreamEvent::Done {
                message: "Answer complete".into(),
            })
            .await;
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event)
            .unwrap_or_else(|err| format!(r#"{{"type":"error","message":"Error: {err}"}}"#));
        Ok::<Event, Infallible>(Event::default().data(data))
    });
    Sse::new(stream)
}

async fn memory(State(ctx): State<AppContext>) -> impl IntoResponse {
    let agent = ctx.agent();
    let agent = agent.lock().await;
    let messages: Vec<StoredEntry> = agent
        .memory()
        .window()
        .iter()
        .map(|message| StoredEntry {
            role: message.role().as_str(),
            content: message.content().to_string(),
        })
        .collect();

    Json(json!({
        "summary": agent.memory_summary(),
        "length": messages.len(),
        "messages": messages,
    }))
}

async fn clear(State(ctx): State<AppContext>) -> impl IntoResponse {
    ctx.agent().lock().await.clear_memory().await;
    Json(json!({ "message": "Memory cleared successfully" }))
}
