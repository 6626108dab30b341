//! Browser chat UI: a question form with optional uploads and the session transcript.

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use html_escape::encode_text;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::answer::Generator;
use crate::database::VectorStore;
use crate::document::UploadedFile;
use crate::embeddings::Embedder;
use crate::rag::{DefaultPipeline, RagPipeline};
use crate::session::{ChatMessage, ChatSession, Role};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// State shared by the handlers of one server
pub struct AppState {
    /// Locked for the whole query so the index is never rebuilt mid-answer
    pipeline: Mutex<DefaultPipeline>,
    session: Mutex<ChatSession>,
}

impl AppState {
    pub fn new(pipeline: DefaultPipeline) -> Self {
        AppState {
            pipeline: Mutex::new(pipeline),
            session: Mutex::new(ChatSession::new()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/chat", post(chat))
        .route("/reset", post(reset))
        .route("/api/history", get(history))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Serve the chat UI until the process is stopped
pub async fn serve(pipeline: DefaultPipeline, bind: SocketAddr) -> Result<()> {
    let app = router(Arc::new(AppState::new(pipeline)));

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Chat UI listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Web server failed")?;
    Ok(())
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_page(session.messages()))
}

async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<ChatMessage>> {
    let session = state.session.lock().await;
    Json(session.messages().to_vec())
}

async fn reset(State(state): State<Arc<AppState>>) -> Redirect {
    state.session.lock().await.clear();
    info!("Chat session cleared");
    Redirect::to("/")
}

async fn chat(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Redirect, (StatusCode, String)> {
    let mut query = String::new();
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "query" => {
                query = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            }
            "files" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                // Browsers send an empty part when no file was picked
                if !file_name.is_empty() {
                    uploads.push(UploadedFile::new(file_name, data.to_vec()));
                }
            }
            _ => {}
        }
    }

    let timestamp = chrono::Local::now().format("%I:%M %p").to_string();
    submit_query(&state.pipeline, &state.session, &query, &uploads, &timestamp).await?;

    Ok(Redirect::to("/"))
}

/// Answer one submitted question and append the exchange to the transcript.
///
/// Blank queries are ignored. A failed query answers 500 and records nothing.
pub async fn submit_query<E: Embedder, G: Generator, S: VectorStore>(
    pipeline: &Mutex<RagPipeline<E, G, S>>,
    session: &Mutex<ChatSession>,
    query: &str,
    uploads: &[UploadedFile],
    timestamp: &str,
) -> Result<(), (StatusCode, String)> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(());
    }

    let result = {
        let mut pipeline = pipeline.lock().await;
        pipeline.answer(query, uploads).await.map_err(|e| {
            error!("Query failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        })?
    };

    session
        .lock()
        .await
        .record_exchange(query, &result.answer, result.source, timestamp);
    Ok(())
}

/// Full HTML page: header, question form, transcript newest-last
pub fn render_page(messages: &[ChatMessage]) -> String {
    let transcript: String = messages.iter().map(render_message).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Document RAG Chatbot</title>
<style>{style}</style>
</head>
<body>
<h1>Document RAG Chatbot</h1>
<p class="subtitle">Ask any question based on the uploaded documents</p>
<div class="chat-scroll" id="chat">{transcript}</div>
<form action="/chat" method="post" enctype="multipart/form-data">
<input type="text" name="query" placeholder="Type your question here..." autofocus>
<input type="file" name="files" accept=".pdf,.docx" multiple>
<button type="submit">Send</button>
</form>
<form action="/reset" method="post"><button type="submit">New session</button></form>
<script>const c = document.getElementById("chat"); c.scrollTop = c.scrollHeight;</script>
</body>
</html>"#,
        style = STYLE,
        transcript = transcript,
    )
}

fn render_message(message: &ChatMessage) -> String {
    match message.role {
        Role::User => format!(
            r#"<div class="chat-row chat-left"><div><div class="bubble user-bubble">{}</div><div class="timestamp">{}</div></div></div>"#,
            encode_text(&message.text),
            encode_text(&message.time),
        ),
        Role::Bot => format!(
            r#"<div class="chat-row chat-right"><div><div class="bubble bot-bubble">{}<br><small>Source: {}</small></div><div class="timestamp">{}</div></div></div>"#,
            encode_text(&message.text),
            encode_text(message.source.as_deref().unwrap_or("None")),
            encode_text(&message.time),
        ),
    }
}

const STYLE: &str = "\
body { background-color: #121212; color: #e0e0e0; font-family: sans-serif; margin: 2rem; }
h1, .subtitle { text-align: center; }
.chat-scroll { max-height: 70vh; overflow-y: auto; padding-right: 10px; }
.chat-row { display: flex; margin-bottom: 1rem; }
.chat-left { justify-content: flex-start; margin-right: 25%; }
.chat-right { justify-content: flex-end; margin-left: 25%; }
.bubble { padding: 12px 16px; border-radius: 18px; line-height: 1.5; white-space: pre-wrap; word-wrap: break-word; }
.user-bubble { background-color: #1e88e5; color: white; border-top-left-radius: 0; }
.bot-bubble { background-color: #2e7d32; color: #fff; border-top-right-radius: 0; }
.timestamp { font-size: 0.7rem; color: #aaa; margin-top: 4px; }
.chat-right .timestamp { text-align: right; }
form { display: flex; gap: 0.5rem; margin-top: 1rem; }
input[type=text] { flex: 1; padding: 0.5rem; }
";
