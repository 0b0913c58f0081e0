use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use bulletin_core::{ModelLimits, Tokenizer, TokenizerKind};
use bulletin_engine::Session;
use bulletin_llm::HttpCompletionClient;

struct AppState {
    client: HttpCompletionClient,
    tokenizer: Tokenizer,
    limits: ModelLimits,
    history_budget: usize,
    workers: usize,
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Session>>>>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    let base_url = std::env::var("BULLETIN_BASE_URL")
        .map_err(|_| anyhow::anyhow!("BULLETIN_BASE_URL is not set"))?;
    let api_key = std::env::var("BULLETIN_API_KEY")
        .map_err(|_| anyhow::anyhow!("BULLETIN_API_KEY is not set"))?;
    let model =
        std::env::var("BULLETIN_MODEL").unwrap_or_else(|_| "llama-3-8b-instruct".to_string());
    let timeout = Duration::from_secs(env_usize("BULLETIN_TIMEOUT_SECS", 120) as u64);
    let defaults = ModelLimits::default();
    let state = Arc::new(AppState {
        client: HttpCompletionClient::new(base_url, api_key, model).with_timeout(timeout),
        tokenizer: TokenizerKind::default().build()?,
        limits: ModelLimits {
            context_window: env_usize("BULLETIN_CONTEXT_WINDOW", defaults.context_window),
            max_output_tokens: env_usize(
                "BULLETIN_MAX_OUTPUT_TOKENS",
                defaults.max_output_tokens,
            ),
            safety_buffer: env_usize("BULLETIN_SAFETY_BUFFER", defaults.safety_buffer),
        },
        history_budget: env_usize("BULLETIN_HISTORY_BUDGET", 3000),
        workers: env_usize("BULLETIN_WORKERS", 8),
        sessions: Mutex::new(HashMap::new()),
    });
    let app = Router::new()
        .route("/healthz", get(handle_health))
        .route("/summarize", post(handle_summarize))
        .route("/chat", post(handle_chat))
        .with_state(state);
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn env_usize(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn handle_health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct SummarizeRequest {
    text: String,
    instructions: Option<String>,
}

#[derive(Debug, Serialize)]
struct SummarizeResponse {
    summary: String,
}

async fn handle_summarize(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::bad_request("text is empty"));
    }
    let prompt = match &body.instructions {
        Some(instructions) => format!(
            "{instructions}\n\nUser Input:\nPlease provide a summary based on the above \
             considerations and the attached file content.\n\nAttached File Content:\n{}",
            body.text
        ),
        None => body.text.clone(),
    };
    let mut session = Session::new(state.limits)
        .with_history_budget(state.history_budget)
        .with_workers(state.workers);
    let summary = session
        .answer(&state.client, &state.tokenizer, &prompt, None)
        .await
        .map_err(AppError::turn)?;
    Ok(Json(SummarizeResponse { summary }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default = "default_session_id")]
    session: String,
    prompt: String,
    excerpt: Option<String>,
}

fn default_session_id() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    session: String,
    reply: String,
    turns: usize,
}

async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if body.prompt.trim().is_empty() {
        return Err(AppError::bad_request("prompt is empty"));
    }
    let session = {
        let mut sessions = state
            .sessions
            .lock()
            .expect("session registry lock poisoned");
        Arc::clone(sessions.entry(body.session.clone()).or_insert_with(|| {
            Arc::new(tokio::sync::Mutex::new(
                Session::new(state.limits)
                    .with_history_budget(state.history_budget)
                    .with_workers(state.workers),
            ))
        }))
    };
    let mut session = session.lock().await;
    let reply = session
        .answer(
            &state.client,
            &state.tokenizer,
            &body.prompt,
            body.excerpt.as_deref(),
        )
        .await
        .map_err(AppError::turn)?;
    Ok(Json(ChatResponse {
        session: body.session,
        reply,
        turns: session.history().len() / 2,
    }))
}

#[derive(Error, Debug)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("turn failed: {0}")]
    Turn(String),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn turn<E: ToString>(err: E) -> Self {
        Self::Turn(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Turn(msg) => {
                error!("turn_error" = %msg);
                (StatusCode::BAD_GATEWAY, msg).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_defaults_session_id() {
        let body: ChatRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(body.session, "default");
        assert!(body.excerpt.is_none());
    }

    #[test]
    fn bad_request_maps_to_400() {
        let response = AppError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn turn_error_maps_to_502() {
        let response = AppError::turn("backend down").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
