use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered messages for one completion call.
pub type MessageSet = Vec<Message>;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: MessageSet,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned status {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),
}

/// Seam to the completion service. The engine talks to this trait only, so
/// tests inject stubs and production wires the streaming HTTP client.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Streaming client for an OpenAI-compatible `/chat/completions` endpoint.
/// The response is accumulated from SSE `data:` content deltas terminated
/// by the `[DONE]` sentinel.
pub struct HttpCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn stream_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, ServiceError> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let payload = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "max_tokens": request.max_tokens,
            "stream": true,
        });
        debug!(url = %url, max_tokens = request.max_tokens, "starting streaming completion");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http { status, body });
        }
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();
        while let Some(piece) = stream.next().await {
            let piece = piece?;
            buffer.push_str(&String::from_utf8_lossy(&piece));
            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                if !consume_stream_line(line.trim_end(), &mut content) {
                    return Ok(content);
                }
            }
        }
        Ok(content)
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        match tokio::time::timeout(self.timeout, self.stream_completion(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.timeout)),
        }
    }
}

/// Fold one SSE line into `content`. Returns `false` once the `[DONE]`
/// sentinel is reached. Lines that fail to parse are skipped, not fatal.
fn consume_stream_line(line: &str, content: &mut String) -> bool {
    let Some(data) = line.strip_prefix("data: ") else {
        return true;
    };
    if data.trim() == "[DONE]" {
        return false;
    }
    match serde_json::from_str::<StreamDelta>(data) {
        Ok(delta) => {
            if let Some(text) = delta.content() {
                content.push_str(text);
            }
        }
        Err(err) => warn!(%err, line = %data, "skipping malformed stream line"),
    }
    true
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: DeltaContent,
}

#[derive(Deserialize, Default)]
struct DeltaContent {
    content: Option<String>,
}

impl StreamDelta {
    fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_content_deltas() {
        let mut content = String::new();
        assert!(consume_stream_line(
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            &mut content
        ));
        assert!(consume_stream_line(
            r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
            &mut content
        ));
        assert_eq!(content, "Hello");
    }

    #[test]
    fn done_sentinel_stops_the_stream() {
        let mut content = String::new();
        assert!(!consume_stream_line("data: [DONE]", &mut content));
        assert!(content.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mut content = String::new();
        assert!(consume_stream_line("data: {not json", &mut content));
        assert!(consume_stream_line(
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
            &mut content
        ));
        assert_eq!(content, "ok");
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut content = String::new();
        assert!(consume_stream_line("", &mut content));
        assert!(consume_stream_line(": keep-alive", &mut content));
        assert!(consume_stream_line("event: ping", &mut content));
        assert!(content.is_empty());
    }

    #[test]
    fn deltas_without_content_are_ignored() {
        let mut content = String::new();
        assert!(consume_stream_line(
            r#"data: {"choices":[{"delta":{}}]}"#,
            &mut content
        ));
        assert!(consume_stream_line(r#"data: {"choices":[]}"#, &mut content));
        assert!(content.is_empty());
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let rendered = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(rendered, r#"{"role":"user","content":"hi"}"#);
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
