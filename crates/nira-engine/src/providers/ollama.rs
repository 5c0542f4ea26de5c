//! Local Ollama daemon engine
//!
//! Model acquisition goes through the native `/api/pull` endpoint, which
//! streams newline-delimited JSON status lines. Chat goes through the
//! OpenAI-compatible `/v1/chat/completions` endpoint as server-sent events.

use std::collections::HashMap;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use crate::{
    engine::{Engine, ProgressSink},
    error::{Error, Result},
    stream::{ChunkStream, StreamChunk},
    types::{ChatMessage, RawProgress, SamplingOptions, Usage},
};

/// Default daemon address
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// How long the daemon keeps a warmed model resident
const KEEP_ALIVE: &str = "30m";

/// Engine backed by a local Ollama daemon
pub struct OllamaEngine {
    client: reqwest::Client,
    base_url: String,
    loaded_model: Mutex<Option<String>>,
}

impl OllamaEngine {
    /// Create an engine for a daemon at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            loaded_model: Mutex::new(None),
        }
    }

    /// Create from `OLLAMA_HOST`, falling back to the default address
    pub fn from_env() -> Self {
        match std::env::var("OLLAMA_HOST") {
            Ok(host) if !host.trim().is_empty() => {
                let host = host.trim();
                if host.starts_with("http://") || host.starts_with("https://") {
                    Self::new(host)
                } else {
                    Self::new(format!("http://{}", host))
                }
            }
            _ => Self::new(DEFAULT_BASE_URL),
        }
    }

    /// Base URL of the daemon
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The model most recently loaded successfully
    pub fn loaded_model(&self) -> Option<String> {
        self.loaded_model.lock().clone()
    }

    async fn pull(&self, model_id: &str, progress: &ProgressSink) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&PullRequest {
                model: model_id,
                stream: true,
            })
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api("pull_error", error_text(&text, status)));
        }

        let mut tracker = PullTracker::default();
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(update) = tracker.process_line(&line)? {
                    progress(update);
                }
            }
        }
        if let Some(update) = tracker.process_line(&buffer)? {
            progress(update);
        }

        if !tracker.succeeded {
            return Err(Error::UnexpectedResponse(
                "pull stream ended without success status".into(),
            ));
        }
        Ok(())
    }

    async fn warm(&self, model_id: &str) -> Result<()> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&WarmRequest {
                model: model_id,
                keep_alive: KEEP_ALIVE,
                stream: false,
            })
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::api("load_error", error_text(&text, status)));
        }
        if let Ok(StatusLine {
            error: Some(message),
            ..
        }) = serde_json::from_str::<StatusLine>(&text)
        {
            return Err(Error::api("load_error", message));
        }
        Ok(())
    }

    fn build_request<'a>(
        &self,
        model: &'a str,
        messages: &'a [ChatMessage],
        options: &SamplingOptions,
    ) -> CompletionRequest<'a> {
        CompletionRequest {
            model,
            messages: messages
                .iter()
                .map(|m| CompletionMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: true,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stream_options: StreamOptions {
                include_usage: true,
            },
        }
    }
}

impl Default for OllamaEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl Engine for OllamaEngine {
    async fn load(&self, model_id: &str, progress: ProgressSink) -> Result<()> {
        tracing::debug!("Pulling {} from {}", model_id, self.base_url);
        self.pull(model_id, &progress).await?;

        progress(RawProgress::stage("Loading model into memory…"));
        self.warm(model_id).await?;

        *self.loaded_model.lock() = Some(model_id.to_string());
        Ok(())
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        options: &SamplingOptions,
    ) -> Result<ChunkStream> {
        let model = self
            .loaded_model()
            .ok_or_else(|| Error::Unavailable("no model loaded".into()))?;

        let request = self.build_request(&model, &messages, options);
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request_builder = self.client.post(&url).json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }
}

fn map_send_error(e: reqwest::Error) -> Error {
    if e.is_connect() {
        Error::Unavailable(format!("cannot reach the local engine: {}", e))
    } else {
        Error::Http(e)
    }
}

/// Prefer the daemon's `{"error": ...}` body over the raw text.
fn error_text(body: &str, status: reqwest::StatusCode) -> String {
    match serde_json::from_str::<StatusLine>(body) {
        Ok(StatusLine {
            error: Some(message),
            ..
        }) => message,
        _ if body.trim().is_empty() => format!("HTTP {}", status),
        _ => body.trim().to_string(),
    }
}

fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = Result<StreamChunk>> {
    stream! {
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        break;
                    }
                    match parse_completion_chunk(&msg.data) {
                        Ok(Some(chunk)) => yield Ok(chunk),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            break;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let text = response.text().await.unwrap_or_default();
                    yield Err(Error::api("chat_error", error_text(&text, status)));
                    break;
                }
                Err(e) => {
                    yield Err(Error::Sse(e.to_string()));
                    break;
                }
            }
        }
        event_source.close();
    }
}

/// Parse one SSE `data:` payload. `None` means nothing useful in the chunk.
fn parse_completion_chunk(data: &str) -> Result<Option<StreamChunk>> {
    let chunk: CompletionChunk = serde_json::from_str(data)
        .map_err(|e| Error::UnexpectedResponse(format!("Failed to parse chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(Error::api("chat_error", error.message));
    }

    let delta: String = chunk
        .choices
        .iter()
        .filter_map(|c| c.delta.content.as_deref())
        .collect();
    let usage = chunk
        .usage
        .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens));

    if delta.is_empty() && usage.is_none() {
        return Ok(None);
    }
    Ok(Some(StreamChunk { delta, usage }))
}

/// Aggregates per-layer pull progress into one fraction.
#[derive(Debug, Default)]
struct PullTracker {
    layers: HashMap<String, (u64, u64)>,
    succeeded: bool,
}

impl PullTracker {
    fn process_line(&mut self, line: &[u8]) -> Result<Option<RawProgress>> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let status: StatusLine = serde_json::from_str(line)?;
        if let Some(message) = status.error {
            return Err(Error::api("pull_error", message));
        }

        if let (Some(digest), Some(total)) = (status.digest.as_ref(), status.total) {
            let completed = status.completed.unwrap_or(0).min(total);
            self.layers.insert(digest.clone(), (completed, total));
        }

        let stage = status.status.unwrap_or_default();
        if stage == "success" {
            self.succeeded = true;
            return Ok(Some(RawProgress::fraction(1.0).with_stage("Download complete")));
        }

        let fraction = if status.total.is_some() {
            self.fraction()
        } else {
            None
        };
        Ok(Some(RawProgress {
            fraction,
            stage_text: if stage.is_empty() { None } else { Some(stage) },
        }))
    }

    fn fraction(&self) -> Option<f64> {
        let (completed, total) = self
            .layers
            .values()
            .fold((0u64, 0u64), |(c, t), (lc, lt)| (c + lc, t + lt));
        if total == 0 {
            None
        } else {
            Some(completed as f64 / total as f64)
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WarmRequest<'a> {
    model: &'a str,
    keep_alive: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StatusLine {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    stream: bool,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    stream_options: StreamOptions,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
    #[serde(default)]
    error: Option<CompletionError>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    delta: CompletionDelta,
}

#[derive(Debug, Deserialize)]
struct CompletionDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_tracker_aggregates_layers() {
        let mut tracker = PullTracker::default();

        let p = tracker
            .process_line(br#"{"status":"pulling manifest"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(p.fraction, None);
        assert_eq!(p.stage_text.as_deref(), Some("pulling manifest"));

        let p = tracker
            .process_line(br#"{"status":"pulling a","digest":"a","total":100,"completed":50}"#)
            .unwrap()
            .unwrap();
        assert_eq!(p.fraction, Some(0.5));

        // A second layer joins the denominator
        let p = tracker
            .process_line(br#"{"status":"pulling b","digest":"b","total":100,"completed":0}"#)
            .unwrap()
            .unwrap();
        assert_eq!(p.fraction, Some(0.25));
    }

    #[test]
    fn test_pull_tracker_success_and_blank_lines() {
        let mut tracker = PullTracker::default();
        assert!(tracker.process_line(b"  \n").unwrap().is_none());
        let p = tracker
            .process_line(br#"{"status":"success"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(p.fraction, Some(1.0));
        assert!(tracker.succeeded);
    }

    #[test]
    fn test_pull_tracker_error_line() {
        let mut tracker = PullTracker::default();
        let err = tracker
            .process_line(br#"{"error":"pull model manifest: file does not exist"}"#)
            .unwrap_err();
        assert_eq!(err.diagnostic(), "pull model manifest: file does not exist");
    }

    #[test]
    fn test_parse_completion_delta() {
        let chunk = parse_completion_chunk(
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.delta, "Hel");
        assert_eq!(chunk.usage, None);
    }

    #[test]
    fn test_parse_completion_usage_only() {
        let chunk = parse_completion_chunk(
            r#"{"choices":[],"usage":{"prompt_tokens":12,"completion_tokens":5,"total_tokens":17}}"#,
        )
        .unwrap()
        .unwrap();
        assert!(chunk.delta.is_empty());
        assert_eq!(chunk.usage, Some(Usage::new(12, 5)));
    }

    #[test]
    fn test_parse_completion_empty_delta_is_skipped() {
        let chunk = parse_completion_chunk(
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert!(chunk.is_none());
    }

    #[test]
    fn test_parse_completion_error() {
        let err = parse_completion_chunk(r#"{"error":{"message":"model not loaded"}}"#).unwrap_err();
        assert_eq!(err.diagnostic(), "model not loaded");
        assert!(parse_completion_chunk("not json").is_err());
    }

    #[test]
    fn test_build_request_shape() {
        let engine = OllamaEngine::new("http://localhost:11434/");
        assert_eq!(engine.base_url(), "http://localhost:11434");

        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let request = engine.build_request("smollm2:360m", &messages, &SamplingOptions::default());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "smollm2:360m");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["max_tokens"], 1024);
    }

    #[test]
    fn test_error_text_prefers_json_error() {
        let status = reqwest::StatusCode::NOT_FOUND;
        assert_eq!(error_text(r#"{"error":"model 'x' not found"}"#, status), "model 'x' not found");
        assert_eq!(error_text("", status), "HTTP 404 Not Found");
        assert_eq!(error_text(" plain ", status), "plain");
    }

    #[tokio::test]
    async fn test_stream_chat_without_load_is_unavailable() {
        let engine = OllamaEngine::default();
        let result = engine
            .stream_chat(vec![ChatMessage::user("hi")], &SamplingOptions::default())
            .await;
        assert!(matches!(result, Err(Error::Unavailable(_))));
    }
}
