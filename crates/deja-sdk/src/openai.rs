//! OpenAI-compatible HTTP completion client

use crate::client::{ChatCompletion, ChatCompletions, ChatRequest, CompletionChunk, CompletionStream};
use deja_core::error::{DejaError, DejaResult};
use deja_core::history::Message;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::instrument;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Completion client for OpenAI and OpenAI-compatible endpoints.
///
/// Speaks the `/chat/completions` wire protocol; point `base_url` at any
/// compatible server. Implements [`ChatCompletions`], so it can be wrapped
/// by [`CachedCompletions`](crate::cached::CachedCompletions) directly.
pub struct OpenAiClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Create a client against the official OpenAI endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: Some(api_key.into()),
        }
    }

    /// Point the client at a compatible server (trailing slash stripped)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Drop authentication (local servers)
    pub fn without_api_key(mut self) -> Self {
        self.api_key = None;
        self
    }

    fn request_body(request: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(Self::wire_message)
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });
        if stream {
            body["stream"] = json!(true);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn wire_message(message: &Message) -> Value {
        let mut wire = json!({
            "role": message.role.to_string(),
            "content": message.content,
        });
        if let Some(tool_calls) = &message.tool_calls {
            wire["tool_calls"] = json!(tool_calls);
        }
        wire
    }

    async fn post(&self, request: &ChatRequest, stream: bool) -> DejaResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut http_request = self
            .http_client
            .post(&url)
            .json(&Self::request_body(request, stream));
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request
            .send()
            .await
            .map_err(|e| DejaError::completion(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DejaError::completion(format!(
                "API error (status {status}): {error_text}"
            )));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ChatCompletions for OpenAiClient {
    #[instrument(skip(self, request), fields(model = %request.model), level = "debug")]
    async fn create(&self, request: ChatRequest) -> DejaResult<ChatCompletion> {
        let response = self.post(&request, false).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| DejaError::completion(format!("failed to parse response: {e}")))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(ChatCompletion {
            id: body["id"].as_str().unwrap_or_default().to_string(),
            model: body["model"]
                .as_str()
                .unwrap_or(&request.model)
                .to_string(),
            content,
            finish_reason: body["choices"][0]["finish_reason"]
                .as_str()
                .map(str::to_string),
            created: body["created"].as_i64().unwrap_or_default(),
        })
    }

    async fn create_stream(&self, request: ChatRequest) -> DejaResult<CompletionStream> {
        let response = self.post(&request, true).await?;
        let byte_stream = response.bytes_stream();

        // Buffer bytes into lines; `data:` lines carry one JSON delta each,
        // `data: [DONE]` terminates the stream.
        let stream = byte_stream
            .map(|chunk| {
                chunk.map_err(|e| DejaError::completion(format!("stream error: {e}")))
            })
            .scan(String::new(), |buffer, chunk| {
                let chunks = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let mut out = Vec::new();
                        while let Some(newline) = buffer.find('\n') {
                            let line: String = buffer.drain(..=newline).collect();
                            if let Some(parsed) = parse_sse_line(line.trim_end()) {
                                out.push(Ok(parsed));
                            }
                        }
                        out
                    }
                    Err(e) => vec![Err(e)],
                };
                futures::future::ready(Some(futures::stream::iter(chunks)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}

/// Parse one SSE line into a chunk, if it carries one.
fn parse_sse_line(line: &str) -> Option<CompletionChunk> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return Some(CompletionChunk::final_chunk(Some("stop".to_string())));
    }
    let value: Value = serde_json::from_str(data).ok()?;
    let delta = value["choices"][0]["delta"]["content"].as_str()?;
    Some(CompletionChunk::content(delta))
}
