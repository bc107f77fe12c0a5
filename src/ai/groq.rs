//! Groq provider: OpenAI-compatible chat completions with JSON mode.
//!
//! First in the default chain for latency reasons, and the only provider
//! with a streaming path; SSE deltas are handed to the caller token by
//! token while the full response is assembled for parsing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{parse, AiProvider};
use crate::types::{HeraldError, SummaryRequest, SummaryResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Completions tolerate far more latency than feed fetches.
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct GroqProvider {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl GroqProvider {
    pub fn new(api_key: SecretString, model: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build Groq HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    fn chat_request<'a>(&'a self, request: &'a SummaryRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            // Groq rejects JSON mode on streamed requests; the streaming
            // path leans on prompt discipline plus the tolerant parser.
            response_format: (!stream).then_some(ResponseFormat {
                format_type: "json_object",
            }),
            stream: stream.then_some(true),
        }
    }

    /// Stream one completion, invoking `on_token` for every content delta.
    ///
    /// Returns the fully assembled result once the upstream stream ends.
    /// Tokens are only delivered while this future runs, so the caller
    /// controls which terminal event follows.
    pub async fn complete_stream<F>(
        &self,
        request: &SummaryRequest,
        mut on_token: F,
    ) -> Result<SummaryResult, HeraldError>
    where
        F: FnMut(&str),
    {
        let resp = self
            .http
            .post(GROQ_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.chat_request(request, true))
            .send()
            .await
            .map_err(|e| HeraldError::provider("groq", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HeraldError::provider("groq", format!("HTTP {status}: {body}")));
        }

        let mut body_stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        let mut assembled = String::new();
        let mut truncated = false;

        'read: while let Some(chunk) = body_stream.next().await {
            let chunk =
                chunk.map_err(|e| HeraldError::provider("groq", format!("stream read: {e}")))?;
            buf.extend_from_slice(&chunk);

            // SSE frames are newline-delimited; one network chunk may carry
            // several lines or cut one in half. Splitting on a byte keeps
            // multi-byte characters intact since 0x0A never appears inside
            // a UTF-8 sequence.
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line_bytes);

                let Some(data) = sse_data(line.trim()) else {
                    continue;
                };
                if data == "[DONE]" {
                    break 'read;
                }

                match serde_json::from_str::<StreamChunk>(data) {
                    Ok(parsed) => {
                        let Some(choice) = parsed.choices.first() else {
                            continue;
                        };
                        if let Some(text) =
                            choice.delta.as_ref().and_then(|d| d.content.as_deref())
                        {
                            if !text.is_empty() {
                                assembled.push_str(text);
                                on_token(text);
                            }
                        }
                        if choice.finish_reason.as_deref() == Some("length") {
                            truncated = true;
                        }
                    }
                    Err(e) => debug!(error = %e, "Skipping malformed stream chunk"),
                }
            }
        }

        if assembled.is_empty() {
            return Err(HeraldError::provider("groq", "empty streaming response"));
        }
        if truncated {
            warn!("Groq streaming response truncated at max_tokens");
        }

        let result = parse::parse_summary(&assembled).ok_or_else(|| {
            HeraldError::provider(
                "groq",
                format!("unparseable JSON: {}", parse::preview(&assembled)),
            )
        })?;

        Ok(parse::normalize(result))
    }
}

#[async_trait]
impl AiProvider for GroqProvider {
    fn name(&self) -> &'static str {
        "groq"
    }

    async fn complete(&self, request: &SummaryRequest) -> Result<SummaryResult, HeraldError> {
        let resp = self
            .http
            .post(GROQ_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.chat_request(request, false))
            .send()
            .await
            .map_err(|e| HeraldError::provider("groq", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HeraldError::provider("groq", format!("HTTP {status}: {body}")));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| HeraldError::provider("groq", format!("response decode: {e}")))?;

        let choice = body.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        debug!(
            finish_reason = finish_reason.as_deref().unwrap_or("-"),
            chars = content.chars().count(),
            "Groq response received"
        );

        if content.is_empty() {
            return Err(HeraldError::provider("groq", "empty response"));
        }
        if finish_reason.as_deref() == Some("length") {
            warn!("Groq response truncated at max_tokens");
        }

        let result = parse::parse_summary(&content).ok_or_else(|| {
            HeraldError::provider(
                "groq",
                format!("unparseable JSON: {}", parse::preview(&content)),
            )
        })?;

        Ok(parse::normalize(result))
    }
}

/// Payload of one SSE `data:` line; comments and other fields are `None`.
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
