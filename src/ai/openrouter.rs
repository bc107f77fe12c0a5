//! OpenRouter provider: last resort in the fallback chain.
//!
//! OpenRouter fronts many models and not all of them support JSON mode,
//! so the request carries no `response_format`. Prompt discipline plus
//! the tolerant parser carry the weight instead.

use anyhow::{Context, Result};
use async_trait::async_trait;
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

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Free-tier routing can be slow; give it more room than the others.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Attribution headers OpenRouter uses for ranking and abuse tracking.
const REFERER: &str = "http://localhost:8080";
const APP_TITLE: &str = "Herald";

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
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

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

pub struct OpenRouterProvider {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: SecretString, model: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    fn chat_request<'a>(&'a self, request: &'a SummaryRequest) -> ChatRequest<'a> {
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
        }
    }
}

#[async_trait]
impl AiProvider for OpenRouterProvider {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn complete(&self, request: &SummaryRequest) -> Result<SummaryResult, HeraldError> {
        let resp = self
            .http
            .post(OPENROUTER_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .header("HTTP-Referer", REFERER)
            .header("X-Title", APP_TITLE)
            .json(&self.chat_request(request))
            .send()
            .await
            .map_err(|e| HeraldError::provider("openrouter", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HeraldError::provider(
                "openrouter",
                format!("HTTP {status}: {body}"),
            ));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| HeraldError::provider("openrouter", format!("response decode: {e}")))?;

        let choice = body.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        debug!(
            finish_reason = finish_reason.as_deref().unwrap_or("-"),
            chars = content.chars().count(),
            "OpenRouter response received"
        );

        if content.is_empty() {
            return Err(HeraldError::provider("openrouter", "empty response"));
        }
        if finish_reason.as_deref() == Some("length") {
            warn!("OpenRouter response truncated at max_tokens");
        }

        let result = parse::parse_summary(&content).ok_or_else(|| {
            HeraldError::provider(
                "openrouter",
                format!("unparseable JSON: {}", parse::preview(&content)),
            )
        })?;

        Ok(parse::normalize(result))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenRouterProvider {
        OpenRouterProvider::new(
            SecretString::new("test-key".to_string()),
            "qwen/qwen3-30b-a3b:free".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(provider().name(), "openrouter");
    }

    #[test]
    fn test_chat_request_omits_response_format() {
        let p = provider();
        let req = SummaryRequest {
            system_prompt: "시스템".to_string(),
            user_prompt: "사용자".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
        };
        let wire = serde_json::to_value(p.chat_request(&req)).unwrap();

        assert_eq!(wire["model"], "qwen/qwen3-30b-a3b:free");
        assert_eq!(wire["messages"][0]["content"], "시스템");
        assert_eq!(wire["messages"][1]["content"], "사용자");
        assert!(wire.get("response_format").is_none());
        assert!(wire.get("stream").is_none());
    }
}
