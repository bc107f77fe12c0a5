//! Gemini provider: structured output via a response schema.
//!
//! Gemini enforces the summary/keywords shape server-side, but long Korean
//! articles still overrun the output budget. A truncated reply is retried
//! with a larger `maxOutputTokens` instead of being discarded, since the
//! partial text is usually a valid prefix of the summary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{parse, AiProvider};
use crate::types::{HeraldError, SummaryRequest, SummaryResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Extra attempts after a truncated reply, each with a larger output budget.
const MAX_RETRIES: u32 = 2;
const RETRY_TOKEN_STEP: u32 = 2000;
const MAX_OUTPUT_TOKENS: u32 = 8000;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Schema Gemini is asked to conform to. Keeping descriptions in Korean
/// nudges the model toward Korean field content.
fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "description": "뉴스 요약 (불릿 포인트 형식)"
            },
            "keywords": {
                "type": "array",
                "items": { "type": "string" },
                "description": "핵심 키워드 3-5개"
            }
        },
        "required": ["summary", "keywords"]
    })
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

struct GeminiReply {
    text: String,
    truncated: bool,
}

pub struct GeminiProvider {
    http: Client,
    api_key: SecretString,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    async fn call_once(
        &self,
        request: &SummaryRequest,
        max_tokens: u32,
    ) -> Result<GeminiReply, HeraldError> {
        // Gemini has no system role; the system prompt rides in front of
        // the user prompt in a single user turn.
        let prompt = format!("{}\n\n{}", request.system_prompt, request.user_prompt);
        let url = format!("{GEMINI_API_BASE}/models/{}:generateContent", self.model);

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: max_tokens,
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| HeraldError::provider("gemini", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HeraldError::provider(
                "gemini",
                format!("HTTP {status}: {body}"),
            ));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| HeraldError::provider("gemini", format!("response decode: {e}")))?;

        let candidate = body.candidates.into_iter().next();
        let finish_reason = candidate
            .as_ref()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_default();
        let text = candidate
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            let block_reason = body
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "none".to_string());
            return Err(HeraldError::provider(
                "gemini",
                format!("empty response (blockReason: {block_reason}, finishReason: {finish_reason})"),
            ));
        }

        Ok(GeminiReply {
            text,
            truncated: matches!(finish_reason.as_str(), "MAX_TOKENS" | "LENGTH"),
        })
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: &SummaryRequest) -> Result<SummaryResult, HeraldError> {
        let mut max_tokens = request.max_tokens;
        let mut last_error = String::new();

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                debug!(attempt, max_tokens, "Retrying truncated Gemini response");
            }

            // Transport and API errors are not recoverable by a bigger
            // budget, so they fail the provider immediately.
            let reply = self.call_once(request, max_tokens).await?;
            if reply.truncated {
                warn!(max_tokens, "Gemini response truncated at output budget");
            }

            match parse::parse_summary(&reply.text) {
                Some(result) if !(reply.truncated && looks_incomplete(&result)) => {
                    return Ok(parse::normalize(result));
                }
                Some(_) => {
                    last_error = "truncated response with incomplete summary".to_string();
                }
                None if !reply.truncated => {
                    return Err(HeraldError::provider(
                        "gemini",
                        format!("unparseable JSON: {}", parse::preview(&reply.text)),
                    ));
                }
                None => {
                    last_error =
                        format!("truncated, unparseable JSON: {}", parse::preview(&reply.text));
                }
            }

            max_tokens = grow_output_budget(max_tokens);
        }

        Err(HeraldError::provider("gemini", last_error))
    }
}

fn grow_output_budget(current: u32) -> u32 {
    (current + RETRY_TOKEN_STEP).min(MAX_OUTPUT_TOKENS)
}

/// A truncated reply that parsed may still be missing most of the summary.
/// Heuristic: too short, fewer than two bullets, or cut off mid-sentence.
fn looks_incomplete(result: &SummaryResult) -> bool {
    let summary = result.summary.trim();
    if summary.chars().count() < 50 {
        return true;
    }
    if summary.matches('•').count() < 2 {
        return true;
    }
    match summary.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(last) => !ends_sentence(last.trim()),
        None => true,
    }
}

fn ends_sentence(line: &str) -> bool {
    line.chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '。' | '!' | '?' | ')' | '"' | '\'' | '」' | '』'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
