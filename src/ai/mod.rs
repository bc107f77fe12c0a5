//! Multi-provider AI summarization with ordered fallback.
//!
//! Every provider implements [`AiProvider`] and normalizes its output to
//! the same [`SummaryResult`] schema; [`run_with_fallback`] walks the
//! configured chain and returns the first valid result. Construction is
//! gated on API keys: a provider whose env var is unset is skipped at
//! startup instead of failing it.

pub mod gemini;
pub mod groq;
pub mod openrouter;
pub mod parse;
pub mod summarizer;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use openrouter::OpenRouterProvider;
pub use summarizer::{NewsSummarizer, Summarized};

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::types::{HeraldError, ProviderAttempt, SummaryOutcome, SummaryRequest, SummaryResult};

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

/// System prompt shared by every provider. Korean persona enforcing the
/// bullet format that [`parse::normalize`] expects.
const SYSTEM_PROMPT: &str = "\
당신은 뉴스를 간결하고 명확하게 요약하는 전문 AI입니다. \
각 불릿은 15-25단어 내외로 핵심만 작성하며, 5W1H(누가, 언제, 어디서, 무엇을, 왜, 어떻게)를 포함합니다. \
숫자/날짜/금액/비율/인명/기관명 등 구체적 정보를 필수로 포함하고, 원인과 결과를 간략히 명시합니다. \
주장이나 의견은 출처를 명시하며, 객관적 사실 중심으로 작성합니다. \
JSON 형식으로 응답하며, summary는 3-4개의 불릿 포인트로 간결하게 구성합니다. \
본문이 짧으면 3개, 길면 4개로 조절합니다.";

const SUMMARY_RULES: &str = "\
다음 뉴스 기사를 읽고 핵심 내용을 **3-4개의 간결한 불릿**으로 정리하고, 주요 키워드 3-5개를 추출해주세요.\n\
\n\
**중요한 요약 규칙:**\n\
1. **각 불릿은 15-25단어 내외** - 핵심만 간결하게\n\
2. **5W1H 중심 작성** - 누가, 언제, 어디서, 무엇을, 왜, 어떻게\n\
3. **구체적 정보 필수 포함** - 숫자, 날짜, 금액, 비율, 인명, 기관명\n\
4. **인과관계 명시** - 원인과 결과를 간략히\n\
5. **객관적 사실 중심** - 주장이나 의견은 출처 명시\n\
6. 제목 내용 반복 금지, 새로운 정보 위주\n\
7. **3-4개로 간결하게** - 본문이 짧으면 3개, 길면 4개\n\
8. **쉬운 한글 사용** - 한자어 대신 쉬운 순우리말이나 일상 표현 사용";

const SUMMARY_EXAMPLE: &str = "\
**좋은 간결한 요약 예시:**\n\
\"• 고용부, 2026년 최저임금 시간당 1만2천원 확정 (7.3%↑)\n\
• 노동계 '물가 대비 부족' 반발, 경영계 '중소기업 부담' 우려\n\
• 적용 대상 300만명, 2026.1.1 시행\n\
• 전문가 '소득주도성장 정책, 고용 양극화 가능성' 지적\"\n\
\n\
반드시 JSON 형식으로만 응답해주세요:\n\
{\"summary\": \"• 간결한포인트1\\n• 간결한포인트2\\n• 간결한포인트3\\n• 간결한포인트4\", \"keywords\": [\"키워드1\", \"키워드2\", \"키워드3\"]}";

/// Build the provider-agnostic request for one article.
pub fn article_request(title: &str, content: &str, config: &AiConfig) -> SummaryRequest {
    SummaryRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        user_prompt: format!(
            "{SUMMARY_RULES}\n\n제목: {title}\n\n본문:\n{content}\n\n{SUMMARY_EXAMPLE}"
        ),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

// ---------------------------------------------------------------------------
// Provider trait & fallback chain
// ---------------------------------------------------------------------------

/// One AI provider capable of producing a structured summary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Stable name used in logs, attempt records, and persistence.
    fn name(&self) -> &'static str;

    /// Run one summarization request to completion.
    async fn complete(&self, request: &SummaryRequest) -> Result<SummaryResult, HeraldError>;
}

/// Try providers in order; the first schema-valid result wins.
///
/// Transport errors, malformed JSON, and schema violations all count as
/// one failed attempt and the chain moves on. Exhausting the chain yields
/// [`HeraldError::AllProvidersFailed`] carrying the attempts in order.
pub async fn run_with_fallback(
    providers: &[Arc<dyn AiProvider>],
    request: &SummaryRequest,
) -> Result<SummaryOutcome, HeraldError> {
    let mut attempts = Vec::new();

    for provider in providers {
        debug!(provider = provider.name(), "Trying AI provider");

        match provider.complete(request).await {
            Ok(result) if result.is_valid() => {
                info!(
                    provider = provider.name(),
                    keywords = result.keywords.len(),
                    "AI summary complete"
                );
                return Ok(SummaryOutcome {
                    result,
                    provider: provider.name().to_string(),
                });
            }
            Ok(_) => {
                warn!(provider = provider.name(), "Schema-invalid provider result");
                attempts.push(ProviderAttempt {
                    provider: provider.name().to_string(),
                    error: "schema validation failed: empty summary or keywords".to_string(),
                });
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "AI provider failed");
                attempts.push(ProviderAttempt {
                    provider: provider.name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    warn!(attempts = attempts.len(), "All AI providers failed");
    Err(HeraldError::AllProvidersFailed { attempts })
}

// ---------------------------------------------------------------------------
// Provider construction
// ---------------------------------------------------------------------------

/// Build the provider chain in configured priority order.
///
/// A provider whose API key env var is unset or blank is logged and
/// skipped; the service keeps running with whatever remains.
pub fn build_providers(config: &AiConfig) -> Result<Vec<Arc<dyn AiProvider>>> {
    let mut providers: Vec<Arc<dyn AiProvider>> = Vec::new();

    for name in &config.providers {
        match name.as_str() {
            "groq" => match resolve_key(&config.groq.api_key_env) {
                Some(key) => {
                    providers.push(Arc::new(GroqProvider::new(key, config.groq.model.clone())?));
                }
                None => disabled("groq", &config.groq.api_key_env),
            },
            "gemini" => match resolve_key(&config.gemini.api_key_env) {
                Some(key) => {
                    providers
                        .push(Arc::new(GeminiProvider::new(key, config.gemini.model.clone())?));
                }
                None => disabled("gemini", &config.gemini.api_key_env),
            },
            "openrouter" => match resolve_key(&config.openrouter.api_key_env) {
                Some(key) => {
                    providers.push(Arc::new(OpenRouterProvider::new(
                        key,
                        config.openrouter.model.clone(),
                    )?));
                }
                None => disabled("openrouter", &config.openrouter.api_key_env),
            },
            other => warn!(provider = other, "Unknown AI provider in config, skipping"),
        }
    }

    info!(count = providers.len(), "AI provider chain ready");
    Ok(providers)
}

/// The streaming path is Groq-only; without its key there is no streamer.
pub fn build_streaming_provider(config: &AiConfig) -> Result<Option<Arc<GroqProvider>>> {
    match resolve_key(&config.groq.api_key_env) {
        Some(key) => Ok(Some(Arc::new(GroqProvider::new(
            key,
            config.groq.model.clone(),
        )?))),
        None => Ok(None),
    }
}

fn resolve_key(env_name: &str) -> Option<SecretString> {
    std::env::var(env_name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::new)
}

fn disabled(provider: &str, env_name: &str) {
    info!(provider, env = env_name, "AI provider disabled (API key not set)");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
