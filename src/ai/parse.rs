//! Tolerant JSON extraction for AI provider responses.
//!
//! Models asked for strict JSON still wrap it in markdown fences, leave
//! trailing commas, emit raw newlines inside string values, or get cut
//! off mid-string by token limits. [`parse_summary`] walks a ladder of
//! recovery stages before giving up, and [`normalize`] enforces the
//! bullet/keyword shape on whatever survives.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::types::SummaryResult;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bullet/keyword caps enforced on every provider's output.
const MAX_BULLETS: usize = 4;
const MAX_KEYWORDS: usize = 5;

// ---------------------------------------------------------------------------
// Extraction ladder
// ---------------------------------------------------------------------------

/// Recover a [`SummaryResult`] from raw model output.
///
/// Stages, in order: direct parse, string-value newline escaping,
/// brace-slice with trailing-comma repair, and finally per-field regex
/// recovery for truncated output. Returns `None` only when no stage
/// finds a usable `summary`.
pub fn parse_summary(content: &str) -> Option<SummaryResult> {
    let candidate = strip_code_fences(content);

    if let Some(result) = try_json(candidate) {
        return Some(result);
    }

    // Models love raw newlines inside JSON string values.
    if let Some(result) = try_json(&escape_bare_newlines(candidate)) {
        return Some(result);
    }

    // Prose around the object: slice from the first brace to the last.
    if let Some(block) = json_block(candidate) {
        let cleaned = strip_trailing_commas(&escape_bare_newlines(block));
        if let Some(result) = try_json(&cleaned) {
            return Some(result);
        }
    }

    // Truncated output: recover the fields individually.
    extract_fields(candidate)
}

/// Trim the summary, force bullet formatting, and cap list lengths.
pub fn normalize(mut result: SummaryResult) -> SummaryResult {
    let mut summary = result.summary.trim().to_string();

    if !summary.contains('•') {
        summary = summary
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| format!("• {line}"))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let bullets: Vec<&str> = summary.lines().filter(|line| line.contains('•')).collect();
    if bullets.len() > MAX_BULLETS {
        summary = bullets[..MAX_BULLETS].join("\n");
    }

    result.summary = summary;
    result.keywords.truncate(MAX_KEYWORDS);
    result
}

/// First 200 chars of model output, for error messages.
pub(crate) fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(200).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn try_json(candidate: &str) -> Option<SummaryResult> {
    serde_json::from_str(candidate).ok()
}

/// Strip a markdown code fence when the payload is wrapped in one.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "JSON", ...) on the fence line.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };

    // A missing closing fence means the output was cut off; keep the tail.
    match rest.rfind("```") {
        Some(pos) => rest[..pos].trim(),
        None => rest.trim(),
    }
}

/// Slice from the first `{` to the last `}`, inclusive.
fn json_block(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (start < end).then(|| &content[start..=end])
}

/// Escape raw control characters that appear inside string literals.
/// Characters between tokens are left alone so valid pretty-printed
/// JSON passes through unchanged.
fn escape_bare_newlines(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

/// Drop commas dangling before `}` or `]`, outside string literals.
fn strip_trailing_commas(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '}' | ']' => {
                let kept = out.trim_end().len();
                if out[..kept].ends_with(',') {
                    out.truncate(kept - 1);
                }
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Last-resort recovery: pull `summary` and `keywords` out of broken or
/// truncated JSON with field-level regexes. The summary pattern does not
/// require a closing quote, so a string cut off by a token limit still
/// yields its prefix.
fn extract_fields(content: &str) -> Option<SummaryResult> {
    static RE_SUMMARY: OnceCell<Regex> = OnceCell::new();
    let re_summary = RE_SUMMARY
        .get_or_init(|| Regex::new(r#""summary"\s*:\s*"((?:[^"\\]|\\.)*)"#).unwrap());

    let raw = re_summary.captures(content)?.get(1)?.as_str();
    let summary = unescape_fragment(raw);
    if summary.trim().is_empty() {
        return None;
    }

    Some(SummaryResult {
        summary,
        keywords: extract_keywords(content),
        one_liner: None,
    })
}

fn extract_keywords(content: &str) -> Vec<String> {
    static RE_ARRAY: OnceCell<Regex> = OnceCell::new();
    static RE_QUOTED: OnceCell<Regex> = OnceCell::new();
    let re_array = RE_ARRAY
        .get_or_init(|| Regex::new(r#"(?s)"keywords"\s*:\s*\[(.*?)\]"#).unwrap());
    let re_quoted = RE_QUOTED.get_or_init(|| Regex::new(r#""([^"]+)""#).unwrap());

    let Some(caps) = re_array.captures(content) else {
        return Vec::new();
    };
    let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    re_quoted
        .captures_iter(inner)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Decode the escapes a regex capture leaves in place. A dangling
/// backslash at the end of a truncated string is dropped.
fn unescape_fragment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet_summary() -> &'static str {
        "• 고용부, 최저임금 시간당 1만2천원 확정\\n• 노동계 반발, 경영계 우려\\n• 적용 대상 300만명"
    }

    // -- Happy path --

    #[test]
    fn test_parse_clean_json() {
        let content = format!(
            r#"{{"summary": "{}", "keywords": ["최저임금", "고용부"]}}"#,
            bullet_summary(),
        );
        let result = parse_summary(&content).unwrap();
        assert!(result.summary.starts_with("• 고용부"));
        assert_eq!(result.keywords, vec!["최저임금", "고용부"]);
        assert!(result.one_liner.is_none());
    }

    #[test]
    fn test_parse_picks_up_one_liner() {
        let content = r#"{"summary": "• 요약", "keywords": ["k"], "oneLiner": "한 줄 정리"}"#;
        let result = parse_summary(content).unwrap();
        assert_eq!(result.one_liner.as_deref(), Some("한 줄 정리"));
    }

    // -- Fences --

    #[test]
    fn test_parse_fenced_json_with_language_tag() {
        let content = "```json\n{\"summary\": \"• 요약\", \"keywords\": [\"k\"]}\n```";
        let result = parse_summary(content).unwrap();
        assert_eq!(result.summary, "• 요약");
    }

    #[test]
    fn test_parse_fenced_json_without_language_tag() {
        let content = "```\n{\"summary\": \"• 요약\", \"keywords\": [\"k\"]}\n```";
        assert!(parse_summary(content).is_some());
    }

    #[test]
    fn test_parse_unterminated_fence() {
        // Token limit hit before the closing fence.
        let content = "```json\n{\"summary\": \"• 요약\", \"keywords\": [\"k\"]}";
        assert!(parse_summary(content).is_some());
    }

    // -- Prose and sloppy JSON --

    #[test]
    fn test_parse_prose_wrapped_json() {
        let content = "요청하신 요약입니다:\n{\"summary\": \"• 요약\", \"keywords\": [\"k\"]}\n도움이 되셨기를 바랍니다.";
        let result = parse_summary(content).unwrap();
        assert_eq!(result.summary, "• 요약");
    }

    #[test]
    fn test_parse_trailing_commas() {
        let content = r#"{"summary": "• 요약", "keywords": ["a", "b",],}"#;
        let result = parse_summary(content).unwrap();
        assert_eq!(result.keywords, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_bare_newlines_inside_strings() {
        let content = "{\"summary\": \"• 첫째\n• 둘째\", \"keywords\": [\"k\"]}";
        let result = parse_summary(content).unwrap();
        assert_eq!(result.summary, "• 첫째\n• 둘째");
    }

    #[test]
    fn test_parse_escaped_quotes_in_summary() {
        let content = r#"{"summary": "• 전문가 \"위험\" 경고", "keywords": ["k"]}"#;
        let result = parse_summary(content).unwrap();
        assert_eq!(result.summary, "• 전문가 \"위험\" 경고");
    }

    // -- Truncation recovery --

    #[test]
    fn test_parse_truncated_mid_summary_recovers_prefix() {
        // No closing quote, no keywords: the summary string was cut off.
        let content = r#"{"summary": "• 고용부, 최저임금 확정\n• 노동계 반발하"#;
        let result = parse_summary(content).unwrap();
        assert!(result.summary.starts_with("• 고용부"));
        assert!(result.summary.contains("노동계"));
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn test_parse_truncated_keeps_complete_keywords() {
        let content = r#"{"keywords": ["최저임금", "고용부"], "summary": "• 요약이 여기서 끊"#;
        let result = parse_summary(content).unwrap();
        assert_eq!(result.keywords, vec!["최저임금", "고용부"]);
    }

    #[test]
    fn test_parse_truncated_keyword_array_is_dropped() {
        let content = r#"{"summary": "• 요약", "keywords": ["최저임금", "고용"#;
        let result = parse_summary(content).unwrap();
        assert_eq!(result.summary, "• 요약");
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn test_parse_garbage_returns_none() {
        assert!(parse_summary("죄송합니다, 요약할 수 없습니다.").is_none());
        assert!(parse_summary("").is_none());
        assert!(parse_summary("{}").is_none());
    }

    // -- Stage helpers --

    #[test]
    fn test_json_block_requires_both_braces() {
        assert_eq!(json_block("x {\"a\": 1} y"), Some("{\"a\": 1}"));
        assert!(json_block("no braces here").is_none());
        assert!(json_block("} reversed {").is_none());
    }

    #[test]
    fn test_strip_trailing_commas_leaves_strings_alone() {
        let json = r#"{"summary": "쉼표, }가 들어간 문장,", "keywords": ["a",]}"#;
        let cleaned = strip_trailing_commas(json);
        assert!(cleaned.contains("쉼표, }가 들어간 문장,"));
        assert!(cleaned.ends_with(r#"["a"]}"#));
    }

    #[test]
    fn test_escape_bare_newlines_leaves_pretty_json_alone() {
        let json = "{\n  \"summary\": \"요약\",\n  \"keywords\": [\"k\"]\n}";
        assert_eq!(escape_bare_newlines(json), json);
    }

    #[test]
    fn test_unescape_fragment() {
        assert_eq!(unescape_fragment(r"첫째\n둘째"), "첫째\n둘째");
        assert_eq!(unescape_fragment(r#"인용 \" 부호"#), "인용 \" 부호");
        assert_eq!(unescape_fragment(r"백슬래시 \\ 자체"), r"백슬래시 \ 자체");
        // Dangling escape from a truncated string.
        assert_eq!(unescape_fragment(r"끊긴 문자열\"), "끊긴 문자열");
    }

    #[test]
    fn test_preview_caps_at_200_chars() {
        let long = "가".repeat(300);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 203);
        assert!(p.ends_with("..."));
        assert_eq!(preview("짧음"), "짧음");
    }

    // -- Normalization --

    #[test]
    fn test_normalize_adds_missing_bullets() {
        let result = normalize(SummaryResult {
            summary: "첫 번째 요점\n두 번째 요점\n\n세 번째 요점".to_string(),
            keywords: vec!["k".to_string()],
            one_liner: None,
        });
        assert_eq!(result.summary, "• 첫 번째 요점\n• 두 번째 요점\n• 세 번째 요점");
    }

    #[test]
    fn test_normalize_caps_bullets_at_four() {
        let summary = (1..=6)
            .map(|i| format!("• 요점 {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = normalize(SummaryResult {
            summary,
            keywords: vec![],
            one_liner: None,
        });
        assert_eq!(result.summary.lines().count(), 4);
        assert!(result.summary.ends_with("• 요점 4"));
    }

    #[test]
    fn test_normalize_caps_keywords_at_five() {
        let result = normalize(SummaryResult {
            summary: "• 요약".to_string(),
            keywords: (1..=8).map(|i| format!("키워드{i}")).collect(),
            one_liner: None,
        });
        assert_eq!(result.keywords.len(), 5);
        assert_eq!(result.keywords[0], "키워드1");
    }

    #[test]
    fn test_normalize_trims_and_keeps_existing_bullets() {
        let result = normalize(SummaryResult {
            summary: "  • 요점 하나\n• 요점 둘  ".to_string(),
            keywords: vec!["k".to_string()],
            one_liner: None,
        });
        assert_eq!(result.summary, "• 요점 하나\n• 요점 둘");
    }
}
