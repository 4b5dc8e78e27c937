//! Model-agnostic LLM access
//!
//! `LanguageModel` is the capability seam: vendors implement
//! `generate_text`, and the JSON-constrained call with its single
//! retry-with-repair pass is a provided method so every backend (and every
//! test double) shares the same parsing policy.

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiClient;

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Uniform interface to a generative LLM
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-form text generation
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// JSON-constrained generation.
    ///
    /// Parses the reply after stripping markdown fences; on failure retries
    /// once with a repair hint appended. A second failure is terminal,
    /// never a silent fallback.
    async fn generate_json(&self, prompt: &str) -> Result<serde_json::Value> {
        let text = self.generate_text(prompt).await?;
        match parse_json_payload(&text) {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(error = %e, "LLM reply was not valid JSON, retrying with repair hint");
            }
        }

        let repair = format!(
            "{}\n\nYour previous reply was not valid JSON. Return valid JSON only, \
             with no markdown fences, commentary, or extra text.",
            prompt
        );
        let text = self.generate_text(&repair).await?;
        parse_json_payload(&text)
            .map_err(|_| Error::LlmParse(format!("unparseable after repair: {}", truncate(&text, 200))))
    }

    /// Compact keyword string for cluster embedding search.
    async fn generate_search_keywords(&self, question: &str) -> Result<String> {
        let text = self.generate_text(&prompts::search_keywords(question)).await?;
        Ok(text.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    }
}

/// Strip markdown code fences and parse a JSON object or array.
pub fn parse_json_payload(text: &str) -> Result<serde_json::Value> {
    let stripped = strip_code_fences(text);
    let value: serde_json::Value = serde_json::from_str(stripped.trim())
        .map_err(|e| Error::LlmParse(format!("{}: {}", e, truncate(stripped.trim(), 200))))?;

    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(Error::LlmParse(format!(
            "expected a JSON object or array, got: {}",
            truncate(stripped.trim(), 200)
        )))
    }
}

/// Remove a surrounding ``` / ```json fence if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return trimmed,
    };
    match without_open.rfind("```") {
        Some(idx) => without_open[..idx].trim(),
        None => without_open.trim(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_strip_code_fences_plain() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_json_block() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_bare_block() {
        let fenced = "```\n[1, 2]\n```";
        assert_eq!(strip_code_fences(fenced), "[1, 2]");
    }

    #[test]
    fn test_parse_rejects_scalars() {
        assert!(parse_json_payload("42").is_err());
        assert!(parse_json_payload("\"just a string\"").is_err());
    }

    struct ScriptedLlm {
        replies: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            let mut replies = self.replies.lock().unwrap();
            Ok(replies.remove(0).to_string())
        }
    }

    #[tokio::test]
    async fn test_generate_json_repairs_once() {
        let llm = ScriptedLlm {
            replies: Mutex::new(vec!["here you go: not json", "{\"ok\": true}"]),
        };
        let value = llm.generate_json("prompt").await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_generate_json_fails_after_second_attempt() {
        let llm = ScriptedLlm {
            replies: Mutex::new(vec!["nope", "still nope"]),
        };
        let err = llm.generate_json("prompt").await.unwrap_err();
        assert_eq!(err.kind(), "LLMParseError");
    }

    #[tokio::test]
    async fn test_search_keywords_strips_quotes() {
        let llm = ScriptedLlm {
            replies: Mutex::new(vec!["\"parks booking city hall\""]),
        };
        let keywords = llm.generate_search_keywords("q").await.unwrap();
        assert_eq!(keywords, "parks booking city hall");
    }
}
