//! Gemini vendor client
//!
//! Calls the `generateContent` REST endpoint. Transient failures (timeouts,
//! 429, 5xx) are retried once with exponential backoff; anything else is
//! terminal. Safe to share across sessions since reqwest pools connections
//! internally.

use crate::error::{Error, Result};
use crate::llm::LanguageModel;
use crate::metrics::METRICS;
use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TRANSIENT_RETRIES: usize = 1;

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    retry_base: Duration,
    retry_cap: Duration,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("LLM client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_base: Duration::from_millis(500),
            retry_cap: Duration::from_secs(2),
        })
    }

    /// One attempt against the generateContent endpoint.
    async fn call_generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}]
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    Error::LlmTransient(e.to_string())
                } else {
                    Error::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(Error::LlmTransient(format!("{}: {}", status, body_text)));
            }
            return Err(Error::Upstream(format!("{}: {}", status, body_text)));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("LLM response body: {}", e)))?;

        value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| Error::Upstream("LLM response carried no text candidate".to_string()))
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let multiplier = 2_u32.pow(attempt.saturating_sub(1) as u32);
        self.retry_base.saturating_mul(multiplier).min(self.retry_cap)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let mut attempt = 0;

        let result = loop {
            attempt += 1;
            match self.call_generate(prompt).await {
                Ok(text) => break Ok(text),
                Err(e @ Error::LlmTransient(_)) => {
                    if attempt > TRANSIENT_RETRIES {
                        break Err(e);
                    }
                    let delay = self.backoff(attempt);
                    warn!(attempt, error = %e, "transient LLM failure, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        let status = if result.is_ok() { "success" } else { "error" };
        METRICS.llm_requests.with_label_values(&["generate", status]).inc();
        METRICS
            .llm_request_duration
            .with_label_values(&["generate"])
            .observe(start.elapsed().as_secs_f64());
        debug!(
            attempts = attempt,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "LLM generate finished"
        );

        result
    }
}
