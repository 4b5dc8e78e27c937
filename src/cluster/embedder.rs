//! Text embedding client
//!
//! The centroid index was built offline with a 384-d sentence embedding
//! model; queries must be embedded with the same model. The HTTP embedder
//! targets an Ollama-compatible `/api/embed` endpoint.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const EMBED_MAX_RETRIES: usize = 2;

/// Capability interface for embedding backends
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text into a fixed-dimensional vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Vector dimensionality this backend produces
    fn dims(&self) -> usize;
}

/// HTTP embedder against an Ollama-compatible endpoint
pub struct HttpEmbedder {
    http: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
}

impl HttpEmbedder {
    pub fn new(url: &str, model: &str, dims: usize, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("embedding client: {}", e)))?;

        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dims,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err = None;

        for attempt in 0..=EMBED_MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(attempt, "retrying embedding request in {:?}", delay);
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let value: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::Upstream(format!("embedding response: {}", e)))?;
                        return parse_embed_response(&value, self.dims);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(Error::Upstream(format!(
                            "embedding endpoint {}: {}",
                            status, body_text
                        )));
                        continue;
                    }
                    return Err(Error::Upstream(format!(
                        "embedding endpoint {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::Upstream(format!("embedding request: {}", e)));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Upstream("embedding failed after retries".to_string())))
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

fn parse_embed_response(value: &serde_json::Value, expected_dims: usize) -> Result<Vec<f32>> {
    let vector: Vec<f32> = value
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|arr| arr.first())
        .and_then(|first| first.as_array())
        .ok_or_else(|| Error::Upstream("embedding response missing embeddings array".to_string()))?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();

    if vector.len() != expected_dims {
        return Err(Error::Dimension {
            got: vector.len(),
            expected: expected_dims,
        });
    }

    Ok(vector)
}
