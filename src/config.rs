//! Environment-driven configuration
//!
//! All runtime knobs come from environment variables. `LLM_API_KEY` is the
//! only hard requirement; everything else has a default. `VOICE_API_KEY` is
//! optional; without it the voice endpoints answer 503.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Credential for the LLM vendor; absent → startup ConfigError
    pub llm_api_key: String,

    /// LLM model name
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// LLM vendor base URL
    #[serde(default = "default_llm_url")]
    pub llm_url: String,

    /// Credential for the voice vendor; absent → voice layer disabled
    #[serde(default)]
    pub voice_api_key: Option<String>,

    /// Voice vendor base URL
    #[serde(default = "default_voice_url")]
    pub voice_url: String,

    /// Default TTS voice
    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,

    /// SQLite database holding cluster centroids and labels
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Directory holding artifact CSVs and their summaries/ sibling
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// CORS allowlist entry for the dashboard
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,

    /// Embedding endpoint (Ollama-compatible /api/embed)
    #[serde(default = "default_embedding_url")]
    pub embedding_url: String,

    /// Embedding model; must match what the centroid index was built with
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimensionality
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Rows included in a generated summary preview
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,

    /// Character budget for the concatenated summaries sent to the analyzer
    #[serde(default = "default_analyzer_budget")]
    pub analyzer_budget_chars: usize,

    /// LLM timeout per attempt, in seconds
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,

    /// Voice TTS total timeout, in seconds
    #[serde(default = "default_tts_timeout")]
    pub tts_timeout_secs: u64,

    /// Artifact load timeout, in seconds
    #[serde(default = "default_artifact_timeout")]
    pub artifact_timeout_secs: u64,

    /// Centroid index load timeout at startup, in seconds
    #[serde(default = "default_index_timeout")]
    pub index_load_timeout_secs: u64,

    /// Event channel capacity between orchestrator and transport
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_llm_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_voice_url() -> String {
    "https://api.gradium.ai".to_string()
}

fn default_voice_id() -> String {
    "m86j6D7UZpGzHsNu".to_string()
}

fn default_database_url() -> String {
    "data/clusters.db".to_string()
}

fn default_artifact_dir() -> String {
    "data/artifacts".to_string()
}

fn default_frontend_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_embedding_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_embedding_dim() -> usize {
    384
}

fn default_port() -> u16 {
    8000
}

fn default_preview_rows() -> usize {
    50
}

fn default_analyzer_budget() -> usize {
    24_000
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_tts_timeout() -> u64 {
    60
}

fn default_artifact_timeout() -> u64 {
    5
}

fn default_index_timeout() -> u64 {
    60
}

fn default_event_buffer() -> usize {
    16
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Returns `ConfigError` when `LLM_API_KEY` is missing or empty.
    pub fn from_env() -> Result<Self> {
        let llm_api_key = std::env::var("LLM_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config("LLM_API_KEY is not set".to_string()))?;

        let mut config = Self {
            llm_api_key,
            llm_model: default_llm_model(),
            llm_url: default_llm_url(),
            voice_api_key: None,
            voice_url: default_voice_url(),
            default_voice_id: default_voice_id(),
            database_url: default_database_url(),
            artifact_dir: default_artifact_dir(),
            frontend_origin: default_frontend_origin(),
            embedding_url: default_embedding_url(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            port: default_port(),
            preview_rows: default_preview_rows(),
            analyzer_budget_chars: default_analyzer_budget(),
            llm_timeout_secs: default_llm_timeout(),
            tts_timeout_secs: default_tts_timeout(),
            artifact_timeout_secs: default_artifact_timeout(),
            index_load_timeout_secs: default_index_timeout(),
            event_buffer: default_event_buffer(),
        };

        if let Ok(val) = std::env::var("LLM_MODEL") {
            config.llm_model = val;
        }

        if let Ok(val) = std::env::var("LLM_URL") {
            config.llm_url = val;
        }

        if let Ok(val) = std::env::var("VOICE_API_KEY") {
            if !val.trim().is_empty() {
                config.voice_api_key = Some(val);
            }
        }

        if let Ok(val) = std::env::var("VOICE_URL") {
            config.voice_url = val;
        }

        if let Ok(val) = std::env::var("VOICE_ID") {
            config.default_voice_id = val;
        }

        if let Ok(val) = std::env::var("DATABASE_URL") {
            config.database_url = val;
        }

        if let Ok(val) = std::env::var("ARTIFACT_DIR") {
            config.artifact_dir = val;
        }

        if let Ok(val) = std::env::var("FRONTEND_ORIGIN") {
            config.frontend_origin = val;
        }

        if let Ok(val) = std::env::var("EMBEDDING_URL") {
            config.embedding_url = val;
        }

        if let Ok(val) = std::env::var("EMBEDDING_MODEL") {
            config.embedding_model = val;
        }

        if let Ok(val) = std::env::var("EMBEDDING_DIM") {
            config.embedding_dim = val
                .parse()
                .map_err(|_| Error::Config(format!("EMBEDDING_DIM is not a number: {}", val)))?;
        }

        if let Ok(val) = std::env::var("PORT") {
            config.port = val
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a number: {}", val)))?;
        }

        if let Ok(val) = std::env::var("SUMMARY_PREVIEW_ROWS") {
            if let Ok(rows) = val.parse() {
                config.preview_rows = rows;
            }
        }

        if let Ok(val) = std::env::var("ANALYZER_BUDGET_CHARS") {
            if let Ok(budget) = val.parse() {
                config.analyzer_budget_chars = budget;
            }
        }

        Ok(config)
    }

    /// LLM timeout per attempt
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Total TTS budget
    pub fn tts_timeout(&self) -> Duration {
        Duration::from_secs(self.tts_timeout_secs)
    }

    /// Artifact load budget
    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact_timeout_secs)
    }

    /// Startup index load budget
    pub fn index_load_timeout(&self) -> Duration {
        Duration::from_secs(self.index_load_timeout_secs)
    }

    /// Whether the voice layer is configured
    pub fn voice_enabled(&self) -> bool {
        self.voice_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            llm_api_key: "test-key".to_string(),
            llm_model: default_llm_model(),
            llm_url: default_llm_url(),
            voice_api_key: None,
            voice_url: default_voice_url(),
            default_voice_id: default_voice_id(),
            database_url: default_database_url(),
            artifact_dir: default_artifact_dir(),
            frontend_origin: default_frontend_origin(),
            embedding_url: default_embedding_url(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            port: default_port(),
            preview_rows: default_preview_rows(),
            analyzer_budget_chars: default_analyzer_budget(),
            llm_timeout_secs: default_llm_timeout(),
            tts_timeout_secs: default_tts_timeout(),
            artifact_timeout_secs: default_artifact_timeout(),
            index_load_timeout_secs: default_index_timeout(),
            event_buffer: default_event_buffer(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = test_config();
        assert_eq!(config.embedding_dim, 384);
        assert_eq!(config.preview_rows, 50);
        assert_eq!(config.event_buffer, 16);
        assert_eq!(config.llm_timeout(), Duration::from_secs(30));
        assert_eq!(config.tts_timeout(), Duration::from_secs(60));
        assert_eq!(config.artifact_timeout(), Duration::from_secs(5));
        assert!(!config.voice_enabled());
    }

    #[test]
    fn test_voice_enabled_with_key() {
        let mut config = test_config();
        config.voice_api_key = Some("vk".to_string());
        assert!(config.voice_enabled());
    }
}
