//! Error types for the insight-agent backend

use thiserror::Error;

/// Main error type for the crate.
///
/// Every fault in the request path maps to exactly one variant; the
/// streaming layer surfaces them as terminal `error` events and the
/// non-streaming handlers map them to HTTP statuses.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed startup input; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// A product id that is not registered in the catalog
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// Artifact file missing or malformed
    #[error("artifact unavailable for '{product_id}': {reason}")]
    ArtifactUnavailable { product_id: String, reason: String },

    /// Planner produced zero valid entries
    #[error("planning failed: {0}")]
    PlanningFailed(String),

    /// LLM returned non-JSON output twice (after one repair attempt)
    #[error("LLM parse error: {0}")]
    LlmParse(String),

    /// Timeout or rate limit from the LLM vendor; retried once, then terminal
    #[error("transient LLM failure: {0}")]
    LlmTransient(String),

    /// Query embedding dimension does not match the centroid index
    #[error("embedding dimension mismatch: got {got}, index expects {expected}")]
    Dimension { got: usize, expected: usize },

    /// Audio format outside {wav, pcm, opus}
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Voice endpoints hit while VOICE_API_KEY is absent
    #[error("voice layer is not configured")]
    VoiceDisabled,

    /// Non-transient upstream failure (vendor 4xx, malformed body)
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// PDF rendering failure
    #[error("report rendering failed: {0}")]
    Render(String),

    /// Centroid database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable kind string carried in `error` events and JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::UnknownProduct(_) => "UnknownProduct",
            Error::ArtifactUnavailable { .. } => "ArtifactUnavailable",
            Error::PlanningFailed(_) => "PlanningFailed",
            Error::LlmParse(_) => "LLMParseError",
            Error::LlmTransient(_) => "LLMTransient",
            Error::Dimension { .. } => "DimensionError",
            Error::UnsupportedFormat(_) => "UnsupportedFormat",
            Error::VoiceDisabled => "VoiceDisabled",
            Error::Upstream(_) => "UpstreamError",
            Error::Render(_) => "RenderError",
            Error::Database(_) => "DatabaseError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
        }
    }
}
