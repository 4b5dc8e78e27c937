//! Router assembly

use crate::api::handlers::{self, AppState};
use crate::api::voice;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Build the full route surface with CORS and request tracing.
pub fn build_router(state: AppState, frontend_origin: &str) -> Router {
    let cors = match frontend_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
        Err(_) => {
            warn!(frontend_origin, "invalid FRONTEND_ORIGIN, CORS restricted to same origin");
            CorsLayer::new()
        }
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route("/api/chat", post(handlers::chat))
        .route("/api/cluster/predict", post(handlers::cluster_predict))
        .route("/api/chat/analytics-visit", post(handlers::analytics_visit))
        .route("/api/report/generate", post(handlers::report_generate))
        .route("/api/voice/tts", post(voice::tts))
        .route("/api/voice/tts/stream", post(voice::tts_stream))
        .route("/api/voice/tts/with-timestamps", post(voice::tts_with_timestamps))
        .route("/api/voice/stt", post(voice::stt))
        .route("/api/voice/stt/stream", post(voice::stt_stream))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
