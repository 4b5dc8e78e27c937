//! HTTP handlers for the chat, cluster, and report endpoints

use crate::agent::{Agent, Mode, StreamEvent};
use crate::error::Error;
use crate::report::ReportService;
use crate::voice::VoiceModel;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

/// Shared application state behind every route
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub reports: Arc<ReportService>,
    pub voice: Option<Arc<dyn VoiceModel>>,
    pub default_voice_id: String,
}

/// JSON error body for non-streaming endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

/// Map a domain error onto an HTTP status and JSON body.
pub fn error_response(err: Error) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        Error::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
        Error::UnknownProduct(_) => StatusCode::NOT_FOUND,
        Error::VoiceDisabled => StatusCode::SERVICE_UNAVAILABLE,
        Error::Upstream(_) | Error::LlmTransient(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Deserialize)]
pub struct ClusterPredictRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsVisitRequest {
    pub parent_cluster_id: i64,
    pub child_cluster_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub parent_cluster_id: i64,
    pub child_cluster_id: i64,
    #[serde(default)]
    pub discussion: String,
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "CRM Analytics API", "status": "running" }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "agent_initialized": true,
        "voice_initialized": state.voice.is_some(),
    }))
}

/// GET /metrics
pub async fn metrics() -> Response {
    let body = crate::metrics::METRICS.export_prometheus();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}

/// POST /api/chat/stream
///
/// Each event becomes one `data: <single-line JSON>` SSE frame. The HTTP
/// status is 200 once the stream opens; failures after that are expressed
/// as terminal `error` events.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    info!(mode = ?request.mode, "chat stream request");
    let rx = state.agent.run(request.message, request.mode);

    let stream = ReceiverStream::new(rx).map(|event| {
        let payload = serde_json::to_string(&event)
            .unwrap_or_else(|_| r#"{"type":"error","content":"serialization failed"}"#.to_string());
        Ok(Event::default().data(payload))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// POST /api/chat
///
/// Drains the stream into one JSON object, for testing.
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Json<serde_json::Value> {
    let mut rx = state.agent.run(request.message, request.mode);

    let mut events: Vec<StreamEvent> = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    Json(merge_events(&events))
}

/// Collapse a drained event stream into the shape the test client expects.
fn merge_events(events: &[StreamEvent]) -> serde_json::Value {
    let mut merged = json!({
        "answer": serde_json::Value::Null,
        "plan": serde_json::Value::Null,
        "rationale": [],
        "key_metrics": [],
        "events": events,
    });

    for event in events {
        match event.kind {
            crate::agent::EventKind::Plan => {
                if let Some(data) = &event.data {
                    merged["plan"] = data.get("plan").cloned().unwrap_or_default();
                }
            }
            crate::agent::EventKind::Answer => {
                if let Some(data) = &event.data {
                    merged["answer"] = data.get("answer").cloned().unwrap_or_default();
                    merged["rationale"] = data.get("rationale").cloned().unwrap_or_default();
                    merged["key_metrics"] = data.get("key_metrics").cloned().unwrap_or_default();
                }
            }
            crate::agent::EventKind::Chat => {
                merged["answer"] = json!(event.content);
            }
            crate::agent::EventKind::Error => {
                if let Some(data) = &event.data {
                    merged["error"] = data.clone();
                }
            }
            _ => {}
        }
    }

    merged
}

/// POST /api/cluster/predict
pub async fn cluster_predict(
    State(state): State<AppState>,
    Json(request): Json<ClusterPredictRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiError>)> {
    let prediction = state
        .agent
        .predict_cluster(&request.message)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "parent_cluster_id": prediction.parent_cluster_id,
        "child_cluster_id": prediction.child_cluster_id,
        "confidence": prediction.confidence,
    })))
}

/// POST /api/chat/analytics-visit
pub async fn analytics_visit(
    State(state): State<AppState>,
    Json(request): Json<AnalyticsVisitRequest>,
) -> Result<Json<crate::report::AnalyticsVisit>, (StatusCode, Json<ApiError>)> {
    let visit = state
        .reports
        .analytics_visit(request.parent_cluster_id, request.child_cluster_id)
        .await
        .map_err(error_response)?;
    Ok(Json(visit))
}

/// POST /api/report/generate
///
/// Returns `application/pdf` bytes.
pub async fn report_generate(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let pdf = state
        .reports
        .generate_report(
            request.parent_cluster_id,
            request.child_cluster_id,
            &request.discussion,
        )
        .await
        .map_err(error_response)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=analytics-report.pdf".to_string(),
            ),
        ],
        pdf,
    )
        .into_response())
}
