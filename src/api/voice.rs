//! HTTP handlers for the voice endpoints
//!
//! All handlers answer 503 while the voice layer is unconfigured. Formats
//! outside {wav, pcm, opus} are rejected with 400 before any vendor call.

use crate::api::handlers::{error_response, ApiError, AppState};
use crate::error::Error;
use crate::voice::{AudioFormat, VoiceModel};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use futures_util::{stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

fn default_format() -> String {
    "wav".to_string()
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default = "default_format")]
    pub output_format: String,
}

#[derive(Debug, Deserialize)]
pub struct SttRequest {
    pub audio_base64: String,
    #[serde(default = "default_format")]
    pub input_format: String,
}

#[derive(Debug, Deserialize)]
pub struct SttStreamRequest {
    pub audio_chunk: String,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default = "default_format")]
    pub input_format: String,
}

type HandlerError = (StatusCode, Json<ApiError>);

fn require_voice(state: &AppState) -> Result<Arc<dyn VoiceModel>, HandlerError> {
    state.voice.clone().ok_or_else(|| error_response(Error::VoiceDisabled))
}

fn parse_format(value: &str) -> Result<AudioFormat, HandlerError> {
    AudioFormat::parse(value).map_err(error_response)
}

fn decode_audio(b64: &str) -> Result<Vec<u8>, HandlerError> {
    base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| error_response(Error::Upstream(format!("invalid audio base64: {}", e))))
}

/// POST /api/voice/tts
pub async fn tts(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> Result<Response, HandlerError> {
    let voice = require_voice(&state)?;
    let format = parse_format(&request.output_format)?;
    let voice_id = request.voice_id.unwrap_or_else(|| state.default_voice_id.clone());

    let audio = voice
        .tts(&request.text, &voice_id, format)
        .await
        .map_err(error_response)?;

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=speech.{}", format.as_str()),
            ),
        ],
        audio,
    )
        .into_response())
}

/// POST /api/voice/tts/stream
///
/// Chunked audio as it is synthesized.
pub async fn tts_stream(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> Result<Response, HandlerError> {
    let voice = require_voice(&state)?;
    let format = parse_format(&request.output_format)?;
    let voice_id = request.voice_id.unwrap_or_else(|| state.default_voice_id.clone());

    let chunks = voice
        .tts_stream(&request.text, &voice_id, format)
        .await
        .map_err(error_response)?;

    let mut response = Response::new(Body::from_stream(chunks));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

/// POST /api/voice/tts/with-timestamps
///
/// Audio plus word boundaries for subtitle sync.
pub async fn tts_with_timestamps(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let voice = require_voice(&state)?;
    let format = parse_format(&request.output_format)?;
    let voice_id = request.voice_id.unwrap_or_else(|| state.default_voice_id.clone());

    let speech = voice
        .tts_with_timestamps(&request.text, &voice_id, format)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "audio_base64": base64::engine::general_purpose::STANDARD.encode(&speech.audio),
        "timestamps": speech.timestamps,
    })))
}

/// POST /api/voice/stt
///
/// Blocking transcription.
pub async fn stt(
    State(state): State<AppState>,
    Json(request): Json<SttRequest>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let voice = require_voice(&state)?;
    let format = parse_format(&request.input_format)?;
    let audio = decode_audio(&request.audio_base64)?;

    let transcript = voice.stt(audio, format).await.map_err(error_response)?;
    Ok(Json(json!({ "transcript": transcript })))
}

/// POST /api/voice/stt/stream
///
/// SSE of partial transcripts, terminated by a `complete` frame when the
/// client marked the chunk final.
pub async fn stt_stream(
    State(state): State<AppState>,
    Json(request): Json<SttStreamRequest>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>>, HandlerError> {
    let voice = require_voice(&state)?;
    let format = parse_format(&request.input_format)?;
    let audio = decode_audio(&request.audio_chunk)?;
    let is_final = request.is_final;

    let transcripts = voice.stt_stream(audio, format).await.map_err(error_response)?;

    let frames = transcripts.map(|item| {
        let payload = match item {
            Ok(text) => json!({ "type": "transcript", "text": text }),
            Err(e) => json!({ "type": "error", "message": e.to_string() }),
        };
        Ok::<Event, Infallible>(Event::default().data(payload.to_string()))
    });

    let tail = is_final.then(|| {
        Ok::<Event, Infallible>(Event::default().data(json!({ "type": "complete" }).to_string()))
    });
    let stream = frames.chain(stream::iter(tail));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
