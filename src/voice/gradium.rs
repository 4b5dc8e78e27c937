//! Gradium TTS/STT vendor client

use crate::error::{Error, Result};
use crate::metrics::METRICS;
use crate::voice::{
    AudioFormat, AudioStream, TimedSpeech, TranscriptStream, VoiceModel, WordTimestamp,
    STT_SAMPLE_RATE_HZ,
};
use async_trait::async_trait;
use base64::Engine;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "default";
const STT_LANGUAGE: &str = "en";

pub struct GradiumClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TimedTtsResponse {
    audio_base64: String,
    #[serde(default)]
    text_with_timestamps: Vec<WordTimestamp>,
}

#[derive(Debug, Deserialize)]
struct SttLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl GradiumClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("voice client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tts_setup(&self, voice_id: &str, format: AudioFormat) -> serde_json::Value {
        json!({
            "model_name": DEFAULT_MODEL,
            "voice_id": voice_id,
            "output_format": format.as_str(),
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Upstream(format!("voice request timed out: {}", e))
                } else {
                    Error::Upstream(format!("voice request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("voice vendor {}: {}", status, body_text)));
        }
        Ok(response)
    }

    fn record(&self, op: &str, start: Instant, ok: bool) {
        let status = if ok { "success" } else { "error" };
        METRICS.voice_requests.with_label_values(&[op, status]).inc();
        METRICS
            .voice_request_duration
            .with_label_values(&[op])
            .observe(start.elapsed().as_secs_f64());
    }
}

#[async_trait]
impl VoiceModel for GradiumClient {
    async fn tts(&self, text: &str, voice_id: &str, format: AudioFormat) -> Result<Vec<u8>> {
        let start = Instant::now();
        let body = json!({"setup": self.tts_setup(voice_id, format), "text": text});

        let result = async {
            let response = self.post("/v1/tts", body).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Upstream(format!("voice audio body: {}", e)))?;
            Ok(bytes.to_vec())
        }
        .await;

        self.record("tts", start, result.is_ok());
        result
    }

    async fn tts_stream(&self, text: &str, voice_id: &str, format: AudioFormat) -> Result<AudioStream> {
        let start = Instant::now();
        let body = json!({"setup": self.tts_setup(voice_id, format), "text": text});

        let response = match self.post("/v1/tts/stream", body).await {
            Ok(response) => response,
            Err(e) => {
                self.record("tts_stream", start, false);
                return Err(e);
            }
        };
        self.record("tts_stream", start, true);

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| Error::Upstream(format!("voice audio stream: {}", e)))
            })
            .boxed();

        Ok(stream)
    }

    async fn tts_with_timestamps(
        &self,
        text: &str,
        voice_id: &str,
        format: AudioFormat,
    ) -> Result<TimedSpeech> {
        let start = Instant::now();
        let body = json!({
            "setup": self.tts_setup(voice_id, format),
            "text": text,
            "with_timestamps": true,
        });

        let result = async {
            let response = self.post("/v1/tts/timestamps", body).await?;
            let parsed: TimedTtsResponse = response
                .json()
                .await
                .map_err(|e| Error::Upstream(format!("voice timestamp body: {}", e)))?;

            let audio = base64::engine::general_purpose::STANDARD
                .decode(&parsed.audio_base64)
                .map_err(|e| Error::Upstream(format!("voice audio base64: {}", e)))?;

            Ok(TimedSpeech {
                audio,
                timestamps: parsed.text_with_timestamps,
            })
        }
        .await;

        self.record("tts_timestamps", start, result.is_ok());
        result
    }

    async fn stt(&self, audio: Vec<u8>, format: AudioFormat) -> Result<String> {
        let start = Instant::now();
        let result = async {
            let mut stream = self.stt_stream(audio, format).await?;
            let mut parts: Vec<String> = Vec::new();
            while let Some(chunk) = stream.next().await {
                let text = chunk?;
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            Ok(parts.join(" "))
        }
        .await;

        self.record("stt", start, result.is_ok());
        result
    }

    async fn stt_stream(&self, audio: Vec<u8>, format: AudioFormat) -> Result<TranscriptStream> {
        let start = Instant::now();
        debug!(bytes = audio.len(), format = format.as_str(), "starting STT stream");

        let body = json!({
            "setup": {
                "model_name": DEFAULT_MODEL,
                "input_format": format.as_str(),
                "sample_rate": STT_SAMPLE_RATE_HZ,
                "json_config": {"language": STT_LANGUAGE},
            },
            "audio_base64": base64::engine::general_purpose::STANDARD.encode(&audio),
        });

        let response = match self.post("/v1/stt/stream", body).await {
            Ok(response) => response,
            Err(e) => {
                self.record("stt_stream", start, false);
                return Err(e);
            }
        };
        self.record("stt_stream", start, true);

        // The vendor replies with JSON lines; forward the text messages.
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String>>(16);
        tokio::spawn(async move {
            let mut bytes_stream = response.bytes_stream();
            let mut buffer = Vec::new();

            while let Some(chunk) = bytes_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::Upstream(format!("voice transcript stream: {}", e))))
                            .await;
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    match serde_json::from_slice::<SttLine>(&line) {
                        Ok(message) if message.kind == "text" && !message.text.is_empty() => {
                            if tx.send(Ok(message.text)).await.is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "skipping unparseable STT line");
                        }
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}
