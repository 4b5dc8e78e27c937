//! Voice layer: text-to-speech and speech-to-text
//!
//! `VoiceModel` is the capability seam over the vendor SDK; only the
//! request/response contract is modeled here. The whole layer is optional:
//! without a vendor credential the HTTP surface answers 503.

pub mod gradium;

pub use gradium::GradiumClient;

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Expected STT sample rate (mono)
pub const STT_SAMPLE_RATE_HZ: u32 = 24_000;

/// Audio formats the voice layer accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Pcm,
    Opus,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Pcm => "pcm",
            Self::Opus => "opus",
        }
    }

    /// MIME type for HTTP responses
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Pcm => "audio/pcm",
            Self::Opus => "audio/ogg",
        }
    }

    /// Parse a client-supplied format token.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "wav" => Ok(Self::Wav),
            "pcm" => Ok(Self::Pcm),
            "opus" => Ok(Self::Opus),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Word-level boundary for subtitle synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub text: String,
    pub start_s: f64,
    pub stop_s: f64,
}

/// TTS output annotated with word timings
#[derive(Debug, Clone)]
pub struct TimedSpeech {
    pub audio: Vec<u8>,
    pub timestamps: Vec<WordTimestamp>,
}

/// Streamed audio chunks
pub type AudioStream = BoxStream<'static, Result<Vec<u8>>>;

/// Streamed partial transcripts
pub type TranscriptStream = BoxStream<'static, Result<String>>;

/// Uniform interface to a TTS/STT vendor
#[async_trait]
pub trait VoiceModel: Send + Sync {
    /// Complete synthesis: one buffer of encoded audio
    async fn tts(&self, text: &str, voice_id: &str, format: AudioFormat) -> Result<Vec<u8>>;

    /// Chunked synthesis for progressive playback
    async fn tts_stream(&self, text: &str, voice_id: &str, format: AudioFormat) -> Result<AudioStream>;

    /// Synthesis plus word-level timestamps; word order matches the input text
    async fn tts_with_timestamps(
        &self,
        text: &str,
        voice_id: &str,
        format: AudioFormat,
    ) -> Result<TimedSpeech>;

    /// Blocking transcription of a complete audio buffer (24 kHz mono)
    async fn stt(&self, audio: Vec<u8>, format: AudioFormat) -> Result<String>;

    /// Streaming transcription yielding partial transcripts
    async fn stt_stream(&self, audio: Vec<u8>, format: AudioFormat) -> Result<TranscriptStream>;
}
