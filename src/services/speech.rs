//! Text-to-speech through Groq's OpenAI-compatible `audio/speech` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::{ParleyError, Result};
use crate::provider::http::{bearer_headers, shared_client, status_to_error, trim_trailing_slash};
use crate::util::timeout::with_timeout;

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TTS_MODEL: &str = "canopylabs/orpheus-v1-english";
pub const DEFAULT_VOICE: &str = "troy";
pub const DEFAULT_MAX_INPUT_CHARS: usize = 200;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Synthesized audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechAudio {
    pub media_type: String,
    pub bytes: Bytes,
}

/// Turns text into audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio>;
}

/// Cut `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_speech_input(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Groq speech client. Input longer than `max_input_chars` is truncated
/// before the request is sent.
#[derive(Debug, Clone)]
pub struct GroqSpeechClient {
    api_key: String,
    base_url: String,
    model: String,
    voice: String,
    max_input_chars: usize,
    timeout: Duration,
}

impl GroqSpeechClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            model: DEFAULT_TTS_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for GroqSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio> {
        if text.trim().is_empty() {
            return Err(ParleyError::MalformedRequest("Text is required".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ParleyError::Configuration("Missing GROQ_API_KEY".into()));
        }

        let input = truncate_speech_input(text, self.max_input_chars);
        let payload = serde_json::json!({
            "model": self.model,
            "input": input,
            "voice": self.voice,
            "response_format": "wav",
        });
        let url = format!("{}/audio/speech", trim_trailing_slash(&self.base_url));

        debug!(
            model = %self.model,
            chars = input.chars().count(),
            truncated = input.len() < text.len(),
            "synthesizing speech"
        );

        with_timeout(self.timeout, async {
            let resp = shared_client()
                .post(&url)
                .headers(bearer_headers(&self.api_key))
                .json(&payload)
                .send()
                .await?;

            let status = resp.status().as_u16();
            if status != 200 {
                let body = resp.text().await.unwrap_or_default();
                return Err(ParleyError::upstream(
                    "speech",
                    status_to_error(status, &body).to_string(),
                ));
            }

            let bytes = resp.bytes().await?;
            if bytes.is_empty() {
                return Err(ParleyError::upstream("speech", "empty audio payload"));
            }

            Ok(SpeechAudio {
                media_type: "audio/wav".to_string(),
                bytes,
            })
        })
        .await
    }
}
