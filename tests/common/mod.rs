//! Shared test helpers: a scripted model provider and fake collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use parley::chat::{ChatOrchestrator, OrchestratorSettings};
use parley::error::{ParleyError, Result};
use parley::invocation::ApprovalBroker;
use parley::protocol::UiChunk;
use parley::provider::{ModelProvider, ModelRequest};
use parley::services::{
    CurrentWeather, GeneratedImage, GeoLocation, Geocoder, ImageGenerator, SpeechAudio,
    SpeechSynthesizer, Units, WeatherService,
};
use parley::tools::builtin::default_registry;
use parley::types::*;

/// One scripted model step.
pub enum Script {
    /// Yield these events, then end the stream.
    Events(Vec<std::result::Result<ModelStreamEvent, String>>),
    /// Fail before any event is produced.
    Refuse(String),
    /// Never produce anything.
    Hang,
}

/// A provider that replays queued scripts, one per step, and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        request: &ModelRequest,
    ) -> Result<BoxStream<'static, Result<ModelStreamEvent>>> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::Events(vec![Ok(ModelStreamEvent::finish(FinishReason::Stop))]));

        match script {
            Script::Events(events) => Ok(stream::iter(
                events
                    .into_iter()
                    .map(|e| e.map_err(|msg| ParleyError::upstream("scripted", msg))),
            )
            .boxed()),
            Script::Refuse(msg) => Err(ParleyError::Api {
                status: 503,
                message: msg,
            }),
            Script::Hang => Ok(stream::pending::<Result<ModelStreamEvent>>().boxed()),
        }
    }
}

/// Events for a text-only step.
pub fn text_step(chunks: &[&str]) -> Script {
    let mut events: Vec<_> = chunks.iter().map(|c| Ok(ModelStreamEvent::text(*c))).collect();
    events.push(Ok(ModelStreamEvent::Finish {
        reason: FinishReason::Stop,
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            reasoning_tokens: None,
        }),
    }));
    Script::Events(events)
}

/// Events for a step that calls one tool, with arguments split in two.
pub fn tool_step(id: &str, name: &str, arguments: &str) -> Script {
    let mid = arguments
        .char_indices()
        .nth(arguments.chars().count() / 2)
        .map(|(i, _)| i)
        .unwrap_or(0);
    Script::Events(vec![
        Ok(ModelStreamEvent::ToolInputStart {
            id: id.into(),
            name: name.into(),
        }),
        Ok(ModelStreamEvent::ToolInputDelta {
            id: id.into(),
            delta: arguments[..mid].into(),
        }),
        Ok(ModelStreamEvent::ToolInputDelta {
            id: id.into(),
            delta: arguments[mid..].into(),
        }),
        Ok(ModelStreamEvent::ToolInputEnd { id: id.into() }),
        Ok(ModelStreamEvent::Finish {
            reason: FinishReason::ToolCalls,
            usage: Some(Usage {
                input_tokens: 8,
                output_tokens: 4,
                total_tokens: 12,
                reasoning_tokens: None,
            }),
        }),
    ])
}

/// Knows Paris and nothing else.
pub struct FakeGeocoder;

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, name: &str) -> Result<Option<GeoLocation>> {
        Ok((name == "Paris").then(|| GeoLocation {
            name: "Paris".into(),
            latitude: 48.85,
            longitude: 2.35,
            country: Some("France".into()),
        }))
    }
}

pub struct FakeWeather;

#[async_trait]
impl WeatherService for FakeWeather {
    async fn current(&self, _lat: f64, _lon: f64, _units: Units) -> Result<CurrentWeather> {
        Ok(CurrentWeather {
            temperature: 18.2,
            relative_humidity: 60.0,
            wind_speed: 11.0,
            weather_code: 0,
            time: Some("2024-05-01T12:00".into()),
        })
    }
}

/// Image generator that either succeeds with a fixed URL or always fails.
pub struct FakeImages {
    pub fail: bool,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage> {
        if self.fail {
            return Err(ParleyError::upstream("images", "quota exceeded"));
        }
        Ok(GeneratedImage {
            base64: None,
            url: Some(format!("https://images.example/{}.png", prompt.len())),
            media_type: "image/png".into(),
        })
    }
}

pub struct FakeSpeech {
    pub fail: bool,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio> {
        if self.fail {
            return Err(ParleyError::upstream("speech", "unavailable"));
        }
        Ok(SpeechAudio {
            media_type: "audio/wav".into(),
            bytes: bytes::Bytes::from(format!("RIFF{text}")),
        })
    }
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings::builder()
        .tool_timeout(Duration::from_secs(5))
        .approval_timeout(Duration::from_secs(5))
        .build()
}

/// Orchestrator over the built-in tools backed by fakes.
pub fn orchestrator(
    provider: Arc<ScriptedProvider>,
    settings: OrchestratorSettings,
    failing_images: bool,
) -> ChatOrchestrator {
    let registry = default_registry(
        Arc::new(FakeGeocoder),
        Arc::new(FakeWeather),
        Arc::new(FakeImages {
            fail: failing_images,
        }),
    )
    .unwrap();
    ChatOrchestrator::new(provider, Arc::new(registry), ApprovalBroker::new(), settings)
}

pub fn user(text: &str) -> Vec<UiMessage> {
    vec![UiMessage::user_text("u1", text)]
}

/// Drain a frame stream, failing the test if it stalls.
pub async fn collect(stream: ReceiverStream<UiChunk>) -> Vec<UiChunk> {
    tokio::time::timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
        .await
        .expect("frame stream stalled")
}
