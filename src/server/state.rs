//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::chat::ChatOrchestrator;
use crate::config::ParleyConfig;
use crate::error::Result;
use crate::invocation::ApprovalBroker;
use crate::provider::GatewayProvider;
use crate::services::{
    GatewayImageClient, GroqSpeechClient, ImageGenerator, OpenMeteoClient, SpeechSynthesizer,
};
use crate::tools::builtin::default_registry;

/// Everything the HTTP handlers need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub images: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
}

impl AppState {
    pub fn new(
        orchestrator: ChatOrchestrator,
        images: Arc<dyn ImageGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            images,
            speech,
        }
    }

    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: &ParleyConfig) -> Result<Self> {
        config.validate()?;

        let gateway_key = config.gateway_api_key.clone().unwrap_or_else(|| {
            warn!("AI_GATEWAY_API_KEY is not set; model and image requests will be rejected upstream");
            String::new()
        });
        if config.groq_api_key.is_none() {
            warn!("GROQ_API_KEY is not set; speech synthesis is unavailable");
        }

        let open_meteo = Arc::new(OpenMeteoClient::new(
            config.geocoding_url.clone(),
            config.forecast_url.clone(),
        ));
        let images: Arc<dyn ImageGenerator> = Arc::new(GatewayImageClient::new(
            gateway_key.clone(),
            config.gateway_base_url.clone(),
            config.image_model.clone(),
        ));
        let speech: Arc<dyn SpeechSynthesizer> = Arc::new(
            GroqSpeechClient::new(config.groq_api_key.clone().unwrap_or_default())
                .with_base_url(config.groq_base_url.clone())
                .with_model(config.tts_model.clone())
                .with_voice(config.voice.clone())
                .with_max_input_chars(config.tts_max_input_chars)
                .with_timeout(Duration::from_secs(config.tool_timeout_secs)),
        );

        let registry = Arc::new(default_registry(
            open_meteo.clone(),
            open_meteo,
            images.clone(),
        )?);
        let provider = Arc::new(GatewayProvider::new(
            gateway_key,
            Some(config.gateway_base_url.clone()),
        ));
        let orchestrator = ChatOrchestrator::new(
            provider,
            registry,
            ApprovalBroker::new(),
            config.orchestrator_settings(),
        );

        Ok(Self::new(orchestrator, images, speech))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
