//! Turns an incoming conversation into a live frame stream.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::convert::to_model_messages;
use crate::error::{ParleyError, Result};
use crate::invocation::runner::{DEFAULT_APPROVAL_TIMEOUT, DEFAULT_TOOL_TIMEOUT};
use crate::invocation::{ApprovalBroker, InvocationRunner};
use crate::models::{ModelSelector, DEFAULT_CHAT_MODEL, SEARCH_MODEL};
use crate::protocol::UiChunk;
use crate::provider::{ModelProvider, ModelRequest};
use crate::stream::{StreamMultiplexer, DEFAULT_MAX_DURATION, DEFAULT_MAX_STEPS};
use crate::tools::ToolRegistry;
use crate::types::{GenerationSettings, UiMessage};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that can answer questions and help with tasks. \
When you use tools, always provide a clear, natural language response to the user based on the tool results. \
Do not just call tools without explaining the results.";

/// Per-request switches sent by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Route the turn to the search model, which returns citations.
    pub web_search: bool,
}

/// Turn-level knobs, normally filled from [`crate::config::ParleyConfig`].
#[derive(Debug, Clone, Builder)]
pub struct OrchestratorSettings {
    #[builder(default = DEFAULT_CHAT_MODEL.to_string(), into)]
    pub default_model: String,
    #[builder(default = SEARCH_MODEL.to_string(), into)]
    pub search_model: String,
    #[builder(default = SYSTEM_PROMPT.to_string(), into)]
    pub system_prompt: String,
    #[builder(default)]
    pub generation: GenerationSettings,
    #[builder(default = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
    #[builder(default = DEFAULT_MAX_DURATION)]
    pub max_duration: Duration,
    #[builder(default = DEFAULT_TOOL_TIMEOUT)]
    pub tool_timeout: Duration,
    #[builder(default = DEFAULT_APPROVAL_TIMEOUT)]
    pub approval_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Validates chat requests and starts their turns.
#[derive(Debug, Clone)]
pub struct ChatOrchestrator {
    registry: Arc<ToolRegistry>,
    approvals: Arc<ApprovalBroker>,
    multiplexer: StreamMultiplexer,
    settings: OrchestratorSettings,
}

impl ChatOrchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ToolRegistry>,
        approvals: Arc<ApprovalBroker>,
        settings: OrchestratorSettings,
    ) -> Self {
        let runner = InvocationRunner::new(registry.clone(), approvals.clone())
            .with_tool_timeout(settings.tool_timeout)
            .with_approval_timeout(settings.approval_timeout);
        let multiplexer = StreamMultiplexer::new(provider, runner)
            .with_max_steps(settings.max_steps)
            .with_max_duration(settings.max_duration);
        Self {
            registry,
            approvals,
            multiplexer,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Broker where external approval decisions are delivered.
    pub fn approvals(&self) -> &Arc<ApprovalBroker> {
        &self.approvals
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Validate a conversation and build the first model request of its turn.
    pub fn prepare(
        &self,
        history: &[UiMessage],
        model: Option<&str>,
        flags: FeatureFlags,
    ) -> Result<ModelRequest> {
        if history.is_empty() {
            return Err(ParleyError::MalformedRequest(
                "messages must not be empty".to_string(),
            ));
        }
        if let Some((index, _)) = history.iter().enumerate().find(|(_, m)| m.parts.is_empty()) {
            return Err(ParleyError::MalformedRequest(format!(
                "message {index} has no parts"
            )));
        }

        let model = if flags.web_search {
            self.settings.search_model.clone()
        } else {
            match model.map(str::trim).filter(|m| !m.is_empty()) {
                Some(selector) => ModelSelector::parse(selector)?.to_string(),
                None => self.settings.default_model.clone(),
            }
        };

        Ok(ModelRequest {
            model,
            system: Some(self.settings.system_prompt.clone()),
            messages: to_model_messages(history),
            tools: self.registry.list_for_model_context(),
            settings: self.settings.generation.clone(),
        })
    }

    /// Start a turn; dropping the returned stream cancels it.
    pub fn handle(
        &self,
        history: &[UiMessage],
        model: Option<&str>,
        flags: FeatureFlags,
    ) -> Result<ReceiverStream<UiChunk>> {
        self.handle_with_cancel(history, model, flags, CancellationToken::new())
    }

    /// Start a turn that also stops when `cancel` fires.
    pub fn handle_with_cancel(
        &self,
        history: &[UiMessage],
        model: Option<&str>,
        flags: FeatureFlags,
        cancel: CancellationToken,
    ) -> Result<ReceiverStream<UiChunk>> {
        let request = self.prepare(history, model, flags)?;
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            web_search = flags.web_search,
            "chat request accepted"
        );
        Ok(self.multiplexer.start(request, cancel))
    }
}
