//! Model provider trait and the AI gateway implementation.

pub mod gateway;
pub mod http;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::tools::types::ToolDefinition;
use crate::types::{GenerationSettings, ModelMessage, ModelStreamEvent};

pub use gateway::GatewayProvider;

/// A request sent to a model provider for one step of a turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Provider-qualified model id, e.g. `openai/gpt-4o`.
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

/// Core trait implemented by model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "gateway").
    fn provider_name(&self) -> &str;

    /// Start streaming one model step.
    ///
    /// Errors before the first event (bad status, unreachable host) are
    /// returned directly; failures mid-stream arrive as `Err` items.
    async fn stream(
        &self,
        request: &ModelRequest,
    ) -> Result<BoxStream<'static, Result<ModelStreamEvent>>>;
}
