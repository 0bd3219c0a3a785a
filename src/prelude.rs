//! Convenience re-exports for common use.

pub use crate::chat::{ChatOrchestrator, FeatureFlags, OrchestratorSettings};
pub use crate::config::ParleyConfig;
pub use crate::error::{ParleyError, Result};
pub use crate::invocation::{ApprovalBroker, ApprovalDecision, ToolInvocation, ToolInvocationState};
pub use crate::protocol::{MessageAssembler, UiChunk};
pub use crate::provider::{ModelProvider, ModelRequest};
pub use crate::tools::{AgentTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::types::{
    ContentPart, FinishReason, GenerationSettings, ModelMessage, ModelStreamEvent, Part, Role,
    UiMessage, Usage,
};
