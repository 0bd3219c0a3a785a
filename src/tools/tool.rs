//! The [`Tool`] seam and a closure-backed implementation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::arguments::ToolArguments;
use super::types::{ToolDefinition, ToolParameters};
use crate::error::ParleyError;
use crate::invocation::state::ApprovalRecord;

/// Per-call data handed to an executor.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    pub tool_call_id: String,
    pub tool_name: String,
    /// The granted approval, for approval-required tools.
    pub approval: Option<ApprovalRecord>,
}

/// A capability the model may call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    /// Each call waits for a human decision before it may run.
    fn requires_approval(&self) -> bool {
        false
    }

    /// `false` for tools whose result is the approval decision itself.
    fn has_executor(&self) -> bool {
        true
    }

    async fn execute(&self, args: &ToolArguments, ctx: &ToolExecutionContext) -> Result<Value, ParleyError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

type Executor =
    dyn Fn(ToolArguments, ToolExecutionContext) -> BoxFuture<'static, Result<Value, ParleyError>> + Send + Sync;

/// A tool defined by its metadata and an async closure.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    requires_approval: bool,
    executor: Option<Arc<Executor>>,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        executor: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ParleyError>> + Send + 'static,
    {
        let executor: Arc<Executor> = Arc::new(move |args, ctx| Box::pin(executor(args, ctx)));
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            requires_approval: false,
            executor: Some(executor),
        }
    }

    /// A tool with no executor: its output is the user's decision.
    pub fn approval_only(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            requires_approval: true,
            executor: None,
        }
    }

    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    async fn execute(&self, args: &ToolArguments, ctx: &ToolExecutionContext) -> Result<Value, ParleyError> {
        let Some(executor) = &self.executor else {
            return Err(ParleyError::tool(&self.name, "tool has no server-side executor"));
        };
        executor(args.clone(), ctx.clone()).await
    }
}

impl fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("requires_approval", &self.requires_approval)
            .field("has_executor", &self.executor.is_some())
            .finish()
    }
}
