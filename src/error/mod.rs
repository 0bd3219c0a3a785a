//! Error types for Parley.

use thiserror::Error;

/// Broad error category used for routing and HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller sent something unusable.
    Request,
    /// Registry misuse; a programming error caught at startup.
    Registry,
    /// A tool invocation failed; scoped to that invocation.
    Tool,
    /// A model or auxiliary service failed.
    Upstream,
    Timeout,
    Configuration,
    Internal,
}

/// Primary error type for all Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("Invalid input for tool {tool_name}: {message}")]
    SchemaValidation { tool_name: String, message: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Provider error: {provider}: {message}")]
    UpstreamProvider { provider: String, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ParleyError {
    /// Create an upstream provider error.
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamProvider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedRequest(_) => ErrorCategory::Request,
            Self::UnknownTool(_) | Self::DuplicateTool(_) => ErrorCategory::Registry,
            Self::SchemaValidation { .. } | Self::ToolExecution { .. } => ErrorCategory::Tool,
            Self::UpstreamProvider { .. } | Self::Api { .. } | Self::Network(_) => {
                ErrorCategory::Upstream
            }
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) | Self::Io(_) | Self::InvalidState(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the caller is at fault (maps to a 4xx response).
    pub fn is_client_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Request)
    }

    /// Message safe to show an end user in a terminal `error` frame.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Request | ErrorCategory::Tool => self.to_string(),
            ErrorCategory::Timeout => "The response took too long and was stopped.".to_string(),
            ErrorCategory::Upstream => {
                "The model provider failed to respond. Please try again.".to_string()
            }
            _ => "An internal error occurred.".to_string(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParleyError>;
