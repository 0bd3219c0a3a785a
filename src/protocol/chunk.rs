//! Protocol frames of the UI message stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{FinishReason, Usage};

/// One independently parsable frame.
///
/// Incremental frames (`*-delta`) carry the byte `offset` at which their
/// payload starts within the part, so a consumer can apply them exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum UiChunk {
    Start {
        message_id: String,
    },
    StartStep,
    FinishStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
        #[serde(default)]
        offset: usize,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
        #[serde(default)]
        offset: usize,
    },
    ReasoningEnd {
        id: String,
    },
    SourceUrl {
        source_id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    File {
        url: String,
        media_type: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
        #[serde(default)]
        offset: usize,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolApprovalRequest {
        approval_id: String,
        tool_call_id: String,
    },
    ToolApprovalResponse {
        approval_id: String,
        tool_call_id: String,
        approved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    ToolExecutionStart {
        tool_call_id: String,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    ToolOutputDenied {
        tool_call_id: String,
    },
    Error {
        error_text: String,
    },
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

impl UiChunk {
    /// The tool call this frame belongs to, if any.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolInputStart { tool_call_id, .. }
            | Self::ToolInputDelta { tool_call_id, .. }
            | Self::ToolInputAvailable { tool_call_id, .. }
            | Self::ToolApprovalRequest { tool_call_id, .. }
            | Self::ToolApprovalResponse { tool_call_id, .. }
            | Self::ToolExecutionStart { tool_call_id }
            | Self::ToolOutputAvailable { tool_call_id, .. }
            | Self::ToolOutputError { tool_call_id, .. }
            | Self::ToolOutputDenied { tool_call_id } => Some(tool_call_id),
            _ => None,
        }
    }

    /// Whether this frame ends the message.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn frames_use_kebab_tags_and_camel_fields() {
        let chunk = UiChunk::ToolInputDelta {
            tool_call_id: "call_1".into(),
            input_text_delta: "{\"loc".into(),
            offset: 0,
        };
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({
                "type": "tool-input-delta",
                "toolCallId": "call_1",
                "inputTextDelta": "{\"loc",
                "offset": 0,
            })
        );
    }

    #[test]
    fn unit_frames_carry_only_the_tag() {
        assert_eq!(
            serde_json::to_value(&UiChunk::StartStep).unwrap(),
            json!({"type": "start-step"})
        );
    }

    #[test]
    fn finish_frame_reports_reason() {
        let chunk = UiChunk::Finish {
            finish_reason: Some(FinishReason::Stop),
            usage: None,
        };
        assert_eq!(
            serde_json::to_value(&chunk).unwrap(),
            json!({"type": "finish", "finishReason": "stop"})
        );
        assert!(chunk.is_terminal());
    }

    #[test]
    fn delta_without_offset_parses_as_zero() {
        let chunk: UiChunk =
            serde_json::from_value(json!({"type": "text-delta", "id": "t0", "delta": "hi"}))
                .unwrap();
        assert_eq!(
            chunk,
            UiChunk::TextDelta {
                id: "t0".into(),
                delta: "hi".into(),
                offset: 0
            }
        );
    }
}
