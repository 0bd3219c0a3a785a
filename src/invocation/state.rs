//! Lifecycle of a single tool invocation.
//!
//! ```text
//! input-streaming ──► input-available ──► executing ──► output-available
//!        │                   │                 └──────► output-error
//!        │                   └──► approval-pending ──► executing
//!        │                                 └─────────► rejected
//!        └──► output-error
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::{ParleyError, Result};

/// Human approval attached to an invocation of an approval-required tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRecord {
    pub id: String,
    /// `None` while the decision is outstanding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalRecord {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            approved: None,
            reason: None,
        }
    }

    pub fn decided(mut self, approved: bool, reason: Option<String>) -> Self {
        self.approved = Some(approved);
        self.reason = reason;
        self
    }
}

/// State of a tool invocation, carrying exactly the data valid in that state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ToolInvocationState {
    InputStreaming {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
    },
    InputAvailable {
        input: Value,
    },
    ApprovalPending {
        input: Value,
        approval: ApprovalRecord,
    },
    Executing {
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approval: Option<ApprovalRecord>,
    },
    OutputAvailable {
        input: Value,
        output: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approval: Option<ApprovalRecord>,
    },
    OutputError {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Value>,
        error_text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        approval: Option<ApprovalRecord>,
    },
    Rejected {
        input: Value,
        approval: ApprovalRecord,
    },
}

/// Data-less discriminant of [`ToolInvocationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ToolStateKind {
    InputStreaming,
    InputAvailable,
    ApprovalPending,
    Executing,
    OutputAvailable,
    OutputError,
    Rejected,
}

impl ToolStateKind {
    /// Position along the lifecycle; terminal states share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::InputStreaming => 0,
            Self::InputAvailable => 1,
            Self::ApprovalPending => 2,
            Self::Executing => 3,
            Self::OutputAvailable | Self::OutputError | Self::Rejected => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::OutputAvailable | Self::OutputError | Self::Rejected
        )
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// `input-streaming` may repeat while argument fragments arrive.
    pub fn can_advance_to(self, next: ToolStateKind) -> bool {
        use ToolStateKind::*;
        matches!(
            (self, next),
            (InputStreaming, InputStreaming)
                | (InputStreaming, InputAvailable)
                | (InputStreaming, OutputError)
                | (InputAvailable, ApprovalPending)
                | (InputAvailable, Executing)
                | (ApprovalPending, Executing)
                | (ApprovalPending, Rejected)
                | (Executing, OutputAvailable)
                | (Executing, OutputError)
        )
    }
}

impl ToolInvocationState {
    pub fn kind(&self) -> ToolStateKind {
        match self {
            Self::InputStreaming { .. } => ToolStateKind::InputStreaming,
            Self::InputAvailable { .. } => ToolStateKind::InputAvailable,
            Self::ApprovalPending { .. } => ToolStateKind::ApprovalPending,
            Self::Executing { .. } => ToolStateKind::Executing,
            Self::OutputAvailable { .. } => ToolStateKind::OutputAvailable,
            Self::OutputError { .. } => ToolStateKind::OutputError,
            Self::Rejected { .. } => ToolStateKind::Rejected,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }

    pub fn input(&self) -> Option<&Value> {
        match self {
            Self::InputStreaming { input } | Self::OutputError { input, .. } => input.as_ref(),
            Self::InputAvailable { input }
            | Self::ApprovalPending { input, .. }
            | Self::Executing { input, .. }
            | Self::OutputAvailable { input, .. }
            | Self::Rejected { input, .. } => Some(input),
        }
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::OutputAvailable { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match self {
            Self::OutputError { error_text, .. } => Some(error_text),
            _ => None,
        }
    }

    pub fn approval(&self) -> Option<&ApprovalRecord> {
        match self {
            Self::ApprovalPending { approval, .. } | Self::Rejected { approval, .. } => {
                Some(approval)
            }
            Self::Executing { approval, .. }
            | Self::OutputAvailable { approval, .. }
            | Self::OutputError { approval, .. } => approval.as_ref(),
            _ => None,
        }
    }
}

/// Stateful record of one model-initiated tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub tool_call_id: String,
    pub state: ToolInvocationState,
}

impl ToolInvocation {
    /// A fresh invocation whose arguments are still streaming.
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            state: ToolInvocationState::InputStreaming { input: None },
        }
    }

    pub fn kind(&self) -> ToolStateKind {
        self.state.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: ToolInvocationState) -> Result<()> {
        let from = self.kind();
        let to = next.kind();
        if !from.can_advance_to(to) {
            return Err(ParleyError::InvalidState(format!(
                "tool call {} cannot move from {from} to {to}",
                self.tool_call_id
            )));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn happy_path_without_approval() {
        let mut inv = ToolInvocation::new("call_1", "getWeather");
        let input = json!({"location": "Paris"});
        inv.advance(ToolInvocationState::InputAvailable { input: input.clone() })
            .unwrap();
        inv.advance(ToolInvocationState::Executing {
            input: input.clone(),
            approval: None,
        })
        .unwrap();
        inv.advance(ToolInvocationState::OutputAvailable {
            input,
            output: json!({"temperature": "18°C"}),
            approval: None,
        })
        .unwrap();
        assert!(inv.is_terminal());
        assert_eq!(inv.state.output().unwrap()["temperature"], "18°C");
    }

    #[test]
    fn approval_tool_cannot_skip_to_output() {
        let mut inv = ToolInvocation::new("call_2", "askForConfirmation");
        let input = json!({"message": "Proceed?"});
        inv.advance(ToolInvocationState::InputAvailable { input: input.clone() })
            .unwrap();
        inv.advance(ToolInvocationState::ApprovalPending {
            input: input.clone(),
            approval: ApprovalRecord::pending("appr_1"),
        })
        .unwrap();
        let err = inv
            .advance(ToolInvocationState::OutputAvailable {
                input,
                output: json!(true),
                approval: None,
            })
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidState(_)));
        assert_eq!(inv.kind(), ToolStateKind::ApprovalPending);
    }

    #[test]
    fn terminal_states_never_move() {
        for terminal in [
            ToolStateKind::OutputAvailable,
            ToolStateKind::OutputError,
            ToolStateKind::Rejected,
        ] {
            for next in [
                ToolStateKind::InputStreaming,
                ToolStateKind::InputAvailable,
                ToolStateKind::ApprovalPending,
                ToolStateKind::Executing,
                ToolStateKind::OutputAvailable,
                ToolStateKind::OutputError,
                ToolStateKind::Rejected,
            ] {
                assert!(!terminal.can_advance_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn legal_transitions_never_lower_the_rank() {
        let all = [
            ToolStateKind::InputStreaming,
            ToolStateKind::InputAvailable,
            ToolStateKind::ApprovalPending,
            ToolStateKind::Executing,
            ToolStateKind::OutputAvailable,
            ToolStateKind::OutputError,
            ToolStateKind::Rejected,
        ];
        for from in all {
            for to in all {
                if from.can_advance_to(to) {
                    assert!(to.rank() >= from.rank(), "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn rejected_is_only_reachable_from_approval_pending() {
        assert!(ToolStateKind::ApprovalPending.can_advance_to(ToolStateKind::Rejected));
        assert!(!ToolStateKind::InputAvailable.can_advance_to(ToolStateKind::Rejected));
        assert!(!ToolStateKind::Executing.can_advance_to(ToolStateKind::Rejected));
    }

    #[test]
    fn state_serializes_with_kebab_tag_and_camel_fields() {
        let state = ToolInvocationState::OutputError {
            input: None,
            error_text: "boom".into(),
            approval: None,
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value, json!({"state": "output-error", "errorText": "boom"}));
    }
}
