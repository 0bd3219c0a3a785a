//! Client-side folding of frames back into a [`UiMessage`].
//!
//! Applying a frame is idempotent: delta frames are placed by their offset
//! against a per-part cursor, sources are appended once per id, scalar
//! fields are last-value-wins, and tool states only ever move forward.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::chunk::UiChunk;
use super::encoder::parse_sse_body;
use crate::error::Result;
use crate::invocation::state::{ApprovalRecord, ToolInvocation, ToolInvocationState};
use crate::types::{FilePart, FinishReason, Part, Role, SourceUrlPart, UiMessage, Usage};

/// Folds an ordered frame sequence into one assistant message.
#[derive(Debug, Clone)]
pub struct MessageAssembler {
    message: UiMessage,
    text_parts: HashMap<String, usize>,
    reasoning_parts: HashMap<String, usize>,
    tool_parts: HashMap<String, usize>,
    tool_input_text: HashMap<String, String>,
    sources: HashSet<String>,
    files: HashSet<String>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    error: Option<String>,
    closed: bool,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self {
            message: UiMessage::new(String::new(), Role::Assistant),
            text_parts: HashMap::new(),
            reasoning_parts: HashMap::new(),
            tool_parts: HashMap::new(),
            tool_input_text: HashMap::new(),
            sources: HashSet::new(),
            files: HashSet::new(),
            finish_reason: None,
            usage: None,
            error: None,
            closed: false,
        }
    }

    /// Fold every chunk in order.
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a UiChunk>) -> Self {
        let mut assembler = Self::new();
        for chunk in chunks {
            assembler.apply(chunk);
        }
        assembler
    }

    /// Decode a full SSE response body.
    pub fn from_sse(body: &[u8]) -> Result<Self> {
        let chunks = parse_sse_body(body)?;
        Ok(Self::from_chunks(&chunks))
    }

    pub fn message(&self) -> &UiMessage {
        &self.message
    }

    pub fn into_message(self) -> UiMessage {
        self.message
    }

    /// Whether a `finish` or `error` frame closed the message.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Apply one frame.
    pub fn apply(&mut self, chunk: &UiChunk) {
        if self.closed {
            return;
        }
        match chunk {
            UiChunk::Start { message_id } => self.message.id = message_id.clone(),
            UiChunk::StartStep | UiChunk::FinishStep => {}
            UiChunk::TextStart { id } => {
                text_slot(&mut self.message, &mut self.text_parts, id, |s| {
                    Part::text(s)
                });
            }
            UiChunk::TextDelta { id, delta, offset } => {
                if let Some(text) =
                    text_slot(&mut self.message, &mut self.text_parts, id, |s| {
                        Part::text(s)
                    })
                {
                    append_at(text, delta, *offset);
                }
            }
            UiChunk::ReasoningStart { id } => {
                text_slot(
                    &mut self.message,
                    &mut self.reasoning_parts,
                    id,
                    |s| Part::reasoning(s),
                );
            }
            UiChunk::ReasoningDelta { id, delta, offset } => {
                if let Some(text) = text_slot(
                    &mut self.message,
                    &mut self.reasoning_parts,
                    id,
                    |s| Part::reasoning(s),
                ) {
                    append_at(text, delta, *offset);
                }
            }
            UiChunk::TextEnd { .. } | UiChunk::ReasoningEnd { .. } => {}
            UiChunk::SourceUrl {
                source_id,
                url,
                title,
            } => {
                if self.sources.insert(source_id.clone()) {
                    self.message.parts.push(Part::SourceUrl(SourceUrlPart {
                        source_id: source_id.clone(),
                        url: url.clone(),
                        title: title.clone(),
                    }));
                }
            }
            UiChunk::File { url, media_type } => {
                if self.files.insert(url.clone()) {
                    self.message.parts.push(Part::File(FilePart {
                        media_type: media_type.clone(),
                        url: url.clone(),
                        filename: None,
                    }));
                }
            }
            UiChunk::ToolInputStart {
                tool_call_id,
                tool_name,
            } => {
                self.tool(tool_call_id, Some(tool_name.as_str()));
            }
            UiChunk::ToolInputDelta {
                tool_call_id,
                input_text_delta,
                offset,
            } => {
                let raw = self.tool_input_text.entry(tool_call_id.clone()).or_default();
                append_at(raw, input_text_delta, *offset);
                let partial = serde_json::from_str::<Value>(raw).ok();
                if let Some(inv) = self.tool(tool_call_id, None) {
                    if let ToolInvocationState::InputStreaming { input } = &mut inv.state {
                        *input = partial;
                    }
                }
            }
            UiChunk::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                if let Some(inv) = self.tool(tool_call_id, Some(tool_name.as_str())) {
                    promote(
                        inv,
                        ToolInvocationState::InputAvailable {
                            input: input.clone(),
                        },
                    );
                }
            }
            UiChunk::ToolApprovalRequest {
                approval_id,
                tool_call_id,
            } => {
                if let Some(inv) = self.tool(tool_call_id, None) {
                    let next = ToolInvocationState::ApprovalPending {
                        input: current_input(inv),
                        approval: ApprovalRecord::pending(approval_id.clone()),
                    };
                    promote(inv, next);
                }
            }
            UiChunk::ToolApprovalResponse {
                approval_id,
                tool_call_id,
                approved,
                reason,
            } => {
                if let Some(inv) = self.tool(tool_call_id, None) {
                    record_decision(inv, approval_id, *approved, reason.clone());
                }
            }
            UiChunk::ToolExecutionStart { tool_call_id } => {
                if let Some(inv) = self.tool(tool_call_id, None) {
                    let next = ToolInvocationState::Executing {
                        input: current_input(inv),
                        approval: inv.state.approval().cloned(),
                    };
                    promote(inv, next);
                }
            }
            UiChunk::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                if let Some(inv) = self.tool(tool_call_id, None) {
                    let next = ToolInvocationState::OutputAvailable {
                        input: current_input(inv),
                        output: output.clone(),
                        approval: inv.state.approval().cloned(),
                    };
                    promote(inv, next);
                }
            }
            UiChunk::ToolOutputError {
                tool_call_id,
                error_text,
            } => {
                if let Some(inv) = self.tool(tool_call_id, None) {
                    let next = ToolInvocationState::OutputError {
                        input: inv.state.input().cloned(),
                        error_text: error_text.clone(),
                        approval: inv.state.approval().cloned(),
                    };
                    promote(inv, next);
                }
            }
            UiChunk::ToolOutputDenied { tool_call_id } => {
                if let Some(inv) = self.tool(tool_call_id, None) {
                    let approval = inv
                        .state
                        .approval()
                        .cloned()
                        .unwrap_or_else(|| ApprovalRecord::pending(String::new()))
                        .decided(false, inv.state.approval().and_then(|a| a.reason.clone()));
                    let next = ToolInvocationState::Rejected {
                        input: current_input(inv),
                        approval,
                    };
                    promote(inv, next);
                }
            }
            UiChunk::Error { error_text } => {
                self.error = Some(error_text.clone());
                self.closed = true;
            }
            UiChunk::Finish {
                finish_reason,
                usage,
            } => {
                self.finish_reason = *finish_reason;
                self.usage = usage.clone();
                self.closed = true;
            }
        }
    }

    /// The invocation for `tool_call_id`, created on first reference.
    fn tool(&mut self, tool_call_id: &str, tool_name: Option<&str>) -> Option<&mut ToolInvocation> {
        let idx = match self.tool_parts.get(tool_call_id) {
            Some(&idx) => idx,
            None => {
                let idx = self.message.parts.len();
                self.message.parts.push(Part::Tool(ToolInvocation::new(
                    tool_call_id,
                    tool_name.unwrap_or_default(),
                )));
                self.tool_parts.insert(tool_call_id.to_string(), idx);
                idx
            }
        };
        match self.message.parts.get_mut(idx) {
            Some(Part::Tool(inv)) => {
                if let Some(name) = tool_name {
                    if inv.tool_name.is_empty() {
                        inv.tool_name = name.to_string();
                    }
                }
                Some(inv)
            }
            _ => None,
        }
    }
}

/// The text buffer of the part registered under `id`, created if absent.
fn text_slot<'m>(
    message: &'m mut UiMessage,
    index: &mut HashMap<String, usize>,
    id: &str,
    make: fn(String) -> Part,
) -> Option<&'m mut String> {
    let idx = *index.entry(id.to_string()).or_insert_with(|| {
        message.parts.push(make(String::new()));
        message.parts.len() - 1
    });
    match message.parts.get_mut(idx) {
        Some(Part::Text(part)) => Some(&mut part.text),
        Some(Part::Reasoning(part)) => Some(&mut part.text),
        _ => None,
    }
}

/// Place `delta` at byte `offset`, keeping only what extends past the cursor.
fn append_at(buffer: &mut String, delta: &str, offset: usize) {
    let cursor = buffer.len();
    if offset.saturating_add(delta.len()) <= cursor {
        return;
    }
    if offset >= cursor {
        buffer.push_str(delta);
        return;
    }
    if let Some(tail) = delta.get(cursor - offset..) {
        buffer.push_str(tail);
    }
}

fn current_input(inv: &ToolInvocation) -> Value {
    inv.state.input().cloned().unwrap_or(Value::Null)
}

fn promote(inv: &mut ToolInvocation, next: ToolInvocationState) {
    if next.kind().rank() > inv.kind().rank() {
        inv.state = next;
    }
}

fn record_decision(inv: &mut ToolInvocation, approval_id: &str, approved: bool, reason: Option<String>) {
    let approval = match &mut inv.state {
        ToolInvocationState::ApprovalPending { approval, .. }
        | ToolInvocationState::Rejected { approval, .. } => Some(approval),
        ToolInvocationState::Executing { approval, .. }
        | ToolInvocationState::OutputAvailable { approval, .. }
        | ToolInvocationState::OutputError { approval, .. } => approval.as_mut(),
        _ => None,
    };
    if let Some(approval) = approval {
        if approval.id == approval_id {
            approval.approved = Some(approved);
            approval.reason = reason;
        }
    }
}
