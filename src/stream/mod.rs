//! Merges model output and tool invocation progress into one frame stream.
//!
//! One task owns the model stream for the whole turn. Tool calls are handed
//! to the [`InvocationRunner`] as soon as their arguments are complete, and
//! their transitions flow back over a channel and are interleaved with the
//! remaining model output. A step ends once the model stream is exhausted
//! and every invocation of the step is terminal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ParleyError;
use crate::invocation::{InvocationRunner, InvocationUpdate, ToolInvocation, ToolInvocationState};
use crate::protocol::UiChunk;
use crate::provider::{ModelProvider, ModelRequest};
use crate::tools::validation::parse_tool_input;
use crate::types::{
    ContentPart, FinishReason, ModelMessage, ModelRole, ModelStreamEvent, ToolCall, ToolResult,
    Usage,
};

pub const DEFAULT_MAX_STEPS: usize = 5;
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(500);

/// Tool result the model sees for an invocation the user rejected.
pub const DENIED_TOOL_RESULT: &str = "Tool execution was denied by the user";

const CHUNK_BUFFER: usize = 64;

/// Produces the frame sequence of one assistant turn.
#[derive(Clone)]
pub struct StreamMultiplexer {
    provider: Arc<dyn ModelProvider>,
    runner: InvocationRunner,
    max_steps: usize,
    max_duration: Duration,
}

impl StreamMultiplexer {
    pub fn new(provider: Arc<dyn ModelProvider>, runner: InvocationRunner) -> Self {
        Self {
            provider,
            runner,
            max_steps: DEFAULT_MAX_STEPS,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Start a turn in the background and return its frames.
    ///
    /// The sequence opens with `start`, and closes with exactly one
    /// `finish` or `error` frame unless `cancel` fires first, in which case
    /// it simply ends. Dropping the returned stream cancels the turn.
    pub fn start(&self, request: ModelRequest, cancel: CancellationToken) -> ReceiverStream<UiChunk> {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
        let this = self.clone();
        tokio::spawn(async move { this.drive(request, message_id, tx, cancel).await });
        ReceiverStream::new(rx)
    }

    async fn drive(
        self,
        mut request: ModelRequest,
        message_id: String,
        tx: mpsc::Sender<UiChunk>,
        cancel: CancellationToken,
    ) {
        let emitter = Emitter { tx };
        let turn = cancel.child_token();
        info!(message_id = %message_id, model = %request.model, "turn started");

        if emitter.emit(UiChunk::Start { message_id: message_id.clone() }).await.is_err() {
            return;
        }

        let outcome = tokio::time::timeout(
            self.max_duration,
            self.run_steps(&mut request, &emitter, &turn),
        )
        .await;

        let closing = match outcome {
            Ok(Ok(summary)) => {
                info!(
                    message_id = %message_id,
                    finish_reason = ?summary.finish_reason,
                    "turn finished"
                );
                UiChunk::Finish {
                    finish_reason: summary.finish_reason,
                    usage: summary.usage,
                }
            }
            Ok(Err(Halt::Canceled)) => {
                turn.cancel();
                info!(message_id = %message_id, "turn canceled");
                return;
            }
            Ok(Err(Halt::Failed(err))) => {
                warn!(message_id = %message_id, error = %err, "turn failed");
                UiChunk::Error {
                    error_text: err.user_message(),
                }
            }
            Err(_elapsed) => {
                let err = ParleyError::Timeout(self.max_duration.as_millis() as u64);
                warn!(message_id = %message_id, error = %err, "turn timed out");
                UiChunk::Error {
                    error_text: err.user_message(),
                }
            }
        };

        turn.cancel();
        let _ = emitter.emit(closing).await;
    }

    async fn run_steps(
        &self,
        request: &mut ModelRequest,
        emitter: &Emitter,
        cancel: &CancellationToken,
    ) -> Result<TurnSummary, Halt> {
        let mut summary = TurnSummary::default();
        let mut parts = PartTracker::default();

        for step in 1..=self.max_steps {
            emitter.emit(UiChunk::StartStep).await?;
            let outcome = self.run_step(request, &mut parts, emitter, cancel).await?;
            emitter.emit(UiChunk::FinishStep).await?;

            debug!(
                step,
                tool_calls = outcome.invocations.len(),
                text_len = outcome.text.len(),
                "step complete"
            );

            summary.finish_reason = Some(outcome.finish_reason);
            if let Some(usage) = &outcome.usage {
                summary.usage.get_or_insert_with(Usage::default).merge(usage);
            }
            if outcome.invocations.is_empty() {
                break;
            }
            if step == self.max_steps {
                debug!(max_steps = self.max_steps, "step limit reached");
                break;
            }
            request.messages.extend(outcome.into_messages());
        }

        Ok(summary)
    }

    async fn run_step(
        &self,
        request: &ModelRequest,
        parts: &mut PartTracker,
        emitter: &Emitter,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome, Halt> {
        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Err(Halt::Canceled),
            stream = self.provider.stream(request) => stream?,
        };

        let (update_tx, mut update_rx) = mpsc::unbounded_channel::<InvocationUpdate>();
        let mut update_tx = Some(update_tx);
        let mut step = StepState::default();
        let mut stream_done = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Halt::Canceled),
                update = update_rx.recv() => match update {
                    Some(update) => {
                        for chunk in update_chunks(&update) {
                            emitter.emit(chunk).await?;
                        }
                    }
                    // Only after the model stream ended and every runner is done.
                    None => break,
                },
                event = stream.next(), if !stream_done => match event {
                    Some(Ok(event)) => {
                        for chunk in step.absorb(event, parts) {
                            emitter.emit(chunk).await?;
                        }
                    }
                    Some(Err(err)) => return Err(Halt::Failed(err)),
                    None => {
                        stream_done = true;
                        step.flush_unfinished_calls();
                        for chunk in parts.close_open() {
                            emitter.emit(chunk).await?;
                        }
                    }
                },
            }

            if let Some(tx) = &update_tx {
                for call in step.ready.drain(..) {
                    let invocation = ToolInvocation::new(&call.id, &call.name);
                    let handle = self
                        .runner
                        .spawn(invocation, call.raw.clone(), tx.clone(), cancel.clone());
                    step.handles.push((handle, call));
                }
            }
            if stream_done {
                update_tx = None;
            }
        }

        let mut invocations = Vec::with_capacity(step.handles.len());
        for (handle, call) in step.handles {
            match handle.await {
                Ok(invocation) => invocations.push((invocation, call.raw)),
                Err(err) => warn!(call_id = %call.id, error = %err, "invocation task failed"),
            }
        }

        Ok(StepOutcome {
            text: step.text,
            invocations,
            finish_reason: step.finish_reason.unwrap_or(FinishReason::Stop),
            usage: step.usage,
        })
    }
}

impl std::fmt::Debug for StreamMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMultiplexer")
            .field("provider", &self.provider.provider_name())
            .field("max_steps", &self.max_steps)
            .field("max_duration", &self.max_duration)
            .finish()
    }
}

/// Why a turn stopped before producing its closing frame.
enum Halt {
    Failed(ParleyError),
    Canceled,
}

impl From<ParleyError> for Halt {
    fn from(err: ParleyError) -> Self {
        Halt::Failed(err)
    }
}

struct Emitter {
    tx: mpsc::Sender<UiChunk>,
}

impl Emitter {
    /// Send one frame; a closed receiver means the client went away.
    async fn emit(&self, chunk: UiChunk) -> Result<(), Halt> {
        self.tx.send(chunk).await.map_err(|_| Halt::Canceled)
    }
}

#[derive(Default)]
struct TurnSummary {
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

struct OpenPart {
    id: String,
    offset: usize,
}

/// Assigns part ids and offsets across all steps of a turn.
#[derive(Default)]
struct PartTracker {
    next_id: usize,
    text: Option<OpenPart>,
    reasoning: Option<OpenPart>,
    sources: HashSet<String>,
}

impl PartTracker {
    fn text_delta(&mut self, delta: String) -> Vec<UiChunk> {
        let mut chunks = self.close_reasoning().into_iter().collect::<Vec<_>>();
        if self.text.is_none() {
            let id = self.fresh_id("text");
            chunks.push(UiChunk::TextStart { id: id.clone() });
            self.text = Some(OpenPart { id, offset: 0 });
        }
        if let Some(part) = self.text.as_mut() {
            let offset = part.offset;
            part.offset += delta.len();
            chunks.push(UiChunk::TextDelta {
                id: part.id.clone(),
                delta,
                offset,
            });
        }
        chunks
    }

    fn reasoning_delta(&mut self, delta: String) -> Vec<UiChunk> {
        let mut chunks = self.close_text().into_iter().collect::<Vec<_>>();
        if self.reasoning.is_none() {
            let id = self.fresh_id("reasoning");
            chunks.push(UiChunk::ReasoningStart { id: id.clone() });
            self.reasoning = Some(OpenPart { id, offset: 0 });
        }
        if let Some(part) = self.reasoning.as_mut() {
            let offset = part.offset;
            part.offset += delta.len();
            chunks.push(UiChunk::ReasoningDelta {
                id: part.id.clone(),
                delta,
                offset,
            });
        }
        chunks
    }

    fn source(&mut self, url: String, title: Option<String>) -> Option<UiChunk> {
        if !self.sources.insert(url.clone()) {
            return None;
        }
        Some(UiChunk::SourceUrl {
            source_id: format!("source-{}", self.sources.len() - 1),
            url,
            title,
        })
    }

    fn close_text(&mut self) -> Option<UiChunk> {
        self.text.take().map(|part| UiChunk::TextEnd { id: part.id })
    }

    fn close_reasoning(&mut self) -> Option<UiChunk> {
        self.reasoning
            .take()
            .map(|part| UiChunk::ReasoningEnd { id: part.id })
    }

    fn close_open(&mut self) -> Vec<UiChunk> {
        self.close_reasoning()
            .into_iter()
            .chain(self.close_text())
            .collect()
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}-{}", self.next_id);
        self.next_id += 1;
        id
    }
}

/// A tool call whose arguments are streaming or complete.
#[derive(Debug, Clone)]
struct PendingCall {
    id: String,
    name: String,
    raw: String,
}

#[derive(Default)]
struct StepState {
    text: String,
    streaming: Vec<PendingCall>,
    offsets: HashMap<String, usize>,
    ready: Vec<PendingCall>,
    handles: Vec<(JoinHandle<ToolInvocation>, PendingCall)>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl StepState {
    fn absorb(&mut self, event: ModelStreamEvent, parts: &mut PartTracker) -> Vec<UiChunk> {
        match event {
            ModelStreamEvent::TextDelta { text } => {
                self.text.push_str(&text);
                parts.text_delta(text)
            }
            ModelStreamEvent::ReasoningDelta { text } => parts.reasoning_delta(text),
            ModelStreamEvent::Source { url, title } => parts.source(url, title).into_iter().collect(),
            ModelStreamEvent::ToolInputStart { id, name } => {
                if self.offsets.contains_key(&id) {
                    debug!(call_id = %id, "duplicate tool input start ignored");
                    return Vec::new();
                }
                let mut chunks = parts.close_open();
                chunks.push(UiChunk::ToolInputStart {
                    tool_call_id: id.clone(),
                    tool_name: name.clone(),
                });
                self.offsets.insert(id.clone(), 0);
                self.streaming.push(PendingCall {
                    id,
                    name,
                    raw: String::new(),
                });
                chunks
            }
            ModelStreamEvent::ToolInputDelta { id, delta } => {
                let Some(call) = self.streaming.iter_mut().find(|c| c.id == id) else {
                    debug!(call_id = %id, "tool input delta for unknown call ignored");
                    return Vec::new();
                };
                call.raw.push_str(&delta);
                let offset = self.offsets.entry(id.clone()).or_default();
                let chunk = UiChunk::ToolInputDelta {
                    tool_call_id: id,
                    input_text_delta: delta.clone(),
                    offset: *offset,
                };
                *offset += delta.len();
                vec![chunk]
            }
            ModelStreamEvent::ToolInputEnd { id } => {
                if let Some(pos) = self.streaming.iter().position(|c| c.id == id) {
                    let call = self.streaming.remove(pos);
                    self.ready.push(call);
                }
                Vec::new()
            }
            ModelStreamEvent::Finish { reason, usage } => {
                self.finish_reason = Some(reason);
                if let Some(usage) = usage {
                    self.usage.get_or_insert_with(Usage::default).merge(&usage);
                }
                Vec::new()
            }
        }
    }

    /// Calls the model started but never ended still get driven to a
    /// terminal state; malformed arguments fail validation.
    fn flush_unfinished_calls(&mut self) {
        self.ready.append(&mut self.streaming);
    }
}

struct StepOutcome {
    text: String,
    invocations: Vec<(ToolInvocation, String)>,
    finish_reason: FinishReason,
    usage: Option<Usage>,
}

impl StepOutcome {
    /// The assistant message of this step followed by one result per call.
    fn into_messages(self) -> Vec<ModelMessage> {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentPart::Text { text: self.text });
        }
        for (invocation, raw) in &self.invocations {
            let arguments = invocation
                .state
                .input()
                .cloned()
                .or_else(|| parse_tool_input(raw).ok())
                .unwrap_or_else(|| json!({}));
            content.push(ContentPart::ToolCall(ToolCall {
                id: invocation.tool_call_id.clone(),
                name: invocation.tool_name.clone(),
                arguments,
            }));
        }

        let mut messages = vec![ModelMessage {
            role: ModelRole::Assistant,
            content,
        }];
        messages.extend(
            self.invocations
                .iter()
                .map(|(invocation, _)| ModelMessage::tool_result(tool_result(invocation))),
        );
        messages
    }
}

/// What the model is told about a finished invocation.
pub fn tool_result(invocation: &ToolInvocation) -> ToolResult {
    let (result, is_error) = match &invocation.state {
        ToolInvocationState::OutputAvailable { output, .. } => (output.clone(), false),
        ToolInvocationState::OutputError { error_text, .. } => {
            (Value::String(error_text.clone()), true)
        }
        ToolInvocationState::Rejected { .. } => (Value::String(DENIED_TOOL_RESULT.to_string()), true),
        _ => (Value::String("Tool did not complete".to_string()), true),
    };
    ToolResult {
        tool_call_id: invocation.tool_call_id.clone(),
        tool_name: invocation.tool_name.clone(),
        result,
        is_error,
    }
}

/// Frames announcing one invocation transition.
pub fn update_chunks(update: &InvocationUpdate) -> Vec<UiChunk> {
    let tool_call_id = update.tool_call_id.clone();
    match &update.state {
        ToolInvocationState::InputStreaming { .. } => Vec::new(),
        ToolInvocationState::InputAvailable { input } => vec![UiChunk::ToolInputAvailable {
            tool_call_id,
            tool_name: update.tool_name.clone(),
            input: input.clone(),
        }],
        ToolInvocationState::ApprovalPending { approval, .. } => {
            vec![UiChunk::ToolApprovalRequest {
                approval_id: approval.id.clone(),
                tool_call_id,
            }]
        }
        ToolInvocationState::Executing { approval, .. } => {
            let mut chunks = Vec::with_capacity(2);
            if let Some(approval) = approval {
                chunks.push(UiChunk::ToolApprovalResponse {
                    approval_id: approval.id.clone(),
                    tool_call_id: tool_call_id.clone(),
                    approved: true,
                    reason: approval.reason.clone(),
                });
            }
            chunks.push(UiChunk::ToolExecutionStart { tool_call_id });
            chunks
        }
        ToolInvocationState::OutputAvailable { output, .. } => {
            vec![UiChunk::ToolOutputAvailable {
                tool_call_id,
                output: output.clone(),
            }]
        }
        ToolInvocationState::OutputError { error_text, .. } => vec![UiChunk::ToolOutputError {
            tool_call_id,
            error_text: error_text.clone(),
        }],
        ToolInvocationState::Rejected { approval, .. } => vec![
            UiChunk::ToolApprovalResponse {
                approval_id: approval.id.clone(),
                tool_call_id: tool_call_id.clone(),
                approved: false,
                reason: approval.reason.clone(),
            },
            UiChunk::ToolOutputDenied { tool_call_id },
        ],
    }
}
