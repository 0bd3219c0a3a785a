//! Drives one tool invocation from complete arguments to a terminal state.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::approval::ApprovalBroker;
use super::state::{ApprovalRecord, ToolInvocation, ToolInvocationState};
use crate::error::ParleyError;
use crate::tools::arguments::ToolArguments;
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::ToolExecutionContext;
use crate::tools::validation::{apply_defaults, parse_tool_input, validate_arguments};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);

/// A state transition of one invocation, as observed by the multiplexer.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationUpdate {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolInvocationState,
}

/// Spawns and drives tool invocations.
///
/// Each invocation runs in its own task and owns its state exclusively;
/// observers only see the transitions it reports over the update channel.
#[derive(Clone)]
pub struct InvocationRunner {
    registry: Arc<ToolRegistry>,
    approvals: Arc<ApprovalBroker>,
    tool_timeout: Duration,
    approval_timeout: Duration,
}

impl InvocationRunner {
    pub fn new(registry: Arc<ToolRegistry>, approvals: Arc<ApprovalBroker>) -> Self {
        Self {
            registry,
            approvals,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Run an invocation whose arguments finished streaming as its own task.
    pub fn spawn(
        &self,
        invocation: ToolInvocation,
        raw_input: String,
        updates: mpsc::UnboundedSender<InvocationUpdate>,
        cancel: CancellationToken,
    ) -> JoinHandle<ToolInvocation> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(invocation, &raw_input, &updates, &cancel).await })
    }

    /// Drive `invocation` to a terminal state, reporting every transition.
    pub async fn run(
        &self,
        mut invocation: ToolInvocation,
        raw_input: &str,
        updates: &mpsc::UnboundedSender<InvocationUpdate>,
        cancel: &CancellationToken,
    ) -> ToolInvocation {
        let tool_name = invocation.tool_name.clone();
        let tool_call_id = invocation.tool_call_id.clone();

        let tool = match self.registry.resolve(&tool_name) {
            Ok(tool) => tool,
            Err(err) => {
                let parsed = parse_tool_input(raw_input).ok();
                fail(&mut invocation, parsed, &err, updates);
                return invocation;
            }
        };

        let schema = &tool.parameters().schema;
        let mut input = match parse_tool_input(raw_input) {
            Ok(input) => input,
            Err(message) => {
                let err = ParleyError::SchemaValidation {
                    tool_name: tool_name.clone(),
                    message,
                };
                fail(&mut invocation, None, &err, updates);
                return invocation;
            }
        };
        apply_defaults(&mut input, schema);
        if let Err(message) = validate_arguments(&input, schema) {
            let err = ParleyError::SchemaValidation {
                tool_name: tool_name.clone(),
                message,
            };
            fail(&mut invocation, Some(input), &err, updates);
            return invocation;
        }

        transition(
            &mut invocation,
            ToolInvocationState::InputAvailable {
                input: input.clone(),
            },
            updates,
        );

        let approval = if tool.requires_approval() {
            let ticket = self.approvals.open(&tool_call_id);
            let pending = ApprovalRecord::pending(ticket.id());
            transition(
                &mut invocation,
                ToolInvocationState::ApprovalPending {
                    input: input.clone(),
                    approval: pending.clone(),
                },
                updates,
            );

            let decision = ticket.wait(self.approval_timeout, cancel).await;
            let record = pending.decided(decision.approved, decision.reason);
            if !decision.approved {
                transition(
                    &mut invocation,
                    ToolInvocationState::Rejected {
                        input,
                        approval: record,
                    },
                    updates,
                );
                return invocation;
            }
            Some(record)
        } else {
            None
        };

        transition(
            &mut invocation,
            ToolInvocationState::Executing {
                input: input.clone(),
                approval: approval.clone(),
            },
            updates,
        );

        let result = if tool.has_executor() {
            let ctx = ToolExecutionContext {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                approval: approval.clone(),
            };
            let args = ToolArguments::new(input.clone());
            let tool = tool.clone();
            debug!(tool = %tool_name, call_id = %tool_call_id, "executing tool");

            let mut handle = tokio::spawn(async move { tool.execute(&args, &ctx).await });
            let joined = tokio::select! {
                _ = cancel.cancelled() => None,
                joined = tokio::time::timeout(self.tool_timeout, &mut handle) => Some(joined),
            };
            match joined {
                Some(Ok(Ok(result))) => result,
                Some(Ok(Err(join_err))) => Err(ParleyError::tool(
                    &tool_name,
                    format!("tool task failed: {join_err}"),
                )),
                Some(Err(_elapsed)) => {
                    handle.abort();
                    Err(ParleyError::Timeout(self.tool_timeout.as_millis() as u64))
                }
                None => {
                    handle.abort();
                    Err(ParleyError::tool(&tool_name, "request was canceled"))
                }
            }
        } else {
            Ok(decision_output(approval.as_ref()))
        };

        match result {
            Ok(output) => {
                debug!(tool = %tool_name, call_id = %tool_call_id, "tool finished");
                transition(
                    &mut invocation,
                    ToolInvocationState::OutputAvailable {
                        input,
                        output,
                        approval,
                    },
                    updates,
                );
            }
            Err(err) => {
                warn!(tool = %tool_name, call_id = %tool_call_id, error = %err, "tool failed");
                transition(
                    &mut invocation,
                    ToolInvocationState::OutputError {
                        input: Some(input),
                        error_text: error_text(&err),
                        approval,
                    },
                    updates,
                );
            }
        }
        invocation
    }
}

impl std::fmt::Debug for InvocationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationRunner")
            .field("registry", &self.registry)
            .field("tool_timeout", &self.tool_timeout)
            .field("approval_timeout", &self.approval_timeout)
            .finish()
    }
}

/// Output of a tool that is resolved by the approval decision alone.
fn decision_output(approval: Option<&ApprovalRecord>) -> Value {
    let mut output = json!({ "approved": approval.and_then(|a| a.approved).unwrap_or(false) });
    if let Some(reason) = approval.and_then(|a| a.reason.clone()) {
        output["reason"] = json!(reason);
    }
    output
}

fn error_text(err: &ParleyError) -> String {
    match err {
        ParleyError::ToolExecution { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn fail(
    invocation: &mut ToolInvocation,
    input: Option<Value>,
    err: &ParleyError,
    updates: &mpsc::UnboundedSender<InvocationUpdate>,
) {
    warn!(
        tool = %invocation.tool_name,
        call_id = %invocation.tool_call_id,
        error = %err,
        "tool call rejected before execution"
    );
    transition(
        invocation,
        ToolInvocationState::OutputError {
            input,
            error_text: error_text(err),
            approval: None,
        },
        updates,
    );
}

fn transition(
    invocation: &mut ToolInvocation,
    next: ToolInvocationState,
    updates: &mpsc::UnboundedSender<InvocationUpdate>,
) {
    if let Err(err) = invocation.advance(next) {
        warn!(error = %err, "dropping illegal tool state transition");
        return;
    }
    // The receiver is gone once the turn is over; the state is still final.
    let _ = updates.send(InvocationUpdate {
        tool_call_id: invocation.tool_call_id.clone(),
        tool_name: invocation.tool_name.clone(),
        state: invocation.state.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::approval::ApprovalDecision;
    use crate::invocation::state::ToolStateKind;
    use crate::tools::tool::AgentTool;
    use crate::tools::types::ToolParameters;

    fn registry() -> Arc<ToolRegistry> {
        let echo = AgentTool::new(
            "echo",
            "Echo the text back",
            ToolParameters::object().string("text", "Text", true).build(),
            |args, _ctx| async move { Ok(json!({ "echo": args.get_str("text")? })) },
        );
        let boom = AgentTool::new(
            "boom",
            "Always fails",
            ToolParameters::object().build(),
            |_args, _ctx| async move {
                Err::<Value, _>(ParleyError::tool("boom", "kaboom"))
            },
        );
        let slow = AgentTool::new(
            "slow",
            "Never finishes in time",
            ToolParameters::object().build(),
            |_args, _ctx| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            },
        );
        let guarded = AgentTool::new(
            "guarded",
            "Needs approval",
            ToolParameters::object().build(),
            |_args, ctx| async move { Ok(json!({ "approvedBy": ctx.approval.map(|a| a.id) })) },
        )
        .with_approval();
        Arc::new(
            ToolRegistry::builder()
                .with(Arc::new(echo))
                .unwrap()
                .with(Arc::new(boom))
                .unwrap()
                .with(Arc::new(slow))
                .unwrap()
                .with(Arc::new(guarded))
                .unwrap()
                .build(),
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<InvocationUpdate>) -> Vec<ToolStateKind> {
        let mut kinds = Vec::new();
        while let Ok(update) = rx.try_recv() {
            kinds.push(update.state.kind());
        }
        kinds
    }

    #[tokio::test]
    async fn successful_execution_reports_each_state() {
        let runner = InvocationRunner::new(registry(), ApprovalBroker::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inv = runner
            .run(
                ToolInvocation::new("c1", "echo"),
                r#"{"text":"hi"}"#,
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(inv.state.output().unwrap()["echo"], "hi");
        assert_eq!(
            drain(&mut rx),
            vec![
                ToolStateKind::InputAvailable,
                ToolStateKind::Executing,
                ToolStateKind::OutputAvailable
            ]
        );
    }

    #[tokio::test]
    async fn schema_failure_skips_input_available() {
        let runner = InvocationRunner::new(registry(), ApprovalBroker::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inv = runner
            .run(
                ToolInvocation::new("c2", "echo"),
                r#"{"text":123}"#,
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(inv.kind(), ToolStateKind::OutputError);
        assert!(inv.state.error_text().unwrap().contains("field 'text'"));
        assert_eq!(drain(&mut rx), vec![ToolStateKind::OutputError]);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_output_error() {
        let runner = InvocationRunner::new(registry(), ApprovalBroker::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let inv = runner
            .run(
                ToolInvocation::new("c3", "teleport"),
                "{}",
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert!(inv.state.error_text().unwrap().contains("Unknown tool: teleport"));
    }

    #[tokio::test]
    async fn execution_failure_is_captured() {
        let runner = InvocationRunner::new(registry(), ApprovalBroker::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let inv = runner
            .run(
                ToolInvocation::new("c4", "boom"),
                "",
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(inv.state.error_text(), Some("kaboom"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tools_time_out() {
        let runner = InvocationRunner::new(registry(), ApprovalBroker::new())
            .with_tool_timeout(Duration::from_millis(100));
        let (tx, _rx) = mpsc::unbounded_channel();
        let inv = runner
            .run(
                ToolInvocation::new("c5", "slow"),
                "{}",
                &tx,
                &CancellationToken::new(),
            )
            .await;

        assert!(inv.state.error_text().unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn approved_invocation_executes_after_gate() {
        let approvals = ApprovalBroker::new();
        let runner = InvocationRunner::new(registry(), approvals.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = runner.spawn(
            ToolInvocation::new("c6", "guarded"),
            "{}".into(),
            tx,
            CancellationToken::new(),
        );

        let _ = rx.recv().await.unwrap(); // input-available
        let pending = rx.recv().await.unwrap();
        let approval_id = pending.state.approval().unwrap().id.clone();
        approvals
            .resolve(&approval_id, ApprovalDecision::approve())
            .unwrap();

        let inv = handle.await.unwrap();
        assert_eq!(inv.kind(), ToolStateKind::OutputAvailable);
        assert_eq!(inv.state.output().unwrap()["approvedBy"], approval_id.as_str());
    }

    #[tokio::test]
    async fn denied_invocation_never_executes() {
        let approvals = ApprovalBroker::new();
        let runner = InvocationRunner::new(registry(), approvals.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = runner.spawn(
            ToolInvocation::new("c7", "guarded"),
            "{}".into(),
            tx,
            CancellationToken::new(),
        );

        let _ = rx.recv().await.unwrap();
        let pending = rx.recv().await.unwrap();
        let approval_id = pending.state.approval().unwrap().id.clone();
        approvals.resolve(&approval_id, ApprovalDecision::deny("no thanks"));

        let inv = handle.await.unwrap();
        assert_eq!(inv.kind(), ToolStateKind::Rejected);
        assert!(inv.state.output().is_none());
        assert_eq!(
            inv.state.approval().unwrap().reason.as_deref(),
            Some("no thanks")
        );
    }
}
