//! Approval gate: parks an invocation until an external decision arrives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// The human's answer to an approval request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

struct PendingApproval {
    tool_call_id: String,
    tx: oneshot::Sender<ApprovalDecision>,
}

/// Routes approval decisions to the invocation waiting for them.
///
/// Shared between the chat handler (which opens tickets) and the approval
/// endpoint (which resolves them).
#[derive(Default)]
pub struct ApprovalBroker {
    pending: Mutex<HashMap<String, PendingApproval>>,
}

impl ApprovalBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingApproval>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new pending approval for `tool_call_id`.
    pub fn open(self: &Arc<Self>, tool_call_id: &str) -> ApprovalTicket {
        let id = format!("approval_{}", Uuid::new_v4().simple());
        let (tx, rx) = oneshot::channel();
        self.lock().insert(
            id.clone(),
            PendingApproval {
                tool_call_id: tool_call_id.to_string(),
                tx,
            },
        );
        debug!(approval_id = %id, tool_call_id, "approval requested");
        ApprovalTicket {
            id,
            broker: Arc::clone(self),
            rx: Some(rx),
        }
    }

    /// Deliver a decision. Returns the tool call id it was for, or `None`
    /// when no such approval is pending.
    pub fn resolve(&self, approval_id: &str, decision: ApprovalDecision) -> Option<String> {
        let pending = self.lock().remove(approval_id)?;
        info!(
            approval_id,
            tool_call_id = %pending.tool_call_id,
            approved = decision.approved,
            "approval decided"
        );
        // The waiter may already have given up; the decision is then moot.
        let _ = pending.tx.send(decision);
        Some(pending.tool_call_id)
    }

    pub fn is_pending(&self, approval_id: &str) -> bool {
        self.lock().contains_key(approval_id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

impl std::fmt::Debug for ApprovalBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalBroker")
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// One outstanding approval. Dropping it withdraws the request.
pub struct ApprovalTicket {
    id: String,
    broker: Arc<ApprovalBroker>,
    rx: Option<oneshot::Receiver<ApprovalDecision>>,
}

impl ApprovalTicket {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the decision. Timing out, cancellation, or a withdrawn
    /// request all count as a denial.
    pub async fn wait(mut self, timeout: Duration, cancel: &CancellationToken) -> ApprovalDecision {
        let Some(rx) = self.rx.take() else {
            return ApprovalDecision::deny("approval already consumed");
        };
        tokio::select! {
            _ = cancel.cancelled() => ApprovalDecision::deny("request was canceled"),
            decided = tokio::time::timeout(timeout, rx) => match decided {
                Ok(Ok(decision)) => decision,
                Ok(Err(_)) => ApprovalDecision::deny("approval request was withdrawn"),
                Err(_) => ApprovalDecision::deny("approval timed out"),
            },
        }
    }
}

impl Drop for ApprovalTicket {
    fn drop(&mut self) {
        self.broker.lock().remove(&self.id);
    }
}
