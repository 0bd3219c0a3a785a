//! Tool invocation lifecycle: states, the approval gate, and the runner.

pub mod approval;
pub mod runner;
pub mod state;

pub use approval::{ApprovalBroker, ApprovalDecision, ApprovalTicket};
pub use runner::{InvocationRunner, InvocationUpdate};
pub use state::{ApprovalRecord, ToolInvocation, ToolInvocationState, ToolStateKind};
