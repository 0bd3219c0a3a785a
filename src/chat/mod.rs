//! Chat request handling: parsing, history conversion, orchestration.

pub mod convert;
pub mod orchestrator;
pub mod request;

pub use convert::to_model_messages;
pub use orchestrator::{ChatOrchestrator, FeatureFlags, OrchestratorSettings, SYSTEM_PROMPT};
pub use request::{absorb_attachments, Attachment, ChatRequest};
