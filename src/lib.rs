//! Parley — streaming chat back-end with tool calling.
//!
//! A conversation comes in as a list of [`types::UiMessage`]s; the
//! [`chat::ChatOrchestrator`] validates it, asks the model provider for a
//! streamed reply, runs any tool calls through the invocation state machine
//! (pausing for human approval where a tool requires it), and hands back an
//! ordered stream of [`protocol::UiChunk`] frames. A client folds those
//! frames back into a message with [`protocol::MessageAssembler`].
//!
//! # Quick Start
//!
//! ```no_run
//! use parley::prelude::*;
//!
//! # async fn example() -> parley::error::Result<()> {
//! let config = ParleyConfig::from_env();
//! let state = parley::server::AppState::from_config(&config)?;
//! let history = vec![UiMessage::user_text("m1", "What's the weather in Paris?")];
//! let mut frames = state
//!     .orchestrator
//!     .handle(&history, None, FeatureFlags::default())?;
//! while let Some(frame) = futures::StreamExt::next(&mut frames).await {
//!     println!("{}", serde_json::to_string(&frame)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod invocation;
pub mod models;
pub mod prelude;
pub mod protocol;
pub mod provider;
pub mod services;
pub mod stream;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
