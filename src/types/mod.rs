//! Core types for Parley.

pub mod generation;
pub mod message;
pub mod stream;
pub mod ui;
pub mod usage;

pub use generation::*;
pub use message::*;
pub use stream::*;
pub use ui::*;
pub use usage::*;
