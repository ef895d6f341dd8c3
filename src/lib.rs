//! Streaming chat client for OpenAI-compatible completion endpoints.
//!
//! The pipeline runs from bytes to conversation state:
//!
//! - [`sse`] splits a streamed body into `data: ` payloads,
//! - [`delta`] decodes each payload into a [`StreamDelta`],
//! - [`session`] owns one streaming response and yields deltas until it is
//!   exhausted, cancelled or fails,
//! - [`client`] opens sessions against `/chat/completions`,
//! - [`chat`] applies deltas to threaded conversations.

// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod delta;
pub mod error;
pub mod observability;
pub mod render;
pub mod session;
pub mod sse;
pub mod types;

// Re-exports
pub use client::{CompletionBackend, CompletionClient};
pub use client_logger::ClientLogger;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use session::{CancelHandle, SessionState, StreamSession};
pub use types::*;
