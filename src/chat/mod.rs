//! Chat application module for threaded, streaming conversations.
//!
//! This module provides the conversation layer built on top of the
//! completion client. It supports:
//!
//! - Streaming replies with separate reasoning and content channels
//! - Mid-stream cancellation from another task or a signal handler
//! - Editing, regenerating and deleting messages
//! - Multiple named threads backed by a pluggable store
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing and layered configuration
//!   ([`ChatArgs`], [`ChatConfig`])
//! - `store`: thread persistence and the current-thread context
//!   ([`ThreadStore`], [`Threads`])
//! - `orchestrator`: turn driving, cancellation and transcripts
//!   ([`Orchestrator`], [`Canceller`])
//! - `commands`: slash command parsing ([`parse_command`])

mod commands;
mod config;
mod orchestrator;
mod store;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{API_KEY_ENV, BASE_URL_ENV, ChatArgs, ChatConfig, DEFAULT_BASE_URL, MODEL_ENV};
pub use orchestrator::{Canceller, Orchestrator, TurnOutcome};
pub use store::{DEFAULT_THREAD, MemoryThreadStore, ThreadStore, Threads};
