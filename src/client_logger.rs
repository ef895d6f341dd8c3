//! Logging trait for completion client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log all API interactions passing through the
//! [`CompletionClient`](crate::CompletionClient).

use crate::session::SessionState;
use crate::types::{ChatCompletion, CompletionRequest, StreamDelta};

/// A trait for logging completion client operations.
///
/// Implement this trait to capture and record all API interactions,
/// including both non-streaming responses and individual streaming deltas.
///
/// # Example
///
/// ```rust,ignore
/// use threadchat::{ChatCompletion, ClientLogger, CompletionRequest, SessionState, StreamDelta};
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, request: &CompletionRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_response(&self, completion: &ChatCompletion) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", serde_json::to_string(completion).unwrap()).unwrap();
///     }
///
///     fn log_stream_delta(&self, delta: &StreamDelta) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Delta: {delta:?}").unwrap();
///     }
///
///     fn log_stream_closed(&self, state: SessionState) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Stream closed: {state}").unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log an outgoing request before it is sent.
    fn log_request(&self, request: &CompletionRequest) {
        _ = request;
    }

    /// Log a complete response from a non-streaming `send` call.
    fn log_response(&self, completion: &ChatCompletion);

    /// Log an individual delta delivered by a stream session.
    fn log_stream_delta(&self, delta: &StreamDelta);

    /// Log the terminal state a stream session reached when it closed.
    ///
    /// Called exactly once per session.
    fn log_stream_closed(&self, state: SessionState);
}
