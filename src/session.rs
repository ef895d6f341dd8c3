//! A cancellable session over one streaming completion.
//!
//! [`StreamSession`] exclusively owns the body of a streaming response.  It
//! pulls chunks through the SSE decoder, turns each payload into a
//! [`StreamDelta`] and hands deltas to the caller in arrival order.  The
//! session leaves `Active` through exhaustion, cancellation or failure and
//! releases the connection exactly once on the way out, including when it is
//! simply dropped.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::client_logger::ClientLogger;
use crate::delta::parse_delta;
use crate::error::{Error, Result};
use crate::observability::{
    STREAM_CANCELLED, STREAM_DELTAS, STREAM_DURATION, STREAM_ERRORS, STREAM_MALFORMED_FRAMES,
    STREAM_OPENED, STREAM_TTFB,
};
use crate::sse::{SseEvent, sse_events};
use crate::types::StreamDelta;

type EventStream = Pin<Box<dyn Stream<Item = Result<SseEvent>> + Send>>;

/// Lifecycle of a [`StreamSession`].
///
/// `Exhausted`, `Cancelled` and `Failed` are terminal; a session in a
/// terminal state has released its connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// The session wraps an open response but has not been read yet.
    Created,

    /// Deltas are being read.
    Active,

    /// The server sent `[DONE]` or closed the stream.
    Exhausted,

    /// The consumer stopped the session.
    Cancelled,

    /// A transport error, read timeout, or provider error ended the session.
    Failed,
}

impl SessionState {
    /// Returns true for the three terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Exhausted | SessionState::Cancelled | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::Active => write!(f, "active"),
            SessionState::Exhausted => write!(f, "exhausted"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Cancels a [`StreamSession`] from another task or thread.
///
/// Cancelling aborts a read that is in flight; the session then reports
/// [`SessionState::Cancelled`] and releases its connection.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a handle that is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.  Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

enum Pulled {
    Cancelled,
    TimedOut,
    Next(Option<Result<SseEvent>>),
}

/// The cancellable, lazy sequence of deltas for one in-flight request.
pub struct StreamSession {
    events: Option<EventStream>,
    state: SessionState,
    closed: bool,
    cancel: CancelHandle,
    read_timeout: Option<Duration>,
    logger: Option<Arc<dyn ClientLogger>>,
    started: Instant,
    deltas: u64,
    malformed_frames: u64,
}

impl StreamSession {
    /// Wrap a raw byte stream, typically the body of a streaming response.
    pub fn new<S, B, E>(byte_stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        STREAM_OPENED.click();
        Self {
            events: Some(Box::pin(sse_events(byte_stream))),
            state: SessionState::Created,
            closed: false,
            cancel: CancelHandle::new(),
            read_timeout: None,
            logger: None,
            started: Instant::now(),
            deltas: 0,
            malformed_frames: 0,
        }
    }

    /// Wrap the body of a successful streaming response.
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(response.bytes_stream())
    }

    /// Fail the session when no chunk arrives within `timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Report deltas and the closing state to `logger`.
    pub fn with_logger(mut self, logger: Option<Arc<dyn ClientLogger>>) -> Self {
        self.logger = logger;
        self
    }

    /// Use an externally created cancel handle.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns a handle that cancels this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true once the connection has been released.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of deltas delivered so far.
    pub fn deltas_delivered(&self) -> u64 {
        self.deltas
    }

    /// Number of frames skipped because they could not be decoded.
    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames
    }

    /// Wait for the next delta.
    ///
    /// Returns `None` once the stream is exhausted or cancelled.  A failure
    /// is returned exactly once, after the connection has been released;
    /// later calls return `None`.  Frames that fail to decode are skipped.
    pub async fn next_delta(&mut self) -> Option<Result<StreamDelta>> {
        if self.state.is_terminal() || self.closed {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.finish(SessionState::Cancelled);
            return None;
        }
        self.state = SessionState::Active;

        loop {
            let pulled = {
                let events = self.events.as_mut()?;
                let token = &self.cancel.token;
                let read_timeout = self.read_timeout;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Pulled::Cancelled,
                    next = read_next(events, read_timeout) => match next {
                        Some(next) => Pulled::Next(next),
                        None => Pulled::TimedOut,
                    },
                }
            };

            let payload = match pulled {
                Pulled::Cancelled => {
                    self.finish(SessionState::Cancelled);
                    return None;
                }
                Pulled::TimedOut => {
                    let secs = self.read_timeout.map(|d| d.as_secs_f64());
                    let err = Error::timeout("no data received from the stream", secs);
                    return Some(Err(self.fail(err)));
                }
                Pulled::Next(None) | Pulled::Next(Some(Ok(SseEvent::Done))) => {
                    self.finish(SessionState::Exhausted);
                    return None;
                }
                Pulled::Next(Some(Err(err))) => {
                    return Some(Err(self.fail(err)));
                }
                Pulled::Next(Some(Ok(SseEvent::Data(payload)))) => payload,
            };

            let delta = match parse_delta(&payload) {
                Ok(Some(delta)) => delta,
                Ok(None) => continue,
                Err(err) => {
                    self.malformed_frames += 1;
                    STREAM_MALFORMED_FRAMES.click();
                    tracing::warn!(error = %err, "skipping malformed stream frame");
                    continue;
                }
            };

            if let Some(message) = &delta.error {
                let err = Error::streaming(format!("provider error: {message}"), None);
                return Some(Err(self.fail(err)));
            }

            if self.deltas == 0 {
                STREAM_TTFB.add(self.started.elapsed().as_secs_f64());
            }
            self.deltas += 1;
            STREAM_DELTAS.click();
            if let Some(logger) = &self.logger {
                logger.log_stream_delta(&delta);
            }
            return Some(Ok(delta));
        }
    }

    /// Stop the session and release the connection.
    ///
    /// A read that is in flight on another task is abandoned.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.close();
    }

    /// Release the connection.
    ///
    /// Closing a session that has not reached a terminal state cancels it.
    /// Closing is idempotent: only the first call has any effect.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Cancelled;
        }
        self.release();
    }

    /// Adapt the session into a [`Stream`] of deltas.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamDelta>> + Send {
        stream::unfold(self, |mut session| async move {
            let item = session.next_delta().await?;
            Some((item, session))
        })
        .fuse()
    }

    fn fail(&mut self, err: Error) -> Error {
        STREAM_ERRORS.click();
        tracing::warn!(error = %err, deltas = self.deltas, "stream session failed");
        self.finish(SessionState::Failed);
        err
    }

    fn finish(&mut self, state: SessionState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
        self.release();
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Dropping the event stream drops the response body and with it the connection.
        self.events = None;
        STREAM_DURATION.add(self.started.elapsed().as_secs_f64());
        if self.state == SessionState::Cancelled {
            STREAM_CANCELLED.click();
        }
        tracing::debug!(
            state = %self.state,
            deltas = self.deltas,
            malformed_frames = self.malformed_frames,
            "stream session closed"
        );
        if let Some(logger) = &self.logger {
            logger.log_stream_closed(self.state);
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("state", &self.state)
            .field("closed", &self.closed)
            .field("read_timeout", &self.read_timeout)
            .field("deltas", &self.deltas)
            .field("malformed_frames", &self.malformed_frames)
            .finish()
    }
}

/// Read the next event, or `None` if the timeout elapsed first.
async fn read_next(
    events: &mut EventStream,
    read_timeout: Option<Duration>,
) -> Option<Option<Result<SseEvent>>> {
    match read_timeout {
        Some(timeout) => tokio::time::timeout(timeout, events.next()).await.ok(),
        None => Some(events.next().await),
    }
}
