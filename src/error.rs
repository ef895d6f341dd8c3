//! Error types for threadchat.
//!
//! Errors fall into three groups that follow the life of a request:
//!
//! - failures while establishing a stream (transport, timeouts and the
//!   status-classified rejections); see [`Error::is_connection_class`],
//! - failures after a stream started ([`Error::Streaming`], idle
//!   [`Error::Timeout`]) and per-frame decode failures
//!   ([`Error::MalformedFrame`], recovered inside the session),
//! - local failures: configuration, transcripts and rejected caller input.
//!
//! Cancellation is not an error; it is reported through
//! [`SessionState::Cancelled`](crate::SessionState::Cancelled) and
//! [`TurnOutcome::Cancelled`](crate::chat::TurnOutcome::Cancelled).

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

type Source = Arc<dyn error::Error + Send + Sync>;

/// The main error type for threadchat.
#[derive(Clone, Debug)]
pub enum Error {
    // Establishing the stream.
    /// The endpoint rejected the request with a status not covered below,
    /// or reported an error in the body of a successful response.
    Api {
        /// HTTP status code, or the provider's numeric code for in-body errors.
        status_code: u16,
        /// Error type or code reported by the provider.
        error_type: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Value of the `x-request-id` header.
        request_id: Option<String>,
    },

    /// 401: the API key is missing, empty or refused.
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// 403: the key may not use the requested model.
    Permission {
        /// Human-readable error message.
        message: String,
    },

    /// 404 (usually an unknown model), or an unknown thread name.
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// 429: too many requests.
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Seconds to wait, from the `retry-after` header.
        retry_after: Option<u64>,
    },

    /// 400: the provider refused the request body.
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Parameter the provider blamed.
        param: Option<String>,
    },

    /// No connection, no response, or no chunk arrived in time.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// The limit that elapsed, in seconds.
        duration: Option<f64>,
    },

    /// DNS, TCP or TLS failure before a response arrived.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// 500 from the endpoint.
    InternalServer {
        /// Human-readable error message.
        message: String,
        /// Value of the `x-request-id` header.
        request_id: Option<String>,
    },

    /// 502-504: the provider or its upstream is unavailable.
    ServiceUnavailable {
        /// Human-readable error message.
        message: String,
        /// Seconds to wait, from the `retry-after` header.
        retry_after: Option<u64>,
    },

    /// The HTTP client could not be built or the request could not be sent.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    // Inside the stream.
    /// The transport failed after the stream started, or the provider
    /// reported an error frame.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// One `data: ` payload could not be decoded.
    ///
    /// The stream session counts and skips these; they never end a session.
    MalformedFrame {
        /// Human-readable error message.
        message: String,
        /// The offending payload.
        payload: String,
    },

    // Local.
    /// JSON or YAML could not be read or written.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// A transcript or config file could not be read or written.
    Io {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Arc<io::Error>,
    },

    /// A base URL is not a usable http(s) URL.
    Url {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<url::ParseError>,
    },

    /// Caller input was refused: an empty question, a bad index, a busy
    /// orchestrator or an invalid setting.
    Validation {
        /// Human-readable error message.
        message: String,
        /// The offending parameter.
        param: Option<String>,
    },

    /// An internal invariant did not hold.
    Unknown {
        /// Human-readable error message.
        message: String,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(
        status_code: u16,
        error_type: Option<String>,
        message: String,
        request_id: Option<String>,
    ) -> Self {
        Error::Api {
            status_code,
            error_type,
            message,
            request_id,
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new internal server error.
    pub fn internal_server(message: impl Into<String>, request_id: Option<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
            request_id,
        }
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new malformed frame error.
    pub fn malformed_frame(message: impl Into<String>, payload: impl Into<String>) -> Self {
        Error::MalformedFrame {
            message: message.into(),
            payload: payload.into(),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown {
            message: message.into(),
        }
    }

    /// Returns true if the API key was refused.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if the endpoint asked the client to slow down.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Returns true if a connect, request or idle-read limit elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if the stream broke after it started.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Error::Streaming { .. })
    }

    /// Returns true for a payload that could not be decoded.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(self, Error::MalformedFrame { .. })
    }

    /// Returns true if caller input was refused.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if this error prevented a stream from being established.
    ///
    /// These are the failures raised by the completion client before a
    /// session takes ownership of the connection.
    pub fn is_connection_class(&self) -> bool {
        matches!(
            self,
            Error::Api { .. }
                | Error::Authentication { .. }
                | Error::Permission { .. }
                | Error::NotFound { .. }
                | Error::RateLimit { .. }
                | Error::BadRequest { .. }
                | Error::Timeout { .. }
                | Error::Connection { .. }
                | Error::InternalServer { .. }
                | Error::ServiceUnavailable { .. }
                | Error::HttpClient { .. }
        )
    }

    /// Returns the `x-request-id` the endpoint attached, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Api { request_id, .. } | Error::InternalServer { request_id, .. } => {
                request_id.as_deref()
            }
            _ => None,
        }
    }

    /// Returns the status code of an [`Error::Api`].
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns how long the endpoint asked the client to wait, in seconds.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimit { retry_after, .. } | Error::ServiceUnavailable { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                message,
                error_type,
                ..
            } => match error_type {
                Some(error_type) => write!(f, "{error_type}: {message}")?,
                None => write!(f, "API error: {message}")?,
            },
            Error::Authentication { message } => write!(f, "Authentication error: {message}")?,
            Error::Permission { message } => write!(f, "Permission error: {message}")?,
            Error::NotFound { message } => write!(f, "Not found: {message}")?,
            Error::RateLimit { message, .. } => write!(f, "Rate limit exceeded: {message}")?,
            Error::BadRequest { message, param } => {
                write!(f, "Bad request: {message}")?;
                if let Some(param) = param {
                    write!(f, " (parameter: {param})")?;
                }
            }
            Error::Timeout { message, duration } => {
                write!(f, "Timeout error: {message}")?;
                if let Some(duration) = duration {
                    write!(f, " ({duration} seconds)")?;
                }
            }
            Error::Connection { message, .. } => write!(f, "Connection error: {message}")?,
            Error::InternalServer { message, .. } => {
                write!(f, "Internal server error: {message}")?
            }
            Error::ServiceUnavailable { message, .. } => {
                write!(f, "Service unavailable: {message}")?
            }
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}")?,
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}")?,
            Error::MalformedFrame { message, .. } => write!(f, "Malformed frame: {message}")?,
            Error::Serialization { message, .. } => write!(f, "Serialization error: {message}")?,
            Error::Io { message, .. } => write!(f, "I/O error: {message}")?,
            Error::Url { message, .. } => write!(f, "URL error: {message}")?,
            Error::Validation { message, param } => {
                write!(f, "Validation error: {message}")?;
                if let Some(param) = param {
                    write!(f, " (parameter: {param})")?;
                }
            }
            Error::Unknown { message } => write!(f, "Unknown error: {message}")?,
        }
        if let Some(retry_after) = self.retry_after() {
            write!(f, " (retry after {retry_after} seconds)")?;
        }
        if let Some(request_id) = self.request_id() {
            write!(f, " (Request ID: {request_id})")?;
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for threadchat operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_class_excludes_stream_errors() {
        assert!(Error::connection("refused", None).is_connection_class());
        assert!(Error::authentication("bad key").is_connection_class());
        assert!(Error::timeout("connect", Some(30.0)).is_connection_class());
        assert!(!Error::streaming("reset", None).is_connection_class());
        assert!(!Error::malformed_frame("bad json", "{").is_connection_class());
        assert!(!Error::validation("empty", None).is_connection_class());
    }

    #[test]
    fn display_includes_request_id() {
        let err = Error::api(
            418,
            Some("teapot".to_string()),
            "short and stout".to_string(),
            Some("req_1".to_string()),
        );
        assert_eq!(err.to_string(), "teapot: short and stout (Request ID: req_1)");
        assert_eq!(err.status_code(), Some(418));
        assert_eq!(err.request_id(), Some("req_1"));
    }

    #[test]
    fn display_includes_retry_after() {
        let err = Error::rate_limit("slow down", Some(7));
        assert_eq!(err.retry_after(), Some(7));
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded: slow down (retry after 7 seconds)"
        );
        let err = Error::service_unavailable("overloaded", None);
        assert_eq!(err.to_string(), "Service unavailable: overloaded");
    }

    #[test]
    fn json_errors_convert_to_serialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
