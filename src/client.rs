use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::chat::ChatConfig;
use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::session::StreamSession;
use crate::types::{ChatCompletion, CompletionRequest};

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1";
const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Something that can open a streaming completion.
///
/// [`CompletionClient`] is the production implementation; the conversation
/// orchestrator is generic over this trait so it can be driven without a
/// network.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Open a streaming completion for `request`.
    async fn stream(&self, request: CompletionRequest) -> Result<StreamSession>;
}

/// Client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct CompletionClient {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl CompletionClient {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the
    /// OPENROUTER_API_KEY environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None, Some(DEFAULT_READ_TIMEOUT))
    }

    /// Create a new client with custom settings.
    ///
    /// `read_timeout` bounds the wait for each chunk of a stream and the
    /// whole body of a non-streaming call; `None` waits indefinitely.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(
                    "API key not provided and OPENROUTER_API_KEY environment variable not set",
                )
            })?,
        };
        if api_key.trim().is_empty() {
            return Err(Error::authentication("API key is empty"));
        }

        let base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url::Url::parse(&base_url)
            .map_err(|e| Error::url(format!("invalid base URL {base_url:?}: {e}"), Some(e)))?;

        // No overall request timeout: a healthy stream may run for minutes.
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            connect_timeout,
            read_timeout,
            logger: None,
        })
    }

    /// Create a client from a resolved chat configuration.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::with_options(
            config.api_key.clone(),
            Some(config.base_url.clone()),
            Some(config.connect_timeout),
            config.read_timeout,
        )
    }

    /// Attach a logger that sees every request, response and stream delta.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the idle read timeout for streams.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            code: Option<Value>,
            message: Option<String>,
            param: Option<String>,
        }

        // Reading the body to the end releases the connection.
        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let error_type = detail.as_ref().and_then(|e| {
            e.error_type.clone().or_else(|| match &e.code {
                Some(Value::String(code)) => Some(code.clone()),
                Some(Value::Number(code)) => Some(code.to_string()),
                _ => None,
            })
        });
        let error_message = detail
            .as_ref()
            .and_then(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if error_body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    error_body.clone()
                }
            });
        let error_param = detail.as_ref().and_then(|e| e.param.clone());

        match status_code {
            400 => Error::bad_request(error_message, error_param),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message, request_id),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_type, error_message, request_id),
        }
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.connect_timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// POST `request` and return the response once its status is known.
    ///
    /// Any failure drops the partial response before returning.
    async fn post(&self, request: &CompletionRequest, accept: &'static str) -> Result<Response> {
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }

        let mut headers = self.default_headers()?;
        headers.insert(header::ACCEPT, HeaderValue::from_static(accept));

        let mut builder = self
            .client
            .post(self.completions_url())
            .headers(headers)
            .json(request);
        if !request.stream {
            if let Some(timeout) = self.read_timeout {
                builder = builder.timeout(self.connect_timeout + timeout);
            }
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                CLIENT_REQUEST_ERRORS.click();
                let err = self.request_error(e);
                tracing::warn!(error = %err, model = %request.model, "completion request failed");
                return Err(err);
            }
        };

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, model = %request.model, "completion request rejected");
            return Err(err);
        }
        Ok(response)
    }

    /// Send a request and wait for the complete, non-streaming response.
    pub async fn send(&self, request: CompletionRequest) -> Result<ChatCompletion> {
        let request = request.with_stream(false);
        let start = Instant::now();
        let response = self.post(&request, "application/json").await?;
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let completion = response.json::<ChatCompletion>().await.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            if e.is_timeout() {
                Error::timeout(
                    format!("Timed out reading response: {}", e),
                    self.read_timeout.map(|d| d.as_secs_f64()),
                )
            } else {
                Error::serialization(
                    format!("Failed to parse response: {}", e),
                    Some(Box::new(e)),
                )
            }
        })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if let Some(logger) = &self.logger {
            logger.log_response(&completion);
        }
        if let Some(error) = &completion.error {
            CLIENT_REQUEST_ERRORS.click();
            let status_code = error
                .code
                .as_ref()
                .and_then(Value::as_u64)
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or(200);
            return Err(Error::api(
                status_code,
                error.error_type.clone(),
                error
                    .message()
                    .unwrap_or("provider reported an error")
                    .to_string(),
                request_id,
            ));
        }
        tracing::debug!(model = %request.model, id = ?completion.id, "completion received");
        Ok(completion)
    }

    /// Send a request and return a session over the streamed response.
    ///
    /// The returned [`StreamSession`] owns the connection; it is released
    /// when the session ends, is closed, or is dropped.
    pub async fn stream(&self, request: CompletionRequest) -> Result<StreamSession> {
        let request = request.with_stream(true);
        let start = Instant::now();
        let response = self.post(&request, "text/event-stream").await?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        tracing::debug!(model = %request.model, status = %response.status(), "stream opened");

        Ok(StreamSession::from_response(response)
            .with_read_timeout(self.read_timeout)
            .with_logger(self.logger.clone()))
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn stream(&self, request: CompletionRequest) -> Result<StreamSession> {
        CompletionClient::stream(self, request).await
    }
}

impl fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionClient")
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}
