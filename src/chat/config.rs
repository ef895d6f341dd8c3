//! Configuration types for the chat application.
//!
//! Settings are layered from lowest to highest precedence: built-in defaults,
//! an optional YAML file, environment variables, then command-line arguments
//! parsed with `arrrg`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::Model;

/// Default endpoint for OpenAI-compatible chat completions.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "OPENROUTER_BASE_URL";

/// Environment variable overriding the model.
pub const MODEL_ENV: &str = "THREADCHAT_MODEL";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Command-line arguments for the threadchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: deepseek/deepseek-r1)", "MODEL")]
    pub model: Option<String>,

    /// Base URL of the completion endpoint.
    #[arrrg(optional, "Base URL (default: https://openrouter.ai/api/v1)", "URL")]
    pub base_url: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "Path to a YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: provider limit)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Idle read timeout for streams, in seconds.
    #[arrrg(optional, "Seconds to wait for stream data; 0 disables (default: 120)", "SECS")]
    pub read_timeout: Option<u64>,

    /// Path to persist transcripts automatically after each turn.
    #[arrrg(optional, "Save the transcript here after every turn", "PATH")]
    pub transcript: Option<String>,

    /// Do not request the reasoning channel.
    #[arrrg(flag, "Do not request reasoning from the model")]
    pub no_reasoning: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// The subset of settings that may be given in a YAML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    include_reasoning: Option<bool>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
    connect_timeout_secs: Option<u64>,
    read_timeout_secs: Option<u64>,
    use_color: Option<bool>,
    transcript_path: Option<PathBuf>,
}

/// Configuration for a chat application.
///
/// This struct holds the resolved configuration values after every source
/// has been applied.
#[derive(Clone, PartialEq)]
pub struct ChatConfig {
    /// Bearer token for the completion endpoint.
    pub api_key: Option<String>,

    /// Base URL; `/chat/completions` is appended to it.
    pub base_url: String,

    /// The model to use for generating responses.
    pub model: Model,

    /// Whether to ask the provider for the reasoning channel.
    pub include_reasoning: bool,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Optional top-p nucleus sampling value.
    pub top_p: Option<f32>,

    /// Optional maximum tokens per response.
    pub max_tokens: Option<u32>,

    /// Time allowed for establishing a connection.
    pub connect_timeout: Duration,

    /// Time allowed between two chunks of a stream; `None` waits forever.
    pub read_timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Path to persist transcripts automatically after each turn.
    pub transcript_path: Option<PathBuf>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: deepseek/deepseek-r1
    /// - Base URL: https://openrouter.ai/api/v1
    /// - Reasoning: requested
    /// - Connect timeout: 30 s; read timeout: 120 s
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: Model::default(),
            include_reasoning: true,
            temperature: None,
            top_p: None,
            max_tokens: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            use_color: true,
            transcript_path: None,
        }
    }

    /// Resolve the configuration from every source.
    ///
    /// `env` looks up an environment variable by name.
    pub fn resolve(args: ChatArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::new(),
        };
        config.apply_env(env);
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file on top of the defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::io(format!("failed to read config {}", path.display()), e)
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load a configuration from YAML text on top of the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = if text.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(text)?
        };
        let mut config = Self::new();
        if file.api_key.is_some() {
            config.api_key = file.api_key;
        }
        if let Some(base_url) = file.base_url {
            config.base_url = base_url;
        }
        if let Some(model) = file.model {
            config.model = Model::from(model);
        }
        if let Some(include_reasoning) = file.include_reasoning {
            config.include_reasoning = include_reasoning;
        }
        config.temperature = file.temperature;
        config.top_p = file.top_p;
        config.max_tokens = file.max_tokens;
        if let Some(secs) = file.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.read_timeout_secs {
            config.read_timeout = read_timeout_from_secs(secs);
        }
        if let Some(use_color) = file.use_color {
            config.use_color = use_color;
        }
        config.transcript_path = file.transcript_path;
        Ok(config)
    }

    /// Override settings from environment variables.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            self.base_url = base_url;
        }
        if let Some(model) = non_empty(MODEL_ENV) {
            self.model = Model::from(model);
        }
    }

    /// Override settings from command-line arguments.
    pub fn apply_args(&mut self, args: ChatArgs) {
        if let Some(model) = args.model {
            self.model = Model::from(model);
        }
        if let Some(base_url) = args.base_url {
            self.base_url = base_url;
        }
        if args.max_tokens.is_some() {
            self.max_tokens = args.max_tokens;
        }
        if let Some(secs) = args.read_timeout {
            self.read_timeout = read_timeout_from_secs(secs);
        }
        if let Some(path) = args.transcript {
            self.transcript_path = Some(PathBuf::from(path));
        }
        if args.no_reasoning {
            self.include_reasoning = false;
        }
        if args.no_color {
            self.use_color = false;
        }
    }

    /// Check that the base URL is an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::url(format!("invalid base URL {:?}: {e}", self.base_url), Some(e)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(Error::validation(
                format!("unsupported URL scheme {scheme:?} in base URL"),
                Some("base_url".to_string()),
            )),
        }
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<Model>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets whether the reasoning channel is requested.
    pub fn with_include_reasoning(mut self, include_reasoning: bool) -> Self {
        self.include_reasoning = include_reasoning;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the top-p value.
    pub fn with_top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle read timeout for streams.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the transcript auto-save path.
    pub fn with_transcript_path(mut self, path: Option<PathBuf>) -> Self {
        self.transcript_path = path;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("include_reasoning", &self.include_reasoning)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("use_color", &self.use_color)
            .field("transcript_path", &self.transcript_path)
            .finish()
    }
}

fn read_timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
