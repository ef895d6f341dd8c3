use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// A chat completion body.
///
/// The same shape is used for a non-streaming response and for each
/// streamed chunk; streamed chunks carry their fragments in `delta`, while
/// non-streaming responses may use `message` instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Unique identifier of the completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that produced the completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Creation time as seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    /// The generated choices; only the first one is used.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub choices: Vec<Choice>,

    /// Token accounting, when the provider reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// An error reported in-band by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

impl ChatCompletion {
    /// Returns the creation time, if present and representable.
    pub fn created_at(&self) -> Option<OffsetDateTime> {
        self.created
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
    }

    /// Returns the first choice.
    pub fn first_choice(&self) -> Option<&Choice> {
        self.choices.first()
    }

    /// Returns the content of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.first_choice()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
    }

    /// Returns the reasoning of the first choice.
    pub fn reasoning(&self) -> Option<&str> {
        self.first_choice()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.reasoning.as_deref())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Choice>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Choice>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One choice of a completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position of the choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,

    /// The text produced for this choice.
    #[serde(default, alias = "message", skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,

    /// Why generation stopped; `None` while the choice is still streaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Text fragments carried by one choice.
///
/// Absent fields mean "no update" and are kept distinct from empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// The author role; providers usually send it only on the first chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Visible answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Reasoning ("thinking") text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Reasons why the model stopped generating.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the turn or a stop sequence.
    Stop,

    /// The token limit was reached.
    Length,

    /// Output was withheld by a content filter.
    ContentFilter,

    /// The model requested a tool call.
    ToolCalls,

    /// The provider aborted generation.
    Error,

    /// A reason this client does not know about.
    #[serde(other)]
    Other,
}

/// Token accounting for a completion.
///
/// Providers send partial accounting on some chunks and `null` counters on
/// others; a missing or null counter is `None`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,

    /// Tokens generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,

    /// Sum of prompt and completion tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// An error object embedded in a response body or stream chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderError {
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Provider error code; numeric or textual depending on the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,

    /// Provider error type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ProviderError {
    /// Returns the description, if the provider sent a non-empty one.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Returns the error code rendered as text.
    pub fn code_string(&self) -> Option<String> {
        match self.code.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
