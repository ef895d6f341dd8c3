use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Model, Role};

/// A message as sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,

    /// The text of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user chat message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant chat message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Request body for `POST {base_url}/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model that will complete the conversation.
    pub model: Model,

    /// The conversation so far, ending with the new user message.
    pub messages: Vec<ChatMessage>,

    /// Whether to stream the response as server-sent events.
    pub stream: bool,

    /// Whether the provider should return the reasoning channel.
    pub include_reasoning: bool,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Additional provider-specific options, flattened into the body.
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl CompletionRequest {
    /// Create a new streaming request that asks for reasoning.
    pub fn new(model: impl Into<Model>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            include_reasoning: true,
            temperature: None,
            top_p: None,
            max_tokens: None,
            extra: Map::new(),
        }
    }

    /// Sets whether the response is streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets whether reasoning is requested.
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

    /// Sets the maximum number of tokens.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Adds a provider-specific option.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;
    use serde_json::json;

    #[test]
    fn serializes_wire_shape() {
        let request = CompletionRequest::new(
            KnownModel::DeepSeekR1,
            vec![ChatMessage::user("Hello")],
        )
        .with_temperature(Some(0.5))
        .with_extra("transforms", json!(["middle-out"]));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "deepseek/deepseek-r1",
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true,
                "include_reasoning": true,
                "temperature": 0.5,
                "transforms": ["middle-out"],
            })
        );
    }

    #[test]
    fn optional_fields_are_omitted() {
        let request = CompletionRequest::new("openai/gpt-4o-mini", Vec::new())
            .with_stream(false)
            .with_include_reasoning(false);
        let value = serde_json::to_value(&request).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 4);
        assert_eq!(object["stream"], json!(false));
    }
}
