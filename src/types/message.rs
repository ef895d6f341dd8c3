use serde::{Deserialize, Serialize};

/// Role of a message within a conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    User,

    /// Text generated by the model.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a conversation.
///
/// `content` holds the visible answer and `reasoning` holds the auxiliary
/// "thinking" channel.  Both are `None` until the first fragment for that
/// channel arrives, so an assistant placeholder starts out empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,

    /// The visible text of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// The reasoning text that accompanied the message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            reasoning: None,
        }
    }

    /// Create a new assistant message with the given content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            reasoning: None,
        }
    }

    /// Create an empty assistant message that will be filled while streaming.
    pub fn placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            reasoning: None,
        }
    }

    /// Returns the content, or the empty string if there is none.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Returns true if the message carries neither content nor reasoning.
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().is_none_or(str::is_empty)
            && self.reasoning.as_deref().is_none_or(str::is_empty)
    }

    /// Append a fragment to the content channel.
    pub fn push_content(&mut self, fragment: &str) {
        self.content.get_or_insert_with(String::new).push_str(fragment);
    }

    /// Append a fragment to the reasoning channel.
    pub fn push_reasoning(&mut self, fragment: &str) {
        self.reasoning
            .get_or_insert_with(String::new)
            .push_str(fragment);
    }
}
