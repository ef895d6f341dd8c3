/// One incremental update decoded from a stream frame.
///
/// A delta is consumed immediately by whoever drives the stream; only its
/// accumulated effect on a [`Message`](crate::types::Message) is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
    /// A fragment of the visible answer.
    pub content: Option<String>,

    /// A fragment of the reasoning channel.
    pub reasoning: Option<String>,

    /// True when the provider reported a finish reason.
    pub is_terminal: bool,

    /// An error reported in-band by the provider.
    pub error: Option<String>,
}

impl StreamDelta {
    /// A delta carrying only a content fragment.
    pub fn content(fragment: impl Into<String>) -> Self {
        Self {
            content: Some(fragment.into()),
            ..Self::default()
        }
    }

    /// A delta carrying only a reasoning fragment.
    pub fn reasoning(fragment: impl Into<String>) -> Self {
        Self {
            reasoning: Some(fragment.into()),
            ..Self::default()
        }
    }

    /// Returns true if the delta carries nothing worth delivering.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.reasoning.is_none()
            && !self.is_terminal
            && self.error.is_none()
    }

    /// Apply the fragments of this delta to a message.
    pub fn apply_to(&self, message: &mut crate::types::Message) {
        if let Some(reasoning) = &self.reasoning {
            message.push_reasoning(reasoning);
        }
        if let Some(content) = &self.content {
            message.push_content(content);
        }
    }
}
