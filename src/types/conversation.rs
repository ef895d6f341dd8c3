use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ChatMessage, Message, Role};

/// An ordered sequence of messages belonging to one thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the message at `index`.
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Returns the last message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the last message for in-place mutation.
    pub fn last_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut()
    }

    /// Returns the message at `index` for in-place mutation.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Message> {
        self.messages.get_mut(index)
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Keep the first `len` messages and discard the rest.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Remove the message at `index`.
    ///
    /// Removing a user message also removes the assistant reply that
    /// immediately follows it.  Returns the removed messages.
    pub fn remove(&mut self, index: usize) -> Result<Vec<Message>> {
        if index >= self.messages.len() {
            return Err(Error::validation(
                format!(
                    "message index {index} out of range for conversation of {}",
                    self.messages.len()
                ),
                Some("index".to_string()),
            ));
        }
        let paired = self.messages[index].role == Role::User
            && self
                .messages
                .get(index + 1)
                .is_some_and(|next| next.role == Role::Assistant);
        let end = if paired { index + 2 } else { index + 1 };
        Ok(self.messages.drain(index..end).collect())
    }

    /// Build the outbound message list for a completion request.
    ///
    /// Messages without content are skipped; reasoning is never sent back.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter_map(|message| match message.content.as_deref() {
                Some(content) if !content.is_empty() => {
                    Some(ChatMessage::new(message.role, content))
                }
                _ => None,
            })
            .collect()
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl From<Conversation> for Vec<Message> {
    fn from(conversation: Conversation) -> Self {
        conversation.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conversation {
        Conversation::from(vec![
            Message::user("one"),
            Message::assistant("uno"),
            Message::user("two"),
            Message::assistant("dos"),
        ])
    }

    #[test]
    fn removing_user_cascades_to_reply() {
        let mut conversation = sample();
        let removed = conversation.remove(0).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(
            conversation.messages(),
            &[Message::user("two"), Message::assistant("dos")]
        );
    }

    #[test]
    fn removing_assistant_removes_only_it() {
        let mut conversation = sample();
        let removed = conversation.remove(1).unwrap();
        assert_eq!(removed, vec![Message::assistant("uno")]);
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn removing_trailing_user_without_reply() {
        let mut conversation = Conversation::from(vec![Message::user("lonely")]);
        assert_eq!(conversation.remove(0).unwrap().len(), 1);
        assert!(conversation.is_empty());
    }

    #[test]
    fn remove_out_of_range() {
        let mut conversation = sample();
        assert!(conversation.remove(4).unwrap_err().is_validation());
    }

    #[test]
    fn outbound_skips_empty_messages() {
        let mut conversation = sample();
        conversation.push(Message::user("three"));
        conversation.push(Message::placeholder());
        let mut reasoning_only = Message::placeholder();
        reasoning_only.push_reasoning("hmm");
        conversation.push(reasoning_only);
        let outbound = conversation.to_chat_messages();
        let contents: Vec<&str> = outbound.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "uno", "two", "dos", "three"]);
    }
}
