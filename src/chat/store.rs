//! Named chat threads and the persistence seam behind them.
//!
//! A [`ThreadStore`] maps thread names to conversations.  [`Threads`] wraps a
//! store and tracks which thread is current; exactly one thread is current at
//! a time and the default thread always exists.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::Conversation;

/// Name of the thread that always exists and cannot be deleted.
pub const DEFAULT_THREAD: &str = "New Chat";

/// Persistence collaborator for chat threads.
///
/// Implementations are called synchronously after every mutation.  While a
/// reply streams, only its last message changes, and that path goes through
/// [`save_last`](Self::save_last) once per delta; a store whose `save` costs
/// time proportional to the whole history should override it.
pub trait ThreadStore: Send {
    /// Store `conversation` under `thread`, creating the thread if needed.
    fn save(&mut self, thread: &str, conversation: &Conversation) -> Result<()>;

    /// Store `conversation` when at most its last message changed since the
    /// previous save of `thread`.
    fn save_last(&mut self, thread: &str, conversation: &Conversation) -> Result<()> {
        self.save(thread, conversation)
    }

    /// Load the conversation of `thread`; unknown threads load as `None`.
    fn load(&self, thread: &str) -> Result<Option<Conversation>>;

    /// Remove `thread` and its conversation.
    fn delete(&mut self, thread: &str) -> Result<()>;

    /// Thread names in creation order.
    fn threads(&self) -> Vec<String>;

    /// Returns true if `thread` exists.
    fn contains(&self, thread: &str) -> bool {
        self.threads().iter().any(|t| t == thread)
    }
}

/// An in-memory [`ThreadStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryThreadStore {
    order: Vec<String>,
    conversations: HashMap<String, Conversation>,
}

impl MemoryThreadStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThreadStore for MemoryThreadStore {
    fn save(&mut self, thread: &str, conversation: &Conversation) -> Result<()> {
        if !self.conversations.contains_key(thread) {
            self.order.push(thread.to_string());
        }
        self.conversations
            .insert(thread.to_string(), conversation.clone());
        Ok(())
    }

    fn save_last(&mut self, thread: &str, conversation: &Conversation) -> Result<()> {
        let stored = self
            .conversations
            .get_mut(thread)
            .filter(|stored| stored.len() == conversation.len());
        match (stored, conversation.last()) {
            (Some(stored), Some(last)) => {
                if let Some(slot) = stored.last_mut() {
                    slot.clone_from(last);
                }
                Ok(())
            }
            _ => self.save(thread, conversation),
        }
    }

    fn load(&self, thread: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.get(thread).cloned())
    }

    fn delete(&mut self, thread: &str) -> Result<()> {
        self.conversations.remove(thread);
        self.order.retain(|t| t != thread);
        Ok(())
    }

    fn threads(&self) -> Vec<String> {
        self.order.clone()
    }

    fn contains(&self, thread: &str) -> bool {
        self.conversations.contains_key(thread)
    }
}

/// The set of chat threads with one current thread.
///
/// The conversation of the current thread is held here and written back to
/// the store by [`persist`](Self::persist).
#[derive(Debug)]
pub struct Threads<S: ThreadStore = MemoryThreadStore> {
    store: S,
    current: String,
    conversation: Conversation,
}

impl<S: ThreadStore> Threads<S> {
    /// Wrap `store`, creating the default thread if it is missing, and make
    /// the default thread current.
    pub fn new(mut store: S) -> Result<Self> {
        let conversation = match store.load(DEFAULT_THREAD)? {
            Some(conversation) => conversation,
            None => {
                let conversation = Conversation::new();
                store.save(DEFAULT_THREAD, &conversation)?;
                conversation
            }
        };
        Ok(Self {
            store,
            current: DEFAULT_THREAD.to_string(),
            conversation,
        })
    }

    /// Name of the current thread.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Conversation of the current thread.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Mutable conversation of the current thread.
    ///
    /// Call [`persist`](Self::persist) after mutating.
    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Replace the conversation of the current thread and persist it.
    pub fn replace(&mut self, conversation: Conversation) -> Result<()> {
        self.conversation = conversation;
        self.persist()
    }

    /// Write the current conversation to the store.
    pub fn persist(&mut self) -> Result<()> {
        self.store.save(&self.current, &self.conversation)
    }

    /// Write the current conversation to the store after only its last
    /// message changed.
    pub fn persist_last(&mut self) -> Result<()> {
        self.store.save_last(&self.current, &self.conversation)
    }

    /// Thread names in creation order.
    pub fn names(&self) -> Vec<String> {
        self.store.threads()
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an empty thread named `Chat N` and make it current.
    pub fn new_thread(&mut self) -> Result<String> {
        self.persist()?;
        let mut n = self.store.threads().len() + 1;
        let mut name = format!("Chat {n}");
        while self.store.contains(&name) {
            n += 1;
            name = format!("Chat {n}");
        }
        let conversation = Conversation::new();
        self.store.save(&name, &conversation)?;
        self.current = name.clone();
        self.conversation = conversation;
        tracing::debug!(thread = %name, "created thread");
        Ok(name)
    }

    /// Make `name` the current thread.
    pub fn switch(&mut self, name: &str) -> Result<()> {
        let conversation = self
            .store
            .load(name)?
            .ok_or_else(|| Error::not_found(format!("no thread named {name:?}")))?;
        self.persist()?;
        self.current = name.to_string();
        self.conversation = conversation;
        Ok(())
    }

    /// Delete the current thread and fall back to the default thread.
    ///
    /// The default thread cannot be deleted.
    pub fn delete_current(&mut self) -> Result<String> {
        if self.current == DEFAULT_THREAD {
            return Err(Error::validation(
                format!("the {DEFAULT_THREAD:?} thread cannot be deleted"),
                Some("thread".to_string()),
            ));
        }
        let deleted = std::mem::replace(&mut self.current, DEFAULT_THREAD.to_string());
        self.store.delete(&deleted)?;
        self.conversation = match self.store.load(DEFAULT_THREAD)? {
            Some(conversation) => conversation,
            None => {
                let conversation = Conversation::new();
                self.store.save(DEFAULT_THREAD, &conversation)?;
                conversation
            }
        };
        tracing::debug!(thread = %deleted, "deleted thread");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    fn threads() -> Threads {
        Threads::new(MemoryThreadStore::new()).unwrap()
    }

    #[test]
    fn default_thread_exists() {
        let threads = threads();
        assert_eq!(threads.current(), DEFAULT_THREAD);
        assert_eq!(threads.names(), vec![DEFAULT_THREAD.to_string()]);
        assert!(threads.conversation().is_empty());
    }

    #[test]
    fn new_threads_are_numbered() {
        let mut threads = threads();
        assert_eq!(threads.new_thread().unwrap(), "Chat 2");
        assert_eq!(threads.new_thread().unwrap(), "Chat 3");
        assert_eq!(threads.current(), "Chat 3");
        assert_eq!(threads.names(), vec!["New Chat", "Chat 2", "Chat 3"]);
    }

    #[test]
    fn numbering_skips_taken_names() {
        let mut threads = threads();
        threads.new_thread().unwrap();
        threads.new_thread().unwrap();
        threads.switch("Chat 2").unwrap();
        threads.delete_current().unwrap();
        // Two threads remain, so "Chat 3" would be next but it is taken.
        assert_eq!(threads.new_thread().unwrap(), "Chat 4");
    }

    #[test]
    fn switching_keeps_conversations_apart() {
        let mut threads = threads();
        threads.conversation_mut().push(Message::user("hello"));
        threads.persist().unwrap();
        threads.new_thread().unwrap();
        assert!(threads.conversation().is_empty());
        threads.conversation_mut().push(Message::user("other"));
        threads.switch(DEFAULT_THREAD).unwrap();
        assert_eq!(threads.conversation().messages()[0].text(), "hello");
        threads.switch("Chat 2").unwrap();
        assert_eq!(threads.conversation().messages()[0].text(), "other");
    }

    #[test]
    fn switching_to_unknown_thread_fails() {
        let mut threads = threads();
        let err = threads.switch("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(threads.current(), DEFAULT_THREAD);
    }

    #[test]
    fn default_thread_cannot_be_deleted() {
        let mut threads = threads();
        assert!(threads.delete_current().unwrap_err().is_validation());
        threads.new_thread().unwrap();
        assert_eq!(threads.delete_current().unwrap(), "Chat 2");
        assert_eq!(threads.current(), DEFAULT_THREAD);
        assert_eq!(threads.names(), vec![DEFAULT_THREAD.to_string()]);
    }

    #[test]
    fn existing_store_is_reused() {
        let mut store = MemoryThreadStore::new();
        let mut conversation = Conversation::new();
        conversation.push(Message::user("kept"));
        store.save(DEFAULT_THREAD, &conversation).unwrap();
        let threads = Threads::new(store).unwrap();
        assert_eq!(threads.conversation().len(), 1);
    }

    #[test]
    fn persist_last_updates_only_the_reply() {
        let mut threads = threads();
        threads.conversation_mut().push(Message::user("hello"));
        threads.conversation_mut().push(Message::placeholder());
        threads.persist().unwrap();

        let reply = threads.conversation_mut().last_mut().unwrap();
        reply.push_content("Hi");
        reply.push_reasoning("greet");
        threads.persist_last().unwrap();

        let stored = threads.store().load(DEFAULT_THREAD).unwrap().unwrap();
        assert_eq!(&stored, threads.conversation());
        assert_eq!(stored.last().unwrap().text(), "Hi");
    }

    #[test]
    fn persist_last_falls_back_when_lengths_differ() {
        let mut threads = threads();
        threads.conversation_mut().push(Message::user("hello"));
        threads.persist_last().unwrap();

        let stored = threads.store().load(DEFAULT_THREAD).unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get(0).unwrap().text(), "hello");
    }
}
