//! Conversation orchestration.
//!
//! The [`Orchestrator`] drives one conversation turn at a time: it appends
//! the user message and an assistant placeholder, opens a stream, applies
//! each delta to the placeholder, persists a snapshot after every change and
//! reports progress through a [`Renderer`].

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::chat::config::ChatConfig;
use crate::chat::store::{MemoryThreadStore, ThreadStore, Threads};
use crate::client::CompletionBackend;
use crate::error::{Error, Result};
use crate::observability::{CHAT_TURN_DURATION, CHAT_TURN_ERRORS, CHAT_TURNS};
use crate::render::Renderer;
use crate::session::{CancelHandle, SessionState, StreamSession};
use crate::types::{
    ChatMessage, CompletionRequest, Conversation, Message, Model, Role, StreamDelta,
};

/// How a conversation turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream ran to completion.
    Completed,

    /// The user cancelled; the assistant message keeps what arrived before.
    Cancelled,

    /// The turn failed; the assistant message carries the error text.
    Failed {
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Cancels the turn in progress from another task or thread.
///
/// Obtain one with [`Orchestrator::canceller`] before starting a turn.
#[derive(Debug, Clone)]
pub struct Canceller {
    processing: Arc<AtomicBool>,
    active: Arc<Mutex<Option<CancelHandle>>>,
}

impl Canceller {
    /// Stop the turn in progress, if any.
    ///
    /// The in-flight read is abandoned and no further deltas are applied.
    /// Calling this with no active turn has no effect.
    pub fn cancel(&self) {
        self.processing.store(false, Ordering::SeqCst);
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = active.as_ref() {
            handle.cancel();
        }
    }

    /// Returns true while a turn is streaming.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }
}

/// Drives conversation turns against a completion backend.
pub struct Orchestrator<B: CompletionBackend, S: ThreadStore = MemoryThreadStore> {
    backend: B,
    config: ChatConfig,
    threads: Threads<S>,
    processing: Arc<AtomicBool>,
    active: Arc<Mutex<Option<CancelHandle>>>,
}

impl<B: CompletionBackend> Orchestrator<B> {
    /// Creates an orchestrator that keeps threads in memory.
    pub fn new(backend: B, config: ChatConfig) -> Result<Self> {
        Self::with_store(backend, config, MemoryThreadStore::new())
    }
}

impl<B: CompletionBackend, S: ThreadStore> Orchestrator<B, S> {
    /// Creates an orchestrator that persists threads to `store`.
    pub fn with_store(backend: B, config: ChatConfig, store: S) -> Result<Self> {
        Ok(Self {
            backend,
            config,
            threads: Threads::new(store)?,
            processing: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(None)),
        })
    }

    /// Returns a handle that cancels the turn in progress.
    pub fn canceller(&self) -> Canceller {
        Canceller {
            processing: Arc::clone(&self.processing),
            active: Arc::clone(&self.active),
        }
    }

    /// Stop the turn in progress, if any.
    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    /// Returns true while a turn is streaming.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Conversation of the current thread.
    pub fn conversation(&self) -> &Conversation {
        self.threads.conversation()
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// The model used for new turns.
    pub fn model(&self) -> &Model {
        &self.config.model
    }

    /// Change the model used for new turns.
    pub fn set_model(&mut self, model: impl Into<Model>) -> Result<()> {
        self.ensure_idle()?;
        self.config.model = model.into();
        Ok(())
    }

    /// Choose whether the reasoning channel is requested.
    pub fn set_include_reasoning(&mut self, include_reasoning: bool) {
        self.config.include_reasoning = include_reasoning;
    }

    /// Name of the current thread.
    pub fn current_thread(&self) -> &str {
        self.threads.current()
    }

    /// Thread names in creation order.
    pub fn thread_names(&self) -> Vec<String> {
        self.threads.names()
    }

    /// The thread set and its store.
    pub fn threads(&self) -> &Threads<S> {
        &self.threads
    }

    /// Create a new empty thread and make it current.
    pub fn new_thread(&mut self) -> Result<String> {
        self.ensure_idle()?;
        self.threads.new_thread()
    }

    /// Make `name` the current thread.
    pub fn switch_thread(&mut self, name: &str) -> Result<()> {
        self.ensure_idle()?;
        self.threads.switch(name)
    }

    /// Delete the current thread and return to the default thread.
    pub fn delete_thread(&mut self) -> Result<String> {
        self.ensure_idle()?;
        self.threads.delete_current()
    }

    /// Ask `question` and stream the answer into the conversation.
    ///
    /// The user message and an empty assistant message are appended and
    /// persisted before the request is sent.  Network and stream failures do
    /// not return `Err`; they end the turn with [`TurnOutcome::Failed`] and
    /// leave the error text in the assistant message.
    pub async fn submit(
        &mut self,
        question: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome> {
        if question.trim().is_empty() {
            return Err(Error::validation(
                "question is empty",
                Some("question".to_string()),
            ));
        }
        self.ensure_idle()?;

        let mut outbound = self.threads.conversation().to_chat_messages();
        outbound.push(ChatMessage::user(question));
        let conversation = self.threads.conversation_mut();
        conversation.push(Message::user(question));
        conversation.push(Message::placeholder());
        self.threads.persist()?;

        let cancel = CancelHandle::new();
        self.processing.store(true, Ordering::SeqCst);
        self.set_active(Some(cancel.clone()));
        CHAT_TURNS.click();
        let start = Instant::now();
        tracing::debug!(
            thread = %self.threads.current(),
            model = %self.config.model,
            messages = outbound.len(),
            "starting turn"
        );

        let outcome = match self.run_turn(outbound, cancel, renderer).await {
            Ok(outcome) => outcome,
            Err(err) => self.fail_turn(&err),
        };

        self.set_active(None);
        self.processing.store(false, Ordering::SeqCst);
        CHAT_TURN_DURATION.add(start.elapsed().as_secs_f64());

        match &outcome {
            TurnOutcome::Completed => renderer.finish_response(),
            TurnOutcome::Cancelled => renderer.print_interrupted(),
            TurnOutcome::Failed { message } => renderer.print_error(message),
        }
        if let Err(err) = self.auto_save_transcript() {
            tracing::warn!(error = %err, "failed to auto-save transcript");
            renderer.print_error(&format!("Failed to save transcript: {err}"));
        }
        Ok(outcome)
    }

    /// Replace the message at `index` with `text` and regenerate.
    ///
    /// Every message from `index` onward is discarded; `text` is then
    /// submitted with the remaining history.
    pub async fn edit_user_message(
        &mut self,
        index: usize,
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome> {
        self.ensure_idle()?;
        self.check_index(index)?;
        if text.trim().is_empty() {
            return Err(Error::validation(
                "edited message is empty",
                Some("text".to_string()),
            ));
        }
        self.threads.conversation_mut().truncate(index);
        self.threads.persist()?;
        self.submit(text, renderer).await
    }

    /// Overwrite the assistant reply at `index` without regenerating.
    pub fn edit_assistant_message(&mut self, index: usize, text: &str) -> Result<()> {
        self.ensure_idle()?;
        self.check_index(index)?;
        if text.trim().is_empty() {
            return Err(Error::validation(
                "edited reply is empty",
                Some("text".to_string()),
            ));
        }
        let message = self
            .threads
            .conversation_mut()
            .get_mut(index)
            .ok_or_else(|| Error::validation("message index out of range", None))?;
        if message.role != Role::Assistant {
            return Err(Error::validation(
                format!("message {index} is not an assistant reply"),
                Some("index".to_string()),
            ));
        }
        message.content = Some(text.to_string());
        self.threads.persist()
    }

    /// Delete the message at `index`.
    ///
    /// Deleting a user message also deletes the reply that follows it.
    pub fn delete_message(&mut self, index: usize) -> Result<Vec<Message>> {
        self.ensure_idle()?;
        let removed = self.threads.conversation_mut().remove(index)?;
        self.threads.persist()?;
        Ok(removed)
    }

    /// Saves the current conversation to the specified path.
    pub fn save_transcript_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let transcript = TranscriptFile::new(self.threads.current(), self.conversation());
        let file = File::create(path.as_ref())
            .map_err(|err| Error::io("failed to create transcript file", err))?;
        let writer = BufWriter::new(file);
        to_writer_pretty(writer, &transcript).map_err(|err| {
            Error::serialization("failed to serialize transcript", Some(Box::new(err)))
        })
    }

    /// Loads a transcript from disk, replacing the current conversation.
    pub fn load_transcript_from<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.ensure_idle()?;
        let file = File::open(path.as_ref())
            .map_err(|err| Error::io("failed to open transcript file", err))?;
        let reader = BufReader::new(file);
        let transcript: TranscriptFile = from_reader(reader).map_err(|err| {
            Error::serialization("failed to parse transcript", Some(Box::new(err)))
        })?;
        if transcript.version != TRANSCRIPT_VERSION {
            return Err(Error::validation(
                format!("unsupported transcript version {}", transcript.version),
                Some("version".to_string()),
            ));
        }
        self.threads.replace(transcript.messages)
    }

    async fn run_turn(
        &mut self,
        outbound: Vec<ChatMessage>,
        cancel: CancelHandle,
        renderer: &mut dyn Renderer,
    ) -> Result<TurnOutcome> {
        let request = self.build_request(outbound);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.backend.stream(request) => Some(opened),
        };
        let mut session = match opened {
            Some(session) => session?.with_cancel_handle(cancel),
            None => return Ok(TurnOutcome::Cancelled),
        };

        loop {
            if !self.is_processing() {
                session.cancel();
                return Ok(TurnOutcome::Cancelled);
            }
            let delta = match session.next_delta().await {
                Some(delta) => delta?,
                None => return Ok(finished(&session)),
            };
            // Cancellation may have been requested while the read was pending.
            if !self.is_processing() {
                session.cancel();
                return Ok(TurnOutcome::Cancelled);
            }
            self.apply_delta(&delta)?;
            if let Some(reasoning) = &delta.reasoning {
                renderer.print_thinking(reasoning);
            }
            if let Some(content) = &delta.content {
                renderer.print_text(content);
            }
        }
    }

    fn build_request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest::new(self.config.model.clone(), messages)
            .with_include_reasoning(self.config.include_reasoning)
            .with_temperature(self.config.temperature)
            .with_top_p(self.config.top_p)
            .with_max_tokens(self.config.max_tokens)
    }

    fn apply_delta(&mut self, delta: &StreamDelta) -> Result<()> {
        let reply = self
            .threads
            .conversation_mut()
            .last_mut()
            .ok_or_else(|| Error::unknown("conversation lost its assistant message"))?;
        delta.apply_to(reply);
        self.threads.persist_last()
    }

    fn fail_turn(&mut self, err: &Error) -> TurnOutcome {
        CHAT_TURN_ERRORS.click();
        let message = err.to_string();
        tracing::warn!(
            error = %message,
            thread = %self.threads.current(),
            before_stream = err.is_connection_class(),
            "turn failed"
        );
        if let Some(reply) = self.threads.conversation_mut().last_mut() {
            match reply.content.as_mut() {
                Some(content) if !content.is_empty() => {
                    content.push_str("\n\nError: ");
                    content.push_str(&message);
                }
                _ => reply.content = Some(format!("Error: {message}")),
            }
        }
        if let Err(err) = self.threads.persist() {
            tracing::warn!(error = %err, "failed to persist failed turn");
        }
        TurnOutcome::Failed { message }
    }

    fn auto_save_transcript(&self) -> Result<()> {
        if let Some(path) = &self.config.transcript_path {
            self.save_transcript_to(path)
        } else {
            Ok(())
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_processing() {
            Err(Error::validation(
                "a response is still streaming; cancel it first",
                None,
            ))
        } else {
            Ok(())
        }
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.conversation().len();
        if index >= len {
            Err(Error::validation(
                format!("message index {index} out of range for conversation of {len}"),
                Some("index".to_string()),
            ))
        } else {
            Ok(())
        }
    }

    fn set_active(&self, handle: Option<CancelHandle>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = handle;
    }
}

fn finished(session: &StreamSession) -> TurnOutcome {
    if session.state() == SessionState::Cancelled {
        TurnOutcome::Cancelled
    } else {
        TurnOutcome::Completed
    }
}

const TRANSCRIPT_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct TranscriptFile {
    version: u8,
    #[serde(default)]
    thread: Option<String>,
    messages: Conversation,
}

impl TranscriptFile {
    fn new(thread: &str, conversation: &Conversation) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            thread: Some(thread.to_string()),
            messages: conversation.clone(),
        }
    }
}
