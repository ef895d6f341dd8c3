// Public modules
pub mod completion;
pub mod completion_request;
pub mod conversation;
pub mod message;
pub mod model;
pub mod stream_delta;

// Re-exports
pub use completion::{ChatCompletion, Choice, Delta, FinishReason, ProviderError, Usage};
pub use completion_request::{ChatMessage, CompletionRequest};
pub use conversation::Conversation;
pub use message::{Message, Role};
pub use model::{KnownModel, KnownModelParseError, Model};
pub use stream_delta::StreamDelta;
