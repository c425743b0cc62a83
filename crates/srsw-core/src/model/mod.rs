//! Model invocation: the chat boundary and the retry policy around it.

mod chat;
mod retry;

pub use chat::{ChatMessage, ChatModel, ChatOptions, ChatRole, ModelError};
pub use retry::{
    Classification, ErrorCategory, ErrorClassifier, NetworkErrorClassifier, backoff_delay,
    with_retry,
};
