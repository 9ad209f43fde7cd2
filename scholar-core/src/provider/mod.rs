//! LLM provider abstraction layer.
//!
//! This module defines the common interface the round loop uses to talk to a
//! language model, plus an Ollama HTTP implementation.

mod types;
pub mod ollama;

// Re-export common types
pub use types::{
    Provider,
    ProviderError,
    Result,
    ChatRequest,
    ModelReply,
    Message,
    Role,
    Tool,
    ToolCall,
    ToolFunction,
    ToolCallFunction,
    EmbedRequest,
    EmbedResponse,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
