//! scholar-core - Course assistant engine
//!
//! Provides the components for answering questions over course material:
//! - LLM provider abstraction (Ollama)
//! - Tool call tracking and source attribution
//! - The bounded tool-calling round loop
//! - Course retrieval (catalog, embeddings, vector search)
//! - Session history
//! - Configuration management
//!
//! ## Primary API
//!
//! Most users only need [`ChatManager`].

// Public modules
pub mod chat;
pub mod config;
pub mod provider;
pub mod rag;
pub mod session;
pub mod tracker;

// Public exports
pub use chat::{
    ChatManager, Engine, EngineError, EngineEvent, EngineSettings, Observer, Outcome,
    QueryResponse, Termination, TracingObserver,
};
pub use config::Config;
pub use rag::{Catalog, CourseIndex, SearchBackend, SearchError, SearchHit, SearchQuery};
pub use session::{Exchange, SessionStore};
pub use tracker::{summarize_calls, CallOutcome, CallTracker, ToolCallRecord, ToolResult};

// Provider exports
pub use provider::{
    ChatRequest, Message, ModelReply, OllamaProvider, Provider, ProviderError, Tool, ToolCall,
};
