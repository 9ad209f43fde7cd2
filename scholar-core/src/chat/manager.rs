use super::engine::{Engine, EngineError, EngineSettings, Termination};
use super::observer::{Observer, TracingObserver};
use crate::config::Config;
use crate::provider::{OllamaProvider, Provider};
use crate::session::SessionStore;
use crate::tracker::{summarize_calls, CallTracker, ToolCallRecord};
use scholar_tool::{Source, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info};

/// The answer to one user query.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub answer: String,
    /// Deduplicated sources cited by the tools, in first-seen order.
    pub sources: Vec<Source>,
    /// Session the exchange was recorded in.
    pub session_id: String,
    pub termination: Termination,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl QueryResponse {
    pub fn is_partial(&self) -> bool {
        self.termination == Termination::Partial
    }

    /// Numbered listing of the tool calls made for this answer.
    pub fn call_summary(&self) -> String {
        summarize_calls(&self.tool_calls, self.sources.len())
    }
}

/// Answers questions about course material, one session at a time.
///
/// `ChatManager` ties the round loop to the tool registry and the session
/// store. Each query gets a fresh [`CallTracker`], so concurrent queries
/// never see each other's calls or sources.
///
/// # Examples
///
/// ```no_run
/// use scholar_core::{ChatManager, Config};
/// use scholar_tool::ToolRegistry;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load_or_default();
/// let manager = ChatManager::new(config, ToolRegistry::new());
///
/// let response = manager.query(None, "What does lesson 4 cover?").await?;
/// println!("{}", response.answer);
/// for source in &response.sources {
///     println!("  {}", source);
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Sessions
///
/// Passing `None` as the session id opens a new session; the returned
/// [`QueryResponse::session_id`] continues it. The history of a session is
/// locked for the whole query, so two questions on the same session are
/// answered in order. A query that fails leaves the history untouched.
pub struct ChatManager {
    config: Config,
    provider: Arc<dyn Provider>,
    observer: Arc<dyn Observer>,
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
}

impl ChatManager {
    /// Creates a manager that talks to the Ollama server named in `config`.
    pub fn new(config: Config, registry: ToolRegistry) -> Self {
        let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::from_config(&config));
        let sessions = Arc::new(SessionStore::new(config.session.max_history));

        Self {
            config,
            provider,
            observer: Arc::new(TracingObserver),
            registry: Arc::new(registry),
            sessions,
        }
    }

    /// Replaces the LLM provider.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = provider;
        self
    }

    /// Replaces the observer that receives engine events.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Shares a session store with other managers.
    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn create_session(&self) -> String {
        self.sessions.create_session().await
    }

    /// Answers `query` within a session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the model fails and no tool result is
    /// available to fall back on. Use [`EngineError::user_message`] for text
    /// that can be shown to the user.
    pub async fn query(
        &self,
        session_id: Option<&str>,
        query: &str,
    ) -> Result<QueryResponse, EngineError> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.sessions.create_session().await,
        };

        let mut history = self.sessions.lock(&session_id).await;
        debug!(session = %session_id, history = history.len(), "Answering query");

        let mut tracker = CallTracker::new(Arc::clone(&self.registry))
            .with_summary_chars(self.config.engine.summary_chars);
        let engine = Engine::new(
            Arc::clone(&self.provider),
            EngineSettings::from_config(&self.config),
        )
        .with_observer(Arc::clone(&self.observer));

        let outcome = engine
            .run(query, &history.exchanges(), &mut tracker)
            .await?;

        history.push(query, outcome.answer.clone());

        info!(
            session = %session_id,
            termination = ?outcome.termination,
            tool_calls = outcome.tool_calls.len(),
            sources = outcome.sources.len(),
            "Query answered"
        );

        Ok(QueryResponse {
            answer: outcome.answer,
            sources: outcome.sources,
            session_id,
            termination: outcome.termination,
            tool_calls: outcome.tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ModelReply, ProviderError, Role, ToolCall};
    use async_trait::async_trait;
    use scholar_tool::{Tool, ToolOutput};
    use serde_json::Value;
    use std::sync::Mutex;

    /// Answers tool results with their text and plain queries by echoing them.
    ///
    /// A query containing "search" triggers one tool round first; a query
    /// containing "broken" fails.
    #[derive(Default)]
    struct EchoProvider {
        requests: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        async fn generate(&self, request: ChatRequest) -> crate::provider::Result<ModelReply> {
            self.requests.lock().unwrap().push(request.clone());

            let question = request
                .messages
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            if question.contains("broken") {
                return Err(ProviderError::Api("model offline".to_string()));
            }

            let last = request.messages.last().map(|m| m.role);
            if question.contains("search") && last == Some(Role::User) && request.tools_enabled() {
                return Ok(ModelReply::ToolCalls {
                    content: String::new(),
                    calls: vec![ToolCall::new("lookup", serde_json::json!({"query": question}))],
                });
            }
            Ok(ModelReply::Final(format!("answer to {}", question)))
        }
    }

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        fn name(&self) -> &str {
            "lookup"
        }

        fn description(&self) -> &str {
            "Looks things up"
        }

        fn parameter_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn execute(&self, _input: Value) -> scholar_tool::Result<ToolOutput> {
            Ok(ToolOutput::new("found it").with_sources(vec![Source::new("Course A").with_location("Lesson 1")]))
        }
    }

    fn manager() -> (ChatManager, Arc<EchoProvider>) {
        let provider = Arc::new(EchoProvider::default());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(LookupTool)).unwrap();

        let manager = ChatManager::new(Config::default(), registry).with_provider(provider.clone());
        (manager, provider)
    }

    #[tokio::test]
    async fn test_query_opens_session() {
        let (manager, _) = manager();

        let response = manager.query(None, "hello").await.unwrap();
        assert_eq!(response.answer, "answer to hello");
        assert_eq!(response.session_id, "session_1");
        assert_eq!(response.termination, Termination::Answered);

        let history = manager.sessions().get_history(&response.session_id).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "hello");
    }

    #[tokio::test]
    async fn test_sources_from_tool_round() {
        let (manager, _) = manager();

        let response = manager.query(None, "please search").await.unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].to_string(), "Course A - Lesson 1");
    }

    #[tokio::test]
    async fn test_history_reaches_next_query() {
        let (manager, provider) = manager();
        let id = manager.create_session().await;

        manager.query(Some(&id), "first").await.unwrap();
        manager.query(Some(&id), "second").await.unwrap();

        let requests = provider.requests.lock().unwrap().clone();
        let system = &requests.last().unwrap().messages[0].content;
        assert!(system.contains("User: first\nAssistant: answer to first"));
    }

    #[tokio::test]
    async fn test_failed_query_leaves_history_alone() {
        let (manager, _) = manager();
        let id = manager.create_session().await;

        let err = manager.query(Some(&id), "broken").await.unwrap_err();
        assert!(matches!(err, EngineError::ModelInvocation { .. }));
        assert!(manager.sessions().get_history(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_history_capped() {
        let (manager, _) = manager();
        let id = manager.create_session().await;

        for q in ["one", "two", "three"] {
            manager.query(Some(&id), q).await.unwrap();
        }

        let history = manager.sessions().get_history(&id).await;
        let queries: Vec<&str> = history.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["two", "three"]);
    }
}
